//! WordPress JSON API access: transport, response interpretation and the
//! types mapped out of responses.

pub mod api_types;
pub mod client;
pub mod types;

pub use client::{ApiClient, HttpApiClient, Route};
pub use types::{RecordFields, RemoteId};

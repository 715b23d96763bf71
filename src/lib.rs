//! Mirrors content from a WordPress JSON API into a local SQLite cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod scheduler;
pub mod wp;

#[cfg(test)]
mod testing;

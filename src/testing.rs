//! Test doubles shared by the engine and scheduler tests.

use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::{SyncError, SyncResult};
use crate::wp::{ApiClient, Route};

/// `ApiClient` answering from a table of canned responses.
///
/// Unknown requests fail like a network error would.
#[derive(Default)]
pub struct ScriptedApi {
  responses: Mutex<HashMap<(String, Option<u32>), SyncResult<Value>>>,
  gates: Mutex<HashMap<(String, Option<u32>), Arc<Notify>>>,
  calls: Mutex<Vec<(String, Option<u32>)>>,
}

impl ScriptedApi {
  pub fn respond(self, route: &str, page: Option<u32>, body: Value) -> Self {
    self
      .responses
      .lock()
      .unwrap()
      .insert((route.to_string(), page), Ok(body));
    self
  }

  pub fn fail(self, route: &str, page: Option<u32>) -> Self {
    self.responses.lock().unwrap().insert(
      (route.to_string(), page),
      Err(SyncError::fetch_failed(route, "connection reset")),
    );
    self
  }

  /// Hold the first response to `route` until `gate` is notified.
  pub fn hold(self, route: &str, page: Option<u32>, gate: Arc<Notify>) -> Self {
    self
      .gates
      .lock()
      .unwrap()
      .insert((route.to_string(), page), gate);
    self
  }

  /// Routes requested so far, in order.
  pub fn calls(&self) -> Vec<(String, Option<u32>)> {
    self.calls.lock().unwrap().clone()
  }
}

impl ApiClient for ScriptedApi {
  async fn fetch(&self, route: &Route, page: Option<u32>) -> SyncResult<Value> {
    self
      .calls
      .lock()
      .unwrap()
      .push((route.to_string(), page));

    let gate = self
      .gates
      .lock()
      .unwrap()
      .remove(&(route.to_string(), page));
    if let Some(gate) = gate {
      gate.notified().await;
    }

    match self
      .responses
      .lock()
      .unwrap()
      .get(&(route.to_string(), page))
    {
      Some(Ok(body)) => Ok(body.clone()),
      Some(Err(e)) => Err(SyncError::fetch_failed(route.as_str(), e)),
      None => Err(SyncError::fetch_failed(route.as_str(), "no response scripted")),
    }
  }
}

/// Captures formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl io::Write for LogBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for LogBuffer {
  type Writer = LogBuffer;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}

//! Message-channel bridge between UI contexts and the worker.
//!
//! A context sends `{"type": ..., "payload": ...}`. Recognised types run the
//! matching management operation and post a [`BridgeReply`] back to the
//! sender only. `SKIP_WAITING` activates the worker and gets no reply.
//! Unknown types are logged and otherwise ignored.

use analyst_core::store::ObjectStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
  ApiError, AppState,
  clients::{ClientId, ClientMessage},
  handlers::{RequestId, management::PerformanceMetrics},
  logger::LogLevel,
};

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
  #[serde(rename = "type")]
  pub kind:    String,
  #[serde(default)]
  pub payload: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRequest {
  GetDebugInfo,
  GetPerformanceMetrics,
  ClearData,
  Reset,
  LoadSampleData,
  ClearAllData,
  SkipWaiting,
}

impl BridgeRequest {
  pub fn parse(kind: &str) -> Option<Self> {
    Some(match kind {
      "get-debug-info" => BridgeRequest::GetDebugInfo,
      "get-performance-metrics" => BridgeRequest::GetPerformanceMetrics,
      "clear-data" => BridgeRequest::ClearData,
      "reset" => BridgeRequest::Reset,
      "load-sample-data" => BridgeRequest::LoadSampleData,
      "clear-all-data" => BridgeRequest::ClearAllData,
      "SKIP_WAITING" => BridgeRequest::SkipWaiting,
      _ => return None,
    })
  }

  /// The `type` carried by the reply, if this request gets one.
  pub fn reply_type(self) -> Option<&'static str> {
    match self {
      BridgeRequest::GetDebugInfo => Some("debug-info"),
      BridgeRequest::GetPerformanceMetrics => Some("performance-metrics"),
      BridgeRequest::ClearData => Some("clear-data"),
      BridgeRequest::Reset => Some("reset"),
      BridgeRequest::LoadSampleData => Some("load-sample-data"),
      BridgeRequest::ClearAllData => Some("clear-all-data"),
      BridgeRequest::SkipWaiting => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeReply {
  #[serde(rename = "type")]
  pub kind:      String,
  pub success:   bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:      Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:     Option<String>,
  /// Unix milliseconds.
  pub timestamp: i64,
}

impl BridgeReply {
  fn ok(kind: &str, data: Value) -> Self {
    Self {
      kind:      kind.to_owned(),
      success:   true,
      data:      Some(data),
      error:     None,
      timestamp: Utc::now().timestamp_millis(),
    }
  }

  fn failed(kind: &str, error: String) -> Self {
    Self {
      kind:      kind.to_owned(),
      success:   false,
      data:      None,
      error:     Some(error),
      timestamp: Utc::now().timestamp_millis(),
    }
  }
}

/// Handle one message from the context `from`.
pub async fn handle_message<S: ObjectStore>(
  state: &AppState<S>,
  from: ClientId,
  message: InboundMessage,
) {
  let rid = RequestId::generate();
  let rid = Some(rid.as_str());

  state.logger.log(
    LogLevel::Debug,
    "Received message from client",
    Some(json!({ "type": message.kind, "payload": message.payload })),
    rid,
  );

  let Some(request) = BridgeRequest::parse(&message.kind) else {
    state.logger.log(
      LogLevel::Warn,
      "Unknown message type received",
      Some(json!({ "type": message.kind })),
      rid,
    );
    return;
  };

  let outcome = match request {
    BridgeRequest::SkipWaiting => {
      state.skip_waiting().await;
      return;
    }
    BridgeRequest::GetDebugInfo => to_data(state.debug_info().await),
    BridgeRequest::GetPerformanceMetrics => to_data(PerformanceMetrics::zeroed()),
    BridgeRequest::ClearData => state.clear_data(rid).await.map(|()| json!({ "success": true })),
    BridgeRequest::Reset => state.reset(rid).await.map(|()| json!({ "success": true })),
    BridgeRequest::LoadSampleData => {
      state.load_sample_data(rid).await.map(|()| json!({ "success": true }))
    }
    BridgeRequest::ClearAllData => {
      state.clear_all_data(rid).await.map(|()| json!({ "success": true }))
    }
  };

  let Some(kind) = request.reply_type() else {
    return;
  };
  let reply = match outcome {
    Ok(data) => BridgeReply::ok(kind, data),
    Err(e) => {
      state.logger.error(format!("Error handling client message: {e}"), rid);
      BridgeReply::failed(kind, e.to_string())
    }
  };
  if !state.clients.post(from, ClientMessage::Reply(reply)) {
    tracing::debug!("client {from} went away before its reply");
  }
}

fn to_data<T: Serialize>(value: T) -> Result<Value, ApiError> {
  serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_handled_type_parses() {
    for (kind, reply) in [
      ("get-debug-info", Some("debug-info")),
      ("get-performance-metrics", Some("performance-metrics")),
      ("clear-data", Some("clear-data")),
      ("reset", Some("reset")),
      ("load-sample-data", Some("load-sample-data")),
      ("clear-all-data", Some("clear-all-data")),
      ("SKIP_WAITING", None),
    ] {
      let request = BridgeRequest::parse(kind).unwrap();
      assert_eq!(request.reply_type(), reply, "{kind}");
    }
    assert_eq!(BridgeRequest::parse("skip-waiting"), None);
  }

  #[test]
  fn inbound_payload_is_optional() {
    let msg: InboundMessage = serde_json::from_value(json!({ "type": "reset" })).unwrap();
    assert_eq!(msg.kind, "reset");
    assert!(msg.payload.is_none());
  }

  #[test]
  fn failed_replies_omit_data() {
    let v = serde_json::to_value(BridgeReply::failed("reset", "boom".into())).unwrap();
    assert_eq!(v["success"], false);
    assert_eq!(v["error"], "boom");
    assert!(v.get("data").is_none());
  }
}

//! Bounded structured log buffer.
//!
//! Every entry is kept in a FIFO ring buffer for the management endpoints,
//! forwarded to `tracing`, and pushed to connected client contexts.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  clients::{ClientHub, ClientMessage},
  lock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Info,
  Warn,
  Error,
  Debug,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
  pub timestamp:  DateTime<Utc>,
  pub level:      LogLevel,
  pub message:    String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:       Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request_id: Option<String>,
}

pub struct Logger {
  entries:  Mutex<VecDeque<LogEntry>>,
  capacity: usize,
  clients:  Arc<ClientHub>,
}

impl Logger {
  pub fn new(capacity: usize, clients: Arc<ClientHub>) -> Self {
    Self {
      entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
      capacity,
      clients,
    }
  }

  /// Append one entry, evicting the oldest past capacity.
  pub fn log(
    &self,
    level: LogLevel,
    message: impl Into<String>,
    data: Option<Value>,
    request_id: Option<&str>,
  ) {
    let entry = LogEntry {
      timestamp: Utc::now(),
      level,
      message: message.into(),
      data,
      request_id: request_id.map(str::to_owned),
    };

    let rid = entry.request_id.as_deref().unwrap_or("-");
    match level {
      LogLevel::Info => tracing::info!(request_id = rid, "{}", entry.message),
      LogLevel::Warn => tracing::warn!(request_id = rid, "{}", entry.message),
      LogLevel::Error => tracing::error!(request_id = rid, "{}", entry.message),
      LogLevel::Debug => tracing::debug!(request_id = rid, "{}", entry.message),
    }

    {
      let mut entries = lock(&self.entries);
      entries.push_back(entry.clone());
      while entries.len() > self.capacity {
        entries.pop_front();
      }
    }

    self.clients.broadcast(ClientMessage::Log(entry));
  }

  pub fn info(&self, message: impl Into<String>, request_id: Option<&str>) {
    self.log(LogLevel::Info, message, None, request_id);
  }

  pub fn warn(&self, message: impl Into<String>, request_id: Option<&str>) {
    self.log(LogLevel::Warn, message, None, request_id);
  }

  pub fn error(&self, message: impl Into<String>, request_id: Option<&str>) {
    self.log(LogLevel::Error, message, None, request_id);
  }

  pub fn debug(&self, message: impl Into<String>, request_id: Option<&str>) {
    self.log(LogLevel::Debug, message, None, request_id);
  }

  /// The newest `count` entries, oldest first, optionally at one level.
  pub fn recent(&self, count: usize, level: Option<LogLevel>) -> Vec<LogEntry> {
    let entries = lock(&self.entries);
    let matching: Vec<&LogEntry> = entries
      .iter()
      .filter(|e| level.is_none_or(|l| e.level == l))
      .collect();
    let skip = matching.len().saturating_sub(count);
    matching.into_iter().skip(skip).cloned().collect()
  }

  pub fn len(&self) -> usize {
    lock(&self.entries).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&self) {
    lock(&self.entries).clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn logger(capacity: usize) -> Logger {
    Logger::new(capacity, Arc::new(ClientHub::default()))
  }

  #[test]
  fn oldest_entries_are_evicted() {
    let log = logger(3);
    for n in 0..5 {
      log.info(format!("line {n}"), None);
    }
    assert_eq!(log.len(), 3);
    let messages: Vec<_> = log.recent(10, None).into_iter().map(|e| e.message).collect();
    assert_eq!(messages, ["line 2", "line 3", "line 4"]);
  }

  #[test]
  fn recent_filters_by_level_then_counts() {
    let log = logger(100);
    log.error("first failure", Some("req_1"));
    log.info("fine", None);
    log.error("second failure", None);
    log.debug("noise", None);

    let errors = log.recent(1, Some(LogLevel::Error));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "second failure");
    assert_eq!(log.recent(10, Some(LogLevel::Error)).len(), 2);
    assert_eq!(log.recent(2, None).len(), 2);
  }

  #[test]
  fn entries_reach_connected_clients() {
    let hub = Arc::new(ClientHub::default());
    let log = Logger::new(10, hub.clone());
    let mut ctx = hub.connect();

    log.warn("careful", Some("req_42"));

    match ctx.try_recv() {
      Some(ClientMessage::Log(entry)) => {
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.request_id.as_deref(), Some("req_42"));
      }
      other => panic!("expected a log notification, got {other:?}"),
    }
  }

  #[test]
  fn clear_empties_the_buffer() {
    let log = logger(10);
    log.info("one", None);
    log.clear();
    assert!(log.is_empty());
  }

  #[test]
  fn serialises_in_camel_case() {
    let log = logger(10);
    log.log(LogLevel::Debug, "hello", Some(serde_json::json!({ "k": 1 })), Some("req_1"));
    let v = serde_json::to_value(&log.recent(1, None)[0]).unwrap();
    assert_eq!(v["level"], "debug");
    assert_eq!(v["requestId"], "req_1");
    assert_eq!(v["data"]["k"], 1);
  }
}

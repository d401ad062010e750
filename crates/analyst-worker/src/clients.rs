//! Connected UI contexts and their mailboxes.
//!
//! Each context gets an unbounded mailbox. Log notifications fan out to every
//! context; bridge replies go to one. A context whose receiver has been
//! dropped is pruned on the next delivery attempt.

use std::{
  collections::HashMap,
  sync::Mutex,
};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::{bridge::BridgeReply, lock, logger::LogEntry};

pub type ClientId = Uuid;

/// Something delivered to a client context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
  Log(LogEntry),
  Reply(BridgeReply),
}

impl ClientMessage {
  /// Event name used when the message is streamed to a context.
  pub fn event_name(&self) -> &'static str {
    match self {
      ClientMessage::Log(_) => "log",
      ClientMessage::Reply(_) => "reply",
    }
  }
}

#[derive(Debug, Default)]
pub struct ClientHub {
  clients: Mutex<HashMap<ClientId, mpsc::UnboundedSender<ClientMessage>>>,
}

impl ClientHub {
  /// Register a new context.
  pub fn connect(&self) -> ClientContext {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = Uuid::new_v4();
    lock(&self.clients).insert(id, tx);
    ClientContext { id, rx }
  }

  /// Deliver `message` to every live context.
  pub fn broadcast(&self, message: ClientMessage) {
    lock(&self.clients).retain(|_, tx| tx.send(message.clone()).is_ok());
  }

  /// Deliver `message` to one context. Returns `false` if it is gone.
  pub fn post(&self, to: ClientId, message: ClientMessage) -> bool {
    let mut clients = lock(&self.clients);
    let Some(tx) = clients.get(&to) else {
      return false;
    };
    if tx.send(message).is_ok() {
      return true;
    }
    clients.remove(&to);
    false
  }

  pub fn contains(&self, id: ClientId) -> bool {
    lock(&self.clients).contains_key(&id)
  }

  pub fn disconnect(&self, id: ClientId) {
    lock(&self.clients).remove(&id);
  }

  /// Number of contexts still registered.
  pub fn len(&self) -> usize {
    lock(&self.clients).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// The receiving end held by one UI context.
#[derive(Debug)]
pub struct ClientContext {
  id: ClientId,
  rx: mpsc::UnboundedReceiver<ClientMessage>,
}

impl ClientContext {
  pub fn id(&self) -> ClientId {
    self.id
  }

  pub async fn recv(&mut self) -> Option<ClientMessage> {
    self.rx.recv().await
  }

  /// The next queued message, if one is ready.
  pub fn try_recv(&mut self) -> Option<ClientMessage> {
    self.rx.try_recv().ok()
  }

  /// Consume the context as a stream of everything delivered to it.
  pub fn into_stream(self) -> UnboundedReceiverStream<ClientMessage> {
    UnboundedReceiverStream::new(self.rx)
  }

  /// Drain queued messages, keeping only bridge replies.
  pub fn replies(&mut self) -> Vec<BridgeReply> {
    std::iter::from_fn(|| self.try_recv())
      .filter_map(|m| match m {
        ClientMessage::Reply(reply) => Some(reply),
        ClientMessage::Log(_) => None,
      })
      .collect()
  }
}

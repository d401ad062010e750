//! Conversations, their messages, and the chat-history index.
//!
//! A [`Conversation`] holds the full, append-only message log. A
//! [`ChatHistoryItem`] is a separate lightweight summary shown in the sidebar;
//! the two are not linked by id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Collection, Result,
  entity::{Entity, advance, new_id},
};

// ─── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
  User,
  Ai,
}

/// A scalar cell in a tabular answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
  Number(serde_json::Number),
  Text(String),
}

/// One flat row of a tabular answer: column name → cell.
pub type TableRow = BTreeMap<String, Cell>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub id:         String,
  #[serde(rename = "type")]
  pub kind:       MessageKind,
  pub content:    String,
  pub timestamp:  DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub table_data: Option<Vec<TableRow>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sql_query:  Option<String>,
}

/// JSON body accepted by `POST /conversations/:id/messages`.
///
/// `id` and `timestamp` are filled in by the server when absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
  pub id:         Option<String>,
  #[serde(rename = "type")]
  pub kind:       MessageKind,
  pub content:    String,
  pub timestamp:  Option<DateTime<Utc>>,
  pub table_data: Option<Vec<TableRow>>,
  pub sql_query:  Option<String>,
}

impl NewMessage {
  pub fn into_message(self, now: DateTime<Utc>) -> Message {
    Message {
      id:         self.id.filter(|id| !id.is_empty()).unwrap_or_else(new_id),
      kind:       self.kind,
      content:    self.content,
      timestamp:  self.timestamp.unwrap_or(now),
      table_data: self.table_data,
      sql_query:  self.sql_query,
    }
  }
}

// ─── Conversations ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
  pub id:         String,
  pub title:      String,
  #[serde(default)]
  pub messages:   Vec<Message>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Whether the conversation is currently open in the UI.
  pub is_active:  bool,
}

/// JSON body accepted by `POST /conversations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
  pub title:    String,
  #[serde(default)]
  pub messages: Vec<NewMessage>,
}

/// JSON body accepted by `PUT /conversations/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPatch {
  pub title:     Option<String>,
  pub messages:  Option<Vec<NewMessage>>,
  pub is_active: Option<bool>,
}

impl Conversation {
  /// Append one message and refresh `updatedAt`.
  pub fn push_message(&mut self, message: Message, now: DateTime<Utc>) {
    self.messages.push(message);
    self.updated_at = advance(self.updated_at, now);
  }
}

impl Entity for Conversation {
  const COLLECTION: Collection = Collection::Conversations;
  const LABEL: &'static str = "Conversation";

  type Input = NewConversation;
  type Patch = ConversationPatch;

  fn id(&self) -> &str { &self.id }
  fn created_at(&self) -> DateTime<Utc> { self.created_at }
  fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

  fn from_input(id: String, input: NewConversation, now: DateTime<Utc>) -> Result<Self> {
    Ok(Conversation {
      id,
      title:      input.title,
      messages:   input.messages.into_iter().map(|m| m.into_message(now)).collect(),
      created_at: now,
      updated_at: now,
      is_active:  false,
    })
  }

  fn apply_patch(&mut self, patch: ConversationPatch, now: DateTime<Utc>) -> Result<()> {
    if let Some(title) = patch.title {
      self.title = title;
    }
    if let Some(messages) = patch.messages {
      self.messages = messages.into_iter().map(|m| m.into_message(now)).collect();
    }
    if let Some(active) = patch.is_active {
      self.is_active = active;
    }
    self.updated_at = advance(self.updated_at, now);
    Ok(())
  }
}

// ─── Chat history ────────────────────────────────────────────────────────────

/// A sidebar summary of a past chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryItem {
  pub id:     String,
  pub title:  String,
  /// Display string, e.g. `"2 hours ago"`.
  pub time:   String,
  pub active: bool,
}

/// JSON body accepted by `POST /chat-history`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatHistoryItem {
  pub title:  String,
  #[serde(default)]
  pub time:   String,
  #[serde(default)]
  pub active: bool,
}

impl ChatHistoryItem {
  pub fn from_input(id: String, input: NewChatHistoryItem) -> Self {
    ChatHistoryItem { id, title: input.title, time: input.time, active: input.active }
  }
}

/// Make `active_id` the only active item. Unknown ids leave every item
/// inactive.
pub fn activate_exclusive(items: &mut [ChatHistoryItem], active_id: Option<&str>) {
  for item in items.iter_mut() {
    item.active = false;
  }
  if let Some(id) = active_id
    && let Some(item) = items.iter_mut().find(|i| i.id == id)
  {
    item.active = true;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn items() -> Vec<ChatHistoryItem> {
    (1..=3)
      .map(|n| ChatHistoryItem {
        id:     n.to_string(),
        title:  format!("Chat {n}"),
        time:   "now".into(),
        active: n == 1,
      })
      .collect()
  }

  #[test]
  fn activation_is_exclusive() {
    let mut list = items();
    activate_exclusive(&mut list, Some("3"));
    let active: Vec<_> = list.iter().filter(|i| i.active).map(|i| i.id.as_str()).collect();
    assert_eq!(active, ["3"]);
  }

  #[test]
  fn unknown_id_deactivates_everything() {
    let mut list = items();
    activate_exclusive(&mut list, Some("nope"));
    assert!(list.iter().all(|i| !i.active));
  }

  #[test]
  fn table_rows_keep_numbers_and_text() {
    let msg: Message = serde_json::from_value(json!({
      "id": "m1",
      "type": "ai",
      "content": "Here you go",
      "timestamp": "2024-03-01T10:00:00Z",
      "tableData": [{ "product": "Widget", "revenue": 1200.5 }],
      "sqlQuery": "SELECT * FROM sales",
    }))
    .unwrap();
    let row = &msg.table_data.as_ref().unwrap()[0];
    assert!(matches!(row["product"], Cell::Text(_)));
    assert!(matches!(row["revenue"], Cell::Number(_)));
  }

  #[test]
  fn new_conversations_start_inactive_with_message_ids() {
    let input: NewConversation = serde_json::from_value(json!({
      "title": "Q1 revenue",
      "messages": [{ "type": "user", "content": "Show Q1 revenue" }],
    }))
    .unwrap();
    let c = Conversation::from_input("c1".into(), input, Utc::now()).unwrap();
    assert!(!c.is_active);
    assert_eq!(c.messages.len(), 1);
    assert!(!c.messages[0].id.is_empty());
  }
}

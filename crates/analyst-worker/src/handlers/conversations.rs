//! Conversation sub-actions. Plain CRUD goes through [`super::resource`].
//!
//! | Method | Path                        | Notes |
//! |--------|-----------------------------|-------|
//! | `POST` | `/conversations/:id/messages` | Body: one message; 201 with the conversation |

use analyst_core::{conversation::NewMessage, store::ObjectStore};
use axum::{
  Extension,
  extract::{Path, State},
  http::{Method, StatusCode},
  response::Response,
};
use bytes::Bytes;
use chrono::Utc;

use super::{RequestId, finish, json, read_json};
use crate::{ApiError, AppState};

/// `/conversations/:id/:action`
pub async fn action<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  Path((id, action)): Path<(String, String)>,
  method: Method,
  body: Bytes,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let result = match (action.as_str(), &method) {
    ("messages", &Method::POST) => append_message(&state, &rid, &id, &body).await,
    ("messages", _) => Err(ApiError::MethodNotAllowed),
    _ => Err(ApiError::NotFound("Endpoint not found".into())),
  };
  finish(&state, &rid, result)
}

async fn append_message<S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  id: &str,
  body: &Bytes,
) -> Result<Response, ApiError> {
  let mut mirror = state.mirror.lock().await;
  let conversation = mirror
    .conversations
    .iter_mut()
    .find(|c| c.id == id)
    .ok_or_else(|| ApiError::NotFound("Conversation not found".into()))?;

  let input: NewMessage = read_json(body)?;
  let now = Utc::now();
  conversation.push_message(input.into_message(now), now);
  let updated = conversation.clone();
  state.save_all(&mut mirror, Some(rid.as_str())).await?;

  state
    .logger
    .info(format!("Appended message to conversation {id}"), Some(rid.as_str()));
  json(StatusCode::CREATED, updated)
}

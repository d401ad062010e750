//! Handlers for `/chat-history`.
//!
//! | Method  | Body | Notes |
//! |---------|------|-------|
//! | `GET`   | none | Whole list |
//! | `POST`  | `{"title", "time"?, "active"?}` | 201 with the new item |
//! | `PATCH` | `{"activeId"}` | Make one item active; 200 with the list |

use analyst_core::{
  conversation::{ChatHistoryItem, NewChatHistoryItem, activate_exclusive},
  entity::new_id,
  store::ObjectStore,
};
use axum::{
  Extension,
  extract::State,
  http::{Method, StatusCode},
  response::Response,
};
use bytes::Bytes;
use serde::Deserialize;

use super::{RequestId, finish, json, ok, read_json};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivateBody {
  active_id: Option<String>,
}

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  method: Method,
  body: Bytes,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let result = match method {
    Method::GET => ok(&state.mirror.lock().await.chat_history),
    Method::POST => create(&state, &rid, &body).await,
    Method::PATCH => activate(&state, &rid, &body).await,
    _ => Err(ApiError::MethodNotAllowed),
  };
  finish(&state, &rid, result)
}

async fn create<S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  body: &Bytes,
) -> Result<Response, ApiError> {
  let input: NewChatHistoryItem = read_json(body)?;
  let item = ChatHistoryItem::from_input(new_id(), input);

  let mut mirror = state.mirror.lock().await;
  mirror.chat_history.push(item.clone());
  if item.active {
    activate_exclusive(&mut mirror.chat_history, Some(&item.id));
  }
  state.save_all(&mut mirror, Some(rid.as_str())).await?;

  json(StatusCode::CREATED, item)
}

async fn activate<S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  body: &Bytes,
) -> Result<Response, ApiError> {
  let ActivateBody { active_id } = read_json(body)?;

  let mut mirror = state.mirror.lock().await;
  activate_exclusive(&mut mirror.chat_history, active_id.as_deref());
  state.save_all(&mut mirror, Some(rid.as_str())).await?;

  ok(&mirror.chat_history)
}

//! Handlers for `/agents` endpoints.
//!
//! Agents use the shared CRUD contract plus one sub-action:
//!
//! | Method  | Path                 | Notes |
//! |---------|----------------------|-------|
//! | `PATCH` | `/agents/:id/status` | Body: `{"isActive":false}` |
//!
//! Any other `PATCH` is a 400.

use analyst_core::{agent::Agent, store::ObjectStore};
use axum::{
  Extension,
  extract::{Path, State},
  http::Method,
  response::Response,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;

use super::{RequestId, finish, ok, read_json, resource};
use crate::{ApiError, AppState};

fn invalid_patch() -> ApiError {
  ApiError::BadRequest("Invalid PATCH endpoint".into())
}

/// `/agents`
pub async fn collection<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  method: Method,
  body: Bytes,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let result = if method == Method::PATCH {
    Err(invalid_patch())
  } else {
    resource::dispatch_collection::<Agent, S>(&state, &rid, &method, &body).await
  };
  finish(&state, &rid, result)
}

/// `/agents/:id`
pub async fn item<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  Path(id): Path<String>,
  method: Method,
  body: Bytes,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let result = if method == Method::PATCH {
    Err(invalid_patch())
  } else {
    resource::dispatch_item::<Agent, S>(&state, &rid, &id, &method, &body).await
  };
  finish(&state, &rid, result)
}

/// `/agents/:id/:action`
///
/// Only `PATCH .../status` is a real sub-action; other methods behave as on
/// `/agents/:id`.
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
  let result = match (&method, action.as_str()) {
    (&Method::PATCH, "status") => set_status(&state, &rid, &id, &body).await,
    (&Method::PATCH, _) => Err(invalid_patch()),
    _ => resource::dispatch_item::<Agent, S>(&state, &rid, &id, &method, &body).await,
  };
  finish(&state, &rid, result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
  is_active: bool,
}

async fn set_status<S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  id: &str,
  body: &Bytes,
) -> Result<Response, ApiError> {
  let mut mirror = state.mirror.lock().await;
  let agent = mirror
    .agents
    .iter_mut()
    .find(|a| a.id == id)
    .ok_or_else(|| ApiError::NotFound("Agent not found".into()))?;

  let StatusBody { is_active } = read_json(body)?;
  agent.set_active(is_active, Utc::now());
  let updated = agent.clone();
  state.save_all(&mut mirror, Some(rid.as_str())).await?;

  state.logger.info(
    format!("Set agent {id} {}", if is_active { "active" } else { "inactive" }),
    Some(rid.as_str()),
  );
  ok(updated)
}

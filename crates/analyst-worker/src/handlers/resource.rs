//! Generic CRUD handlers shared by every mirrored entity type.
//!
//! | Method   | Path               | Notes |
//! |----------|--------------------|-------|
//! | `GET`    | `/<resource>`      | Whole collection |
//! | `POST`   | `/<resource>`      | Body: the entity's `Input`; 201 |
//! | `GET`    | `/<resource>/:id`  | 404 if not found |
//! | `PUT`    | `/<resource>/:id`  | Body: the entity's `Patch` |
//! | `DELETE` | `/<resource>/:id`  | `{"success":true}` |

use analyst_core::{entity::new_id, store::ObjectStore};
use axum::{
  Extension,
  extract::{Path, State},
  http::{Method, StatusCode},
  response::Response,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Value, json as json_value};

use super::{RequestId, finish, json, ok, read_json, success};
use crate::{ApiError, AppState, logger::LogLevel, mirror::Mirrored};

fn not_found<T: Mirrored>() -> ApiError {
  ApiError::NotFound(format!("{} not found", T::LABEL))
}

fn id_required<T: Mirrored>() -> ApiError {
  ApiError::BadRequest(format!("{} ID required", T::LABEL))
}

/// Log payload identifying a written entity.
fn audit<T: Mirrored>(entity: &T) -> Value {
  json_value!({
    "collection": T::COLLECTION.name(),
    "id": entity.id(),
    "createdAt": entity.created_at(),
    "updatedAt": entity.updated_at(),
  })
}

// ─── Routes ──────────────────────────────────────────────────────────────────

/// `/<resource>`
pub async fn collection<T, S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  method: Method,
  body: Bytes,
) -> Response
where
  T: Mirrored,
  S: ObjectStore + Clone + 'static,
{
  let result = dispatch_collection::<T, S>(&state, &rid, &method, &body).await;
  finish(&state, &rid, result)
}

/// `/<resource>/:id`
pub async fn item<T, S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  Path(id): Path<String>,
  method: Method,
  body: Bytes,
) -> Response
where
  T: Mirrored,
  S: ObjectStore + Clone + 'static,
{
  let result = dispatch_item::<T, S>(&state, &rid, &id, &method, &body).await;
  finish(&state, &rid, result)
}

pub(crate) async fn dispatch_collection<T, S>(
  state: &AppState<S>,
  rid: &RequestId,
  method: &Method,
  body: &Bytes,
) -> Result<Response, ApiError>
where
  T: Mirrored,
  S: ObjectStore,
{
  match *method {
    Method::GET => list::<T, S>(state).await,
    Method::POST => create::<T, S>(state, rid, body).await,
    Method::PUT | Method::DELETE => Err(id_required::<T>()),
    _ => Err(ApiError::MethodNotAllowed),
  }
}

pub(crate) async fn dispatch_item<T, S>(
  state: &AppState<S>,
  rid: &RequestId,
  id: &str,
  method: &Method,
  body: &Bytes,
) -> Result<Response, ApiError>
where
  T: Mirrored,
  S: ObjectStore,
{
  match *method {
    Method::GET => get_one::<T, S>(state, id).await,
    // Creation ignores any id in the path; ids are always server-assigned.
    Method::POST => create::<T, S>(state, rid, body).await,
    Method::PUT => update::<T, S>(state, rid, id, body).await,
    Method::DELETE => remove::<T, S>(state, rid, id).await,
    _ => Err(ApiError::MethodNotAllowed),
  }
}

// ─── Operations ──────────────────────────────────────────────────────────────

async fn list<T: Mirrored, S: ObjectStore>(state: &AppState<S>) -> Result<Response, ApiError> {
  let mirror = state.mirror.lock().await;
  ok(T::items(&mirror))
}

async fn get_one<T: Mirrored, S: ObjectStore>(
  state: &AppState<S>,
  id: &str,
) -> Result<Response, ApiError> {
  let mirror = state.mirror.lock().await;
  let entity = T::items(&mirror)
    .iter()
    .find(|e| e.id() == id)
    .ok_or_else(not_found::<T>)?;
  ok(entity)
}

async fn create<T: Mirrored, S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  body: &Bytes,
) -> Result<Response, ApiError> {
  let input: T::Input = read_json(body)?;
  let entity = T::from_input(new_id(), input, Utc::now())?;

  let mut mirror = state.mirror.lock().await;
  T::items_mut(&mut mirror).push(entity.clone());
  state.save_all(&mut mirror, Some(rid.as_str())).await?;

  state.logger.log(
    LogLevel::Info,
    format!("Created {} {}", T::LABEL, entity.id()),
    Some(audit(&entity)),
    Some(rid.as_str()),
  );
  json(StatusCode::CREATED, entity)
}

async fn update<T: Mirrored, S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  id: &str,
  body: &Bytes,
) -> Result<Response, ApiError> {
  let mut mirror = state.mirror.lock().await;
  let entity = T::items_mut(&mut mirror)
    .iter_mut()
    .find(|e| e.id() == id)
    .ok_or_else(not_found::<T>)?;

  let patch: T::Patch = read_json(body)?;
  entity.apply_patch(patch, Utc::now())?;
  let updated = entity.clone();
  state.save_all(&mut mirror, Some(rid.as_str())).await?;

  state.logger.log(
    LogLevel::Info,
    format!("Updated {} {id}", T::LABEL),
    Some(audit(&updated)),
    Some(rid.as_str()),
  );
  ok(updated)
}

async fn remove<T: Mirrored, S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  id: &str,
) -> Result<Response, ApiError> {
  let mut mirror = state.mirror.lock().await;
  let items = T::items_mut(&mut mirror);
  let index = items
    .iter()
    .position(|e| e.id() == id)
    .ok_or_else(not_found::<T>)?;
  items.remove(index);
  state.save_all(&mut mirror, Some(rid.as_str())).await?;

  state
    .logger
    .info(format!("Deleted {} {id}", T::LABEL), Some(rid.as_str()));
  success()
}

//! HTTP handlers and the middleware wrapped around every `/api` route.
//!
//! Handlers follow one shape: extract what they need, run an inner
//! `Result<Response, ApiError>` dispatch on the method, then pass the result
//! through [`finish`] so failures are logged against the request's
//! correlation id before being rendered.

pub mod agents;
pub mod chat_history;
pub mod conversations;
pub mod events;
pub mod management;
pub mod resource;
pub mod validate;

use analyst_core::store::ObjectStore;
use axum::{
  Extension, Json,
  extract::{Request, State},
  http::{HeaderValue, Method, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{ApiError, AppState, lock, logger::LogLevel};

pub(crate) const ALLOW_ORIGIN: &str = "*";
pub(crate) const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
pub(crate) const ALLOW_HEADERS: &str = "Content-Type";

// ─── Correlation ids ─────────────────────────────────────────────────────────

/// Per-request correlation id, `req_<unix millis>_<9 random chars>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
  pub fn generate() -> Self {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    Self(format!("req_{millis}_{}", &random[..9]))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Response extension set by handlers that empty the log buffer. The exit
/// line for that request is then written to `tracing` only.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogsCleared;

// ─── Middleware ──────────────────────────────────────────────────────────────

/// Assign a correlation id, track the request as active, and log entry and
/// exit.
pub async fn request_log<S>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let rid = RequestId::generate();
  let method = req.method().clone();
  let uri = req.uri().clone();

  state.logger.log(
    LogLevel::Debug,
    format!("Incoming {method} request to {uri}"),
    Some(json!({ "method": method.as_str(), "url": uri.to_string() })),
    Some(rid.as_str()),
  );
  lock(&state.active_requests).insert(rid.0.clone());
  req.extensions_mut().insert(rid.clone());

  let res = next.run(req).await;

  lock(&state.active_requests).remove(&rid.0);
  let status = res.status().as_u16();
  if res.extensions().get::<LogsCleared>().is_some() {
    tracing::debug!(request_id = rid.as_str(), status, "Response for request");
  } else {
    state.logger.log(
      LogLevel::Debug,
      format!("Response for request {}", rid.as_str()),
      Some(json!({ "status": status })),
      Some(rid.as_str()),
    );
  }
  res
}

/// Answer preflights with 204 and stamp CORS headers on every response.
pub async fn cors(req: Request, next: Next) -> Response {
  let mut res = if req.method() == Method::OPTIONS {
    StatusCode::NO_CONTENT.into_response()
  } else {
    next.run(req).await
  };

  let headers = res.headers_mut();
  headers.insert(
    header::ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue::from_static(ALLOW_ORIGIN),
  );
  headers.insert(
    header::ACCESS_CONTROL_ALLOW_METHODS,
    HeaderValue::from_static(ALLOW_METHODS),
  );
  headers.insert(
    header::ACCESS_CONTROL_ALLOW_HEADERS,
    HeaderValue::from_static(ALLOW_HEADERS),
  );
  res
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// Any `/api` path no resource claims.
pub async fn not_found<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  finish(&state, &rid, Err(ApiError::NotFound("Endpoint not found".into())))
}

/// Render a handler result, logging failures against `rid`.
pub(crate) fn finish<S: ObjectStore>(
  state: &AppState<S>,
  rid: &RequestId,
  result: Result<Response, ApiError>,
) -> Response {
  match result {
    Ok(res) => res,
    Err(e) => {
      state.logger.error(format!("API Error: {e}"), Some(rid.as_str()));
      e.into_response()
    }
  }
}

/// Decode a JSON request body, telling malformed JSON apart from a
/// well-formed body of the wrong shape.
pub(crate) fn read_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
  let value: Value = serde_json::from_slice(body)
    .map_err(|_| ApiError::BadRequest("Invalid JSON in request body".into()))?;
  serde_json::from_value(value)
    .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

pub(crate) fn json<T: Serialize>(status: StatusCode, body: T) -> Result<Response, ApiError> {
  Ok((status, Json(body)).into_response())
}

pub(crate) fn ok<T: Serialize>(body: T) -> Result<Response, ApiError> {
  json(StatusCode::OK, body)
}

pub(crate) fn success() -> Result<Response, ApiError> {
  ok(json!({ "success": true }))
}

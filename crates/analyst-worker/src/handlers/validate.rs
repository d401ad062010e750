//! `POST /validate/:kind/:id`, a connection check stub.
//!
//! Waits `validation_delay_ms` and always reports success; nothing is
//! contacted and the id is not looked up.

use std::time::Duration;

use analyst_core::store::ObjectStore;
use axum::{
  Extension,
  extract::{Path, State},
  http::Method,
  response::Response,
};
use serde::Serialize;

use super::{RequestId, finish, ok};
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct ValidationResult {
  pub valid:   bool,
  pub message: &'static str,
}

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  Path((kind, id)): Path<(String, String)>,
  method: Method,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let result = if method == Method::POST {
    state
      .logger
      .info(format!("Validating {kind} connection {id}"), Some(rid.as_str()));
    tokio::time::sleep(Duration::from_millis(state.config.validation_delay_ms)).await;
    ok(ValidationResult { valid: true, message: "Connection successful" })
  } else {
    Err(ApiError::MethodNotAllowed)
  };
  finish(&state, &rid, result)
}

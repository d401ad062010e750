//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// The display form is exactly what lands in the `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  NotFound(String),

  #[error("Method not allowed")]
  MethodNotAllowed,

  #[error("Internal server error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("Internal server error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    ApiError::Store(Box::new(err))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
      ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<analyst_core::Error> for ApiError {
  fn from(err: analyst_core::Error) -> Self {
    match err {
      analyst_core::Error::Invalid(message) => ApiError::BadRequest(message),
      other => ApiError::Internal(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_entities_are_bad_requests() {
    let err: ApiError = analyst_core::Error::Invalid("Model name is required".into()).into();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "Model name is required");
  }

  #[test]
  fn store_errors_are_prefixed() {
    let err = ApiError::store(std::io::Error::other("disk full"));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.to_string(), "Internal server error: disk full");
  }
}

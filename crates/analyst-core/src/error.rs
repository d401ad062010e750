//! Error types for `analyst-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// An entity failed a field-level rule (e.g. a provider without a model).
  #[error("{0}")]
  Invalid(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

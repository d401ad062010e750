//! Error type for `analyst-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The targeted collection has no table in the current database.
  #[error("object store not found: {0}")]
  CollectionNotFound(String),

  /// A document without a string `id` field was offered for insertion.
  #[error("document in {0} has no string id")]
  MissingId(String),
}

impl Error {
  /// Whether this error is the schema-mismatch signature that warrants a
  /// database reset.
  pub fn is_missing_collection(&self) -> bool {
    matches!(self, Error::CollectionNotFound(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

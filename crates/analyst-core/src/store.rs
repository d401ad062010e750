//! The `ObjectStore` trait and document helpers.
//!
//! An object store is a versioned set of named collections, each holding JSON
//! documents keyed by their `id` field. It is implemented by storage backends
//! (e.g. `analyst-store-sqlite`); the worker depends on this abstraction only.
//!
//! Reads and deletes are tolerant of a missing collection. Writes are not:
//! `create` and `update` against a missing collection fail with an error for
//! which [`ObjectStore::is_missing_collection`] returns `true`.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Collection, Result};

/// Abstraction over a local, versioned document database.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait ObjectStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Bring the schema up to the latest version. Idempotent.
  fn init(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Every document in `collection`; empty if the collection does not exist.
  fn get_all(
    &self,
    collection: Collection,
  ) -> impl Future<Output = Result<Vec<Value>, Self::Error>> + Send + '_;

  /// One document by id; `None` if either the collection or the id is absent.
  fn get_by_id<'a>(
    &'a self,
    collection: Collection,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;

  /// Insert a new document. Fails if the collection is missing or the id is
  /// already present.
  fn create(
    &self,
    collection: Collection,
    doc: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert or replace the document stored under `id`.
  fn update<'a>(
    &'a self,
    collection: Collection,
    id: &'a str,
    doc: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove a document. Missing collection or id is not an error.
  fn delete<'a>(
    &'a self,
    collection: Collection,
    id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove every document in one collection; no-op if it does not exist.
  fn clear(
    &self,
    collection: Collection,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Clear every known collection.
  fn clear_all(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Destroy the whole database and recreate it at the latest schema.
  ///
  /// Best-effort: if the underlying storage cannot be deleted the backend
  /// logs and wipes in place instead.
  fn reset_database(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The schema version currently recorded in the database.
  fn schema_version(&self) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  /// Whether `err` means the targeted collection does not exist.
  fn is_missing_collection(err: &Self::Error) -> bool;
}

/// Serialise an entity into a stored document.
pub fn to_document<T: Serialize>(entity: &T) -> Result<Value> {
  Ok(serde_json::to_value(entity)?)
}

/// Deserialise a stored document into an entity.
pub fn from_document<T: DeserializeOwned>(doc: Value) -> Result<T> {
  Ok(serde_json::from_value(doc)?)
}

/// The `id` field of a document, if it has a string one.
pub fn document_id(doc: &Value) -> Option<&str> {
  doc.get("id").and_then(Value::as_str)
}

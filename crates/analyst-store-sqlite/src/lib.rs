//! SQLite backend for the analyst object store.
//!
//! Each collection is one table of JSON documents keyed by `id`. Wraps
//! [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

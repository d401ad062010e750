//! Core types and trait definitions for the analyst worker.
//!
//! This crate is free of HTTP and database dependencies. It owns
//! the entity model, the collection catalogue, the [`store::ObjectStore`]
//! abstraction and the demo fixtures used to seed an empty store.

pub mod agent;
pub mod collection;
pub mod conversation;
pub mod datastore;
pub mod entity;
pub mod error;
pub mod fixtures;
pub mod provider;
pub mod store;

pub use collection::Collection;
pub use entity::Entity;
pub use error::{Error, Result};

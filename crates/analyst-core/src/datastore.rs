//! Datastore connection records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Collection, Result,
  entity::{Entity, advance},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreKind {
  Postgres,
  Surrealdb,
  Mysql,
  Mongodb,
  Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastore {
  pub id:                String,
  pub name:              String,
  #[serde(rename = "type")]
  pub kind:              DatastoreKind,
  pub connection_string: String,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
  pub is_active:         bool,
}

/// JSON body accepted by `POST /datastores`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDatastore {
  pub name:              String,
  #[serde(rename = "type")]
  pub kind:              DatastoreKind,
  #[serde(default)]
  pub connection_string: String,
}

/// JSON body accepted by `PUT /datastores/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastorePatch {
  pub name:              Option<String>,
  #[serde(rename = "type")]
  pub kind:              Option<DatastoreKind>,
  pub connection_string: Option<String>,
  pub is_active:         Option<bool>,
}

impl Entity for Datastore {
  const COLLECTION: Collection = Collection::Datastores;
  const LABEL: &'static str = "Datastore";

  type Input = NewDatastore;
  type Patch = DatastorePatch;

  fn id(&self) -> &str { &self.id }
  fn created_at(&self) -> DateTime<Utc> { self.created_at }
  fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

  fn from_input(id: String, input: NewDatastore, now: DateTime<Utc>) -> Result<Self> {
    Ok(Datastore {
      id,
      name:              input.name,
      kind:              input.kind,
      connection_string: input.connection_string,
      created_at:        now,
      updated_at:        now,
      is_active:         true,
    })
  }

  fn apply_patch(&mut self, patch: DatastorePatch, now: DateTime<Utc>) -> Result<()> {
    if let Some(name) = patch.name {
      self.name = name;
    }
    if let Some(kind) = patch.kind {
      self.kind = kind;
    }
    if let Some(conn) = patch.connection_string {
      self.connection_string = conn;
    }
    if let Some(active) = patch.is_active {
      self.is_active = active;
    }
    self.updated_at = advance(self.updated_at, now);
    Ok(())
  }
}

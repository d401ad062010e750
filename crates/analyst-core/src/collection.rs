//! The catalogue of named collections and their secondary indexes.
//!
//! Each collection holds one entity type keyed by its `id`. The catalogue is
//! versioned: a collection records the schema version that introduced it, so
//! a backend can upgrade an older database by creating only what is new.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The schema version a fresh database is created at.
pub const SCHEMA_VERSION: u32 = 2;

/// A named collection of entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
  Agents,
  LlmProviders,
  Datastores,
  Conversations,
  ChatHistory,
}

impl Collection {
  /// Every collection, in the order they are loaded and saved.
  pub const ALL: [Collection; 5] = [
    Collection::Agents,
    Collection::LlmProviders,
    Collection::Datastores,
    Collection::Conversations,
    Collection::ChatHistory,
  ];

  /// Storage name of the collection.
  pub fn name(self) -> &'static str {
    match self {
      Collection::Agents        => "agents",
      Collection::LlmProviders  => "llmProviders",
      Collection::Datastores    => "datastores",
      Collection::Conversations => "conversations",
      Collection::ChatHistory   => "chatHistory",
    }
  }

  /// Document fields that carry a non-unique secondary index.
  pub fn indexed_fields(self) -> &'static [&'static str] {
    match self {
      Collection::Agents => &["createdAt", "updatedAt", "isActive"],
      Collection::LlmProviders | Collection::Datastores => {
        &["createdAt", "updatedAt", "isActive", "type"]
      }
      Collection::Conversations => &["createdAt", "updatedAt", "isActive", "title"],
      Collection::ChatHistory => &["title", "active"],
    }
  }

  /// The schema version in which this collection first appeared.
  pub fn since_version(self) -> u32 {
    match self {
      Collection::Agents | Collection::LlmProviders | Collection::Datastores => 1,
      Collection::Conversations | Collection::ChatHistory => 2,
    }
  }

  /// Collections that exist in a database at `version`.
  pub fn up_to(version: u32) -> impl Iterator<Item = Collection> {
    Self::ALL.into_iter().filter(move |c| c.since_version() <= version)
  }
}

impl fmt::Display for Collection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn version_one_has_only_the_first_three() {
    let v1: Vec<_> = Collection::up_to(1).collect();
    assert_eq!(
      v1,
      vec![Collection::Agents, Collection::LlmProviders, Collection::Datastores]
    );
    assert_eq!(Collection::up_to(SCHEMA_VERSION).count(), 5);
  }

  #[test]
  fn storage_names_are_unique() {
    let mut names: Vec<_> = Collection::ALL.iter().map(|c| c.name()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), Collection::ALL.len());
  }
}

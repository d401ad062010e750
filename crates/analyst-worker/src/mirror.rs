//! The in-memory mirror of every collection, and its persistence.
//!
//! The mirror is the source of truth during a session. Every mutation is
//! followed by [`AppState::save_all`], which rewrites the whole snapshot to the
//! store. A write that hits a missing collection means the database predates
//! the current schema; the state machine in [`RecoveryState`] allows exactly
//! one reset-and-reseed attempt before giving up.

use analyst_core::{
  Collection, Entity,
  agent::Agent,
  conversation::{ChatHistoryItem, Conversation},
  datastore::Datastore,
  fixtures::{DemoData, demo_fixtures},
  provider::LlmProvider,
  store::{ObjectStore, document_id, from_document, to_document},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{ApiError, AppState, lock};

// ─── Mirror ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
  pub agents:        Vec<Agent>,
  pub llm_providers: Vec<LlmProvider>,
  pub datastores:    Vec<Datastore>,
  pub conversations: Vec<Conversation>,
  pub chat_history:  Vec<ChatHistoryItem>,
}

impl From<DemoData> for Mirror {
  fn from(d: DemoData) -> Self {
    Mirror {
      agents:        d.agents,
      llm_providers: d.llm_providers,
      datastores:    d.datastores,
      conversations: d.conversations,
      chat_history:  d.chat_history,
    }
  }
}

fn documents<T: Serialize>(items: &[T]) -> Vec<analyst_core::Result<Value>> {
  items.iter().map(to_document).collect()
}

fn parse<T: serde::de::DeserializeOwned>(docs: Vec<Value>) -> analyst_core::Result<Vec<T>> {
  docs.into_iter().map(from_document).collect()
}

impl Mirror {
  /// The full demo fixture set.
  pub fn demo() -> Self {
    demo_fixtures().into()
  }

  /// Serialised form of every entity in `collection`.
  pub fn documents(&self, collection: Collection) -> Vec<analyst_core::Result<Value>> {
    match collection {
      Collection::Agents => documents(&self.agents),
      Collection::LlmProviders => documents(&self.llm_providers),
      Collection::Datastores => documents(&self.datastores),
      Collection::Conversations => documents(&self.conversations),
      Collection::ChatHistory => documents(&self.chat_history),
    }
  }

  /// Replace `collection` with the entities decoded from `docs`.
  pub fn adopt(&mut self, collection: Collection, docs: Vec<Value>) -> analyst_core::Result<()> {
    match collection {
      Collection::Agents => self.agents = parse(docs)?,
      Collection::LlmProviders => self.llm_providers = parse(docs)?,
      Collection::Datastores => self.datastores = parse(docs)?,
      Collection::Conversations => self.conversations = parse(docs)?,
      Collection::ChatHistory => self.chat_history = parse(docs)?,
    }
    Ok(())
  }

  /// Replace `collection` with its demo fixtures.
  pub fn seed(&mut self, collection: Collection, fixtures: &DemoData) {
    match collection {
      Collection::Agents => self.agents = fixtures.agents.clone(),
      Collection::LlmProviders => self.llm_providers = fixtures.llm_providers.clone(),
      Collection::Datastores => self.datastores = fixtures.datastores.clone(),
      Collection::Conversations => self.conversations = fixtures.conversations.clone(),
      Collection::ChatHistory => self.chat_history = fixtures.chat_history.clone(),
    }
  }

  pub fn len(&self, collection: Collection) -> usize {
    match collection {
      Collection::Agents => self.agents.len(),
      Collection::LlmProviders => self.llm_providers.len(),
      Collection::Datastores => self.datastores.len(),
      Collection::Conversations => self.conversations.len(),
      Collection::ChatHistory => self.chat_history.len(),
    }
  }
}

/// An entity type with a typed slot in the [`Mirror`].
pub trait Mirrored: Entity {
  fn items(mirror: &Mirror) -> &Vec<Self>;
  fn items_mut(mirror: &mut Mirror) -> &mut Vec<Self>;
}

macro_rules! mirrored {
  ($ty:ty, $field:ident) => {
    impl Mirrored for $ty {
      fn items(mirror: &Mirror) -> &Vec<Self> { &mirror.$field }
      fn items_mut(mirror: &mut Mirror) -> &mut Vec<Self> { &mut mirror.$field }
    }
  };
}

mirrored!(Agent, agents);
mirrored!(LlmProvider, llm_providers);
mirrored!(Datastore, datastores);
mirrored!(Conversation, conversations);

// ─── Recovery ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryState {
  Normal,
  Recovering,
  /// A recovery attempt failed. Saves report errors until an explicit
  /// database reset succeeds.
  Failed,
}

// ─── Load / save ─────────────────────────────────────────────────────────────

impl<S: ObjectStore> AppState<S> {
  /// Populate the mirror from the store.
  ///
  /// Collections that come back empty are seeded from fixtures and the result
  /// is written back. If the store cannot be read at all the mirror becomes
  /// the full fixture set and nothing is written.
  pub async fn load_all(&self) {
    let mut mirror = self.mirror.lock().await;

    match self.read_snapshot().await {
      Ok((loaded, seeded)) => {
        *mirror = loaded;
        if seeded.is_empty() {
          self.logger.info("Loaded data from object store", None);
          return;
        }
        let names: Vec<_> = seeded.iter().map(|c| c.name()).collect();
        self.logger.log(
          crate::logger::LogLevel::Info,
          "Seeded empty collections with demo data",
          Some(json!({ "collections": names })),
          None,
        );
        if let Err(e) = self.save_all(&mut mirror, None).await {
          self.logger.error(format!("Failed to persist demo data: {e}"), None);
        }
      }
      Err(e) => {
        self.logger.error(format!("Failed to load data, using demo data: {e}"), None);
        *mirror = Mirror::demo();
      }
    }
  }

  async fn read_snapshot(&self) -> Result<(Mirror, Vec<Collection>), ApiError> {
    let fixtures = demo_fixtures();
    let mut mirror = Mirror::default();
    let mut seeded = Vec::new();

    for collection in Collection::ALL {
      let docs = self.store.get_all(collection).await.map_err(ApiError::store)?;
      if docs.is_empty() {
        mirror.seed(collection, &fixtures);
        seeded.push(collection);
      } else {
        mirror.adopt(collection, docs)?;
      }
    }
    Ok((mirror, seeded))
  }

  /// Persist the whole mirror, recovering once from a schema mismatch.
  ///
  /// Recovery replaces the mirror with fixtures, so the caller's pending
  /// change is lost when it happens.
  pub(crate) async fn save_all(
    &self,
    mirror: &mut Mirror,
    request_id: Option<&str>,
  ) -> Result<(), ApiError> {
    match self.write_snapshot(mirror, request_id).await {
      Ok(()) => Ok(()),
      Err(e) if S::is_missing_collection(&e) => self.recover(mirror, e, request_id).await,
      Err(e) => Err(ApiError::store(e)),
    }
  }

  /// Clear and rewrite every collection.
  ///
  /// Entities that fail to serialise or insert are logged and skipped. A
  /// missing collection aborts the write and is returned to the caller.
  pub(crate) async fn write_snapshot(
    &self,
    mirror: &Mirror,
    request_id: Option<&str>,
  ) -> Result<(), S::Error> {
    for collection in Collection::ALL {
      self.store.clear(collection).await?;

      for doc in mirror.documents(collection) {
        let doc = match doc {
          Ok(doc) => doc,
          Err(e) => {
            self.logger.warn(format!("Skipping unserialisable {collection} entity: {e}"), request_id);
            continue;
          }
        };
        let id = document_id(&doc).unwrap_or_default().to_owned();
        match self.store.create(collection, doc).await {
          Ok(()) => {}
          Err(e) if S::is_missing_collection(&e) => return Err(e),
          Err(e) => {
            self.logger.warn(format!("Failed to save {collection} entity {id}: {e}"), request_id);
          }
        }
      }
    }
    Ok(())
  }

  async fn recover(
    &self,
    mirror: &mut Mirror,
    cause: S::Error,
    request_id: Option<&str>,
  ) -> Result<(), ApiError> {
    {
      let mut state = lock(&self.recovery);
      if *state != RecoveryState::Normal {
        return Err(ApiError::store(cause));
      }
      *state = RecoveryState::Recovering;
    }

    self.logger.warn(
      format!("Object store missing ({cause}); resetting database"),
      request_id,
    );

    match self.reseed(mirror, request_id).await {
      Ok(()) => {
        *lock(&self.recovery) = RecoveryState::Normal;
        self.logger.info("Database reset and reseeded with demo data", request_id);
        if request_id.is_some() {
          self.logger.warn("Pending change discarded by database recovery", request_id);
        }
        Ok(())
      }
      Err(e) => {
        *lock(&self.recovery) = RecoveryState::Failed;
        self.logger.error(format!("Database recovery failed: {e}"), request_id);
        Err(ApiError::store(e))
      }
    }
  }

  /// Reset the database and write the fixture set into it.
  pub(crate) async fn reseed(
    &self,
    mirror: &mut Mirror,
    request_id: Option<&str>,
  ) -> Result<(), S::Error> {
    self.store.reset_database().await?;
    *mirror = Mirror::demo();
    self.write_snapshot(mirror, request_id).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn demo_mirror_fills_every_collection() {
    let m = Mirror::demo();
    for c in Collection::ALL {
      assert!(m.len(c) > 0, "{c}");
    }
  }

  #[test]
  fn documents_round_trip_through_adopt() {
    let demo = Mirror::demo();
    let mut copy = Mirror::default();
    for c in Collection::ALL {
      let docs = demo.documents(c).into_iter().collect::<Result<Vec<_>, _>>().unwrap();
      copy.adopt(c, docs).unwrap();
    }
    assert_eq!(copy, demo);
  }

  #[test]
  fn seeding_one_collection_leaves_others_alone() {
    let mut m = Mirror::default();
    m.seed(Collection::Datastores, &demo_fixtures());
    assert_eq!(m.len(Collection::Datastores), 2);
    assert_eq!(m.len(Collection::Agents), 0);
  }
}

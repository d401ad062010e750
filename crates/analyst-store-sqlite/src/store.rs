//! The SQLite implementation of [`ObjectStore`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use analyst_core::{
  Collection,
  collection::SCHEMA_VERSION,
  store::{ObjectStore, document_id},
};
use rusqlite::OptionalExtension as _;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_rusqlite::Connection;

use crate::{
  Error, Result,
  schema::{PRAGMAS, migrate, table_exists, user_version, wipe},
};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Location {
  File(PathBuf),
  Memory,
}

/// An object store backed by a single SQLite file.
///
/// Cloning is cheap. All clones share one connection slot, so a
/// [`reset_database`](ObjectStore::reset_database) through any clone is seen
/// by every other.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     Arc<RwLock<Connection>>,
  location: Location,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring the schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_schema(path, SCHEMA_VERSION).await
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with_schema(SCHEMA_VERSION).await
  }

  /// Open a store whose schema stops at `version`.
  ///
  /// Reproduces a database written by an older release. A later
  /// [`init`](ObjectStore::init) or
  /// [`reset_database`](ObjectStore::reset_database) moves it to the latest
  /// version.
  pub async fn open_with_schema(path: impl AsRef<Path>, version: u32) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }
    Self::connect(Location::File(path), version).await
  }

  /// In-memory variant of [`open_with_schema`](Self::open_with_schema).
  pub async fn open_in_memory_with_schema(version: u32) -> Result<Self> {
    Self::connect(Location::Memory, version).await
  }

  async fn connect(location: Location, version: u32) -> Result<Self> {
    let conn = open_connection(&location, version).await?;
    Ok(Self { conn: Arc::new(RwLock::new(conn)), location })
  }

  async fn conn(&self) -> Connection {
    self.conn.read().await.clone()
  }

  /// Run `write` against `collection` if its table exists.
  ///
  /// Returns [`Error::CollectionNotFound`] otherwise.
  async fn write<F>(&self, collection: Collection, write: F) -> Result<()>
  where
    F: FnOnce(&rusqlite::Connection, &str) -> rusqlite::Result<()> + Send + 'static,
  {
    let table = collection.name();
    let found = self
      .conn()
      .await
      .call(move |conn| {
        if !table_exists(conn, table)? {
          return Ok(false);
        }
        write(conn, table)?;
        Ok(true)
      })
      .await?;

    if found { Ok(()) } else { Err(Error::CollectionNotFound(table.to_owned())) }
  }
}

async fn open_connection(location: &Location, version: u32) -> Result<Connection> {
  let conn = match location {
    Location::File(path) => Connection::open(path).await?,
    Location::Memory => Connection::open_in_memory().await?,
  };
  conn
    .call(move |conn| {
      conn.execute_batch(PRAGMAS)?;
      migrate(conn, version)?;
      Ok(())
    })
    .await?;
  Ok(conn)
}

/// Delete the database file and its WAL side files. Absent files are fine.
///
/// Side files go first so a stale WAL is never replayed into a fresh file.
async fn remove_database_files(path: &Path) -> std::io::Result<()> {
  let mut candidates = Vec::with_capacity(3);
  for suffix in ["-wal", "-shm"] {
    let mut side = path.as_os_str().to_owned();
    side.push(suffix);
    candidates.push(PathBuf::from(side));
  }
  candidates.push(path.to_path_buf());
  for file in candidates {
    match tokio::fs::remove_file(&file).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e),
    }
  }
  Ok(())
}

/// Reopen `path` after an attempt to delete it. If the deletion was blocked
/// the surviving database is wiped in place.
pub(crate) async fn reopen_after_delete(
  path: &Path,
  removed: std::io::Result<()>,
) -> Result<Connection> {
  let conn = Connection::open(path).await?;
  if let Err(e) = removed {
    tracing::warn!("database deletion blocked ({e}); wiping {} in place", path.display());
    wipe_in_place(&conn).await?;
  }
  Ok(conn)
}

async fn wipe_in_place(conn: &Connection) -> Result<()> {
  conn
    .call(|conn| {
      wipe(conn)?;
      Ok(())
    })
    .await?;
  Ok(())
}

// ─── ObjectStore impl ────────────────────────────────────────────────────────

impl ObjectStore for SqliteStore {
  type Error = Error;

  async fn init(&self) -> Result<()> {
    self
      .conn()
      .await
      .call(|conn| {
        migrate(conn, SCHEMA_VERSION)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_all(&self, collection: Collection) -> Result<Vec<Value>> {
    let table = collection.name();

    let raws: Vec<String> = self
      .conn()
      .await
      .call(move |conn| {
        if !table_exists(conn, table)? {
          return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!("SELECT doc FROM \"{table}\" ORDER BY rowid"))?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .iter()
      .map(|raw| serde_json::from_str(raw).map_err(Error::from))
      .collect()
  }

  async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
    let table = collection.name();
    let id = id.to_owned();

    let raw: Option<String> = self
      .conn()
      .await
      .call(move |conn| {
        if !table_exists(conn, table)? {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!("SELECT doc FROM \"{table}\" WHERE id = ?1"),
              rusqlite::params![id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| serde_json::from_str(&r).map_err(Error::from)).transpose()
  }

  async fn create(&self, collection: Collection, doc: Value) -> Result<()> {
    let id = document_id(&doc)
      .ok_or_else(|| Error::MissingId(collection.name().to_owned()))?
      .to_owned();
    let body = doc.to_string();

    self
      .write(collection, move |conn, table| {
        conn.execute(
          &format!("INSERT INTO \"{table}\" (id, doc) VALUES (?1, ?2)"),
          rusqlite::params![id, body],
        )?;
        Ok(())
      })
      .await
  }

  async fn update(&self, collection: Collection, id: &str, mut doc: Value) -> Result<()> {
    if let Some(obj) = doc.as_object_mut() {
      obj.insert("id".to_owned(), Value::String(id.to_owned()));
    }
    let id = id.to_owned();
    let body = doc.to_string();

    self
      .write(collection, move |conn, table| {
        conn.execute(
          &format!(
            "INSERT INTO \"{table}\" (id, doc) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc"
          ),
          rusqlite::params![id, body],
        )?;
        Ok(())
      })
      .await
  }

  async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
    let table = collection.name();
    let id = id.to_owned();

    self
      .conn()
      .await
      .call(move |conn| {
        if table_exists(conn, table)? {
          conn.execute(
            &format!("DELETE FROM \"{table}\" WHERE id = ?1"),
            rusqlite::params![id],
          )?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn clear(&self, collection: Collection) -> Result<()> {
    let table = collection.name();

    self
      .conn()
      .await
      .call(move |conn| {
        if table_exists(conn, table)? {
          conn.execute(&format!("DELETE FROM \"{table}\""), [])?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn clear_all(&self) -> Result<()> {
    for collection in Collection::ALL {
      self.clear(collection).await?;
    }
    Ok(())
  }

  async fn reset_database(&self) -> Result<()> {
    let mut slot = self.conn.write().await;

    match &self.location {
      Location::Memory => {
        wipe_in_place(&slot).await?;
      }
      Location::File(path) => {
        if let Err(e) = slot.clone().close().await {
          tracing::warn!("closing database before reset failed: {e}");
        }
        let removed = remove_database_files(path).await;
        *slot = reopen_after_delete(path, removed).await?;
      }
    }

    slot
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        migrate(conn, SCHEMA_VERSION)?;
        Ok(())
      })
      .await?;
    tracing::info!("database reset to schema version {SCHEMA_VERSION}");
    Ok(())
  }

  async fn schema_version(&self) -> Result<u32> {
    Ok(
      self
        .conn()
        .await
        .call(|conn| Ok(user_version(conn)?))
        .await?,
    )
  }

  fn is_missing_collection(err: &Error) -> bool {
    err.is_missing_collection()
  }
}

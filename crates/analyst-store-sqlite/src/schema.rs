//! SQL schema for the analyst SQLite store.
//!
//! The schema version lives in `PRAGMA user_version`. Migrations are additive:
//! moving from version `n` to `m` creates the collections introduced in
//! `n+1..=m` and leaves everything else alone.

use analyst_core::Collection;
use rusqlite::{Connection, OptionalExtension as _};

/// Connection-level settings applied on every open.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// DDL for one collection table and its secondary indexes; idempotent.
pub fn collection_ddl(collection: Collection) -> String {
  let table = collection.name();
  let mut ddl = format!(
    "CREATE TABLE IF NOT EXISTS \"{table}\" (
    id  TEXT PRIMARY KEY,
    doc TEXT NOT NULL    -- JSON document, `id` field mirrors the key
);
"
  );
  for field in collection.indexed_fields() {
    ddl.push_str(&format!(
      "CREATE INDEX IF NOT EXISTS \"{table}_{field}_idx\" \
       ON \"{table}\"(json_extract(doc, '$.{field}'));\n"
    ));
  }
  ddl
}

pub fn user_version(conn: &Connection) -> rusqlite::Result<u32> {
  conn.query_row("PRAGMA user_version", [], |r| r.get(0))
}

/// Upgrade the schema to `target`. Returns the version after migration.
///
/// A database already at or above `target` is left untouched.
pub fn migrate(conn: &mut Connection, target: u32) -> rusqlite::Result<u32> {
  let current = user_version(conn)?;
  if current >= target {
    return Ok(current);
  }

  let tx = conn.transaction()?;
  for collection in Collection::up_to(target) {
    if collection.since_version() > current {
      tx.execute_batch(&collection_ddl(collection))?;
    }
  }
  tx.execute_batch(&format!("PRAGMA user_version = {target};"))?;
  tx.commit()?;
  Ok(target)
}

pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

/// Drop every user table and reset the version to zero.
pub fn wipe(conn: &Connection) -> rusqlite::Result<()> {
  let tables: Vec<String> = {
    let mut stmt = conn.prepare(
      "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    stmt
      .query_map([], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };
  for table in tables {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{table}\";"))?;
  }
  conn.execute_batch("PRAGMA user_version = 0;")?;
  Ok(())
}

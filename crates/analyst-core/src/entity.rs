//! The [`Entity`] trait shared by every timestamped, id-keyed record.
//!
//! Creation goes through a typed `Input` and updates through a typed `Patch`.
//! Both are closed field lists: anything a client sends beyond them is
//! dropped at deserialisation, and neither can carry `id`, `createdAt` or
//! `updatedAt`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Collection, Result};

/// A record stored in one [`Collection`], keyed by an immutable id.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
  /// The collection this entity lives in.
  const COLLECTION: Collection;
  /// Human-readable name used in error messages (`"Agent not found"`).
  const LABEL: &'static str;

  /// Body accepted on creation.
  type Input: DeserializeOwned + Send;
  /// Body accepted on update; every field is optional.
  type Patch: DeserializeOwned + Send;

  fn id(&self) -> &str;
  fn created_at(&self) -> DateTime<Utc>;
  fn updated_at(&self) -> DateTime<Utc>;

  /// Build a new entity with a server-assigned `id` and both timestamps set
  /// to `now`.
  fn from_input(id: String, input: Self::Input, now: DateTime<Utc>) -> Result<Self>;

  /// Merge `patch` into `self` and refresh `updatedAt`.
  fn apply_patch(&mut self, patch: Self::Patch, now: DateTime<Utc>) -> Result<()>;
}

/// Generate a fresh entity id.
pub fn new_id() -> String {
  Uuid::new_v4().simple().to_string()
}

/// The next `updatedAt` value after `prev`, given the wall-clock `now`.
///
/// Always strictly later than `prev`, even if the clock has not moved or has
/// stepped backwards.
pub fn advance(prev: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
  if now > prev { now } else { prev + TimeDelta::microseconds(1) }
}

/// Deserialise a field that distinguishes "absent" from explicit `null`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: absent
/// yields `None`, `null` yields `Some(None)`.
pub fn double_option<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

/// Trim a required text field and reject it if empty.
pub(crate) fn require(value: &str, message: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(crate::Error::Invalid(message.to_owned()));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn advance_is_strict_when_clock_stalls() {
    let t = Utc::now();
    assert!(advance(t, t) > t);
    assert!(advance(t, t - TimeDelta::seconds(5)) > t);
  }

  #[test]
  fn advance_uses_clock_when_it_moves() {
    let t = Utc::now();
    let later = t + TimeDelta::seconds(1);
    assert_eq!(advance(t, later), later);
  }

  #[test]
  fn ids_are_unique() {
    assert_ne!(new_id(), new_id());
  }
}

//! Agents: configured assistants bound to an LLM provider and datastores.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Collection, Result,
  entity::{Entity, advance, double_option},
};

/// Free-form instructions that shape how an agent answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Guidance {
  pub general_instructions: String,
  /// Table name → description of what the table holds.
  pub table_semantics:      BTreeMap<String, String>,
  pub custom_prompts:       Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
  pub id:              String,
  pub name:            String,
  #[serde(default)]
  pub description:     String,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub llm_provider_id: Option<String>,
  #[serde(default)]
  pub datastore_ids:   Vec<String>,
  #[serde(default)]
  pub guidance:        Guidance,
  pub is_active:       bool,
}

/// JSON body accepted by `POST /agents`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
  pub name:            String,
  #[serde(default)]
  pub description:     String,
  pub llm_provider_id: Option<String>,
  #[serde(default)]
  pub datastore_ids:   Vec<String>,
  #[serde(default)]
  pub guidance:        Guidance,
}

/// JSON body accepted by `PUT /agents/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
  pub name:            Option<String>,
  pub description:     Option<String>,
  /// `null` detaches the agent from its provider.
  #[serde(default, deserialize_with = "double_option")]
  pub llm_provider_id: Option<Option<String>>,
  pub datastore_ids:   Option<Vec<String>>,
  pub guidance:        Option<Guidance>,
  pub is_active:       Option<bool>,
}

impl Agent {
  /// Flip activation without touching anything else.
  pub fn set_active(&mut self, is_active: bool, now: DateTime<Utc>) {
    self.is_active = is_active;
    self.updated_at = advance(self.updated_at, now);
  }
}

impl Entity for Agent {
  const COLLECTION: Collection = Collection::Agents;
  const LABEL: &'static str = "Agent";

  type Input = NewAgent;
  type Patch = AgentPatch;

  fn id(&self) -> &str { &self.id }
  fn created_at(&self) -> DateTime<Utc> { self.created_at }
  fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

  fn from_input(id: String, input: NewAgent, now: DateTime<Utc>) -> Result<Self> {
    Ok(Agent {
      id,
      name:            input.name,
      description:     input.description,
      created_at:      now,
      updated_at:      now,
      llm_provider_id: input.llm_provider_id,
      datastore_ids:   input.datastore_ids,
      guidance:        input.guidance,
      is_active:       true,
    })
  }

  fn apply_patch(&mut self, patch: AgentPatch, now: DateTime<Utc>) -> Result<()> {
    if let Some(name) = patch.name {
      self.name = name;
    }
    if let Some(description) = patch.description {
      self.description = description;
    }
    if let Some(provider) = patch.llm_provider_id {
      self.llm_provider_id = provider;
    }
    if let Some(ids) = patch.datastore_ids {
      self.datastore_ids = ids;
    }
    if let Some(guidance) = patch.guidance {
      self.guidance = guidance;
    }
    if let Some(active) = patch.is_active {
      self.is_active = active;
    }
    self.updated_at = advance(self.updated_at, now);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn agent() -> Agent {
    let input: NewAgent = serde_json::from_value(json!({
      "name": "Sales Assistant",
      "llmProviderId": "openai-1",
      "datastoreIds": ["postgres-1"],
    }))
    .unwrap();
    Agent::from_input("a1".into(), input, Utc::now()).unwrap()
  }

  #[test]
  fn patch_ignores_identity_fields() {
    let mut a = agent();
    let created = a.created_at;
    let patch: AgentPatch = serde_json::from_value(json!({
      "id": "hijacked",
      "createdAt": "1999-01-01T00:00:00Z",
      "name": "Renamed",
      "isAdmin": true,
    }))
    .unwrap();
    a.apply_patch(patch, Utc::now()).unwrap();
    assert_eq!(a.id, "a1");
    assert_eq!(a.created_at, created);
    assert_eq!(a.name, "Renamed");
  }

  #[test]
  fn null_provider_detaches() {
    let mut a = agent();
    let patch: AgentPatch =
      serde_json::from_value(json!({ "llmProviderId": null })).unwrap();
    a.apply_patch(patch, Utc::now()).unwrap();
    assert_eq!(a.llm_provider_id, None);

    let mut b = agent();
    let untouched: AgentPatch = serde_json::from_value(json!({})).unwrap();
    b.apply_patch(untouched, Utc::now()).unwrap();
    assert_eq!(b.llm_provider_id.as_deref(), Some("openai-1"));
  }

  #[test]
  fn new_agents_start_active() {
    assert!(agent().is_active);
  }
}

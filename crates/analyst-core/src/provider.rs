//! LLM provider configuration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Collection, Result,
  entity::{Entity, advance, double_option, require},
};

/// The family of API a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  Openai,
  Anthropic,
  Xai,
  Ollama,
  Custom,
}

impl ProviderKind {
  /// Local runtimes authenticate by reachability, not by key.
  pub fn requires_api_key(self) -> bool {
    !matches!(self, ProviderKind::Ollama)
  }

  pub fn requires_base_url(self) -> bool {
    matches!(self, ProviderKind::Ollama | ProviderKind::Custom)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmProvider {
  pub id:         String,
  pub name:       String,
  #[serde(rename = "type")]
  pub kind:       ProviderKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub api_key:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub base_url:   Option<String>,
  pub model_name: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub is_active:  bool,
}

/// JSON body accepted by `POST /llm-providers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLlmProvider {
  pub name:       String,
  #[serde(rename = "type")]
  pub kind:       ProviderKind,
  pub api_key:    Option<String>,
  pub base_url:   Option<String>,
  pub model_name: String,
}

/// JSON body accepted by `PUT /llm-providers/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmProviderPatch {
  pub name:       Option<String>,
  #[serde(rename = "type")]
  pub kind:       Option<ProviderKind>,
  #[serde(default, deserialize_with = "double_option")]
  pub api_key:    Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option")]
  pub base_url:   Option<Option<String>>,
  pub model_name: Option<String>,
  pub is_active:  Option<bool>,
}

impl LlmProvider {
  /// Check the per-kind credential rules.
  pub fn validate(&self) -> Result<()> {
    require(&self.model_name, "Model name is required")?;
    if self.kind.requires_api_key() {
      require(
        self.api_key.as_deref().unwrap_or_default(),
        "API key is required for this provider type",
      )?;
    }
    if self.kind.requires_base_url() {
      require(
        self.base_url.as_deref().unwrap_or_default(),
        "Base URL is required for this provider type",
      )?;
    }
    Ok(())
  }
}

impl Entity for LlmProvider {
  const COLLECTION: Collection = Collection::LlmProviders;
  const LABEL: &'static str = "Provider";

  type Input = NewLlmProvider;
  type Patch = LlmProviderPatch;

  fn id(&self) -> &str { &self.id }
  fn created_at(&self) -> DateTime<Utc> { self.created_at }
  fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

  fn from_input(id: String, input: NewLlmProvider, now: DateTime<Utc>) -> Result<Self> {
    let provider = LlmProvider {
      id,
      name:       input.name,
      kind:       input.kind,
      api_key:    input.api_key,
      base_url:   input.base_url,
      model_name: input.model_name,
      created_at: now,
      updated_at: now,
      is_active:  true,
    };
    provider.validate()?;
    Ok(provider)
  }

  fn apply_patch(&mut self, patch: LlmProviderPatch, now: DateTime<Utc>) -> Result<()> {
    let mut next = self.clone();
    if let Some(name) = patch.name {
      next.name = name;
    }
    if let Some(kind) = patch.kind {
      next.kind = kind;
    }
    if let Some(key) = patch.api_key {
      next.api_key = key;
    }
    if let Some(url) = patch.base_url {
      next.base_url = url;
    }
    if let Some(model) = patch.model_name {
      next.model_name = model;
    }
    if let Some(active) = patch.is_active {
      next.is_active = active;
    }
    next.validate()?;
    next.updated_at = advance(self.updated_at, now);
    *self = next;
    Ok(())
  }
}

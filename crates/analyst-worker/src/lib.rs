//! In-process backend for the analyst UI.
//!
//! Serves the `/api/*` surface over an axum [`Router`], keeps an in-memory
//! [`Mirror`] of every collection as the session's source of truth, and
//! persists full snapshots to any [`ObjectStore`]. UI contexts connect through
//! the [`ClientHub`], over `GET /api/events`, to receive log notifications and
//! bridge replies, and post bridge messages to `POST /api/messages`.

pub mod bridge;
pub mod clients;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod logger;
pub mod mirror;

pub use error::ApiError;

use std::{
  collections::BTreeSet,
  path::PathBuf,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Instant,
};

use analyst_core::{
  conversation::Conversation,
  datastore::Datastore,
  provider::LlmProvider,
  store::ObjectStore,
};
use axum::{
  Router,
  http::StatusCode,
  middleware,
  routing::any,
};
use serde::Deserialize;
use tower_http::services::ServeDir;

use clients::ClientHub;
use handlers::{agents, chat_history, conversations, events, management, resource, validate};
use lifecycle::Lifecycle;
use logger::Logger;
use mirror::{Mirror, RecoveryState};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ANALYST_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Maximum number of entries kept in the log ring buffer.
  pub log_capacity:        usize,
  /// How long the validation stub waits before answering.
  pub validation_delay_ms: u64,
  /// Directory served for every non-`/api` path, if any.
  pub static_dir:          Option<PathBuf>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_string(),
      port:                8787,
      store_path:          PathBuf::from("~/.local/share/analyst/analyst.db"),
      log_capacity:        1000,
      validation_delay_ms: 1000,
      static_dir:          None,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers and the message bridge.
#[derive(Clone)]
pub struct AppState<S: ObjectStore> {
  pub store:   Arc<S>,
  pub config:  Arc<ServerConfig>,
  pub logger:  Arc<Logger>,
  pub clients: Arc<ClientHub>,

  mirror:          Arc<tokio::sync::Mutex<Mirror>>,
  recovery:        Arc<Mutex<RecoveryState>>,
  active_requests: Arc<Mutex<BTreeSet<String>>>,
  lifecycle:       Arc<Mutex<Lifecycle>>,
  started_at:      Instant,
}

impl<S: ObjectStore> AppState<S> {
  /// Build state around `store`. The mirror starts empty until
  /// [`activate`](Self::activate) loads it.
  pub fn new(store: S, config: ServerConfig) -> Self {
    let clients = Arc::new(ClientHub::default());
    let logger = Arc::new(Logger::new(config.log_capacity, clients.clone()));
    Self {
      store: Arc::new(store),
      config: Arc::new(config),
      logger,
      clients,
      mirror: Arc::new(tokio::sync::Mutex::new(Mirror::default())),
      recovery: Arc::new(Mutex::new(RecoveryState::Normal)),
      active_requests: Arc::new(Mutex::new(BTreeSet::new())),
      lifecycle: Arc::new(Mutex::new(Lifecycle::Installed)),
      started_at: Instant::now(),
    }
  }

  /// A copy of the current in-memory collections.
  pub async fn snapshot(&self) -> Mirror {
    self.mirror.lock().await.clone()
  }

  pub fn recovery_state(&self) -> RecoveryState {
    *lock(&self.recovery)
  }

  /// Correlation ids of requests currently in flight.
  pub fn active_requests(&self) -> Vec<String> {
    lock(&self.active_requests).iter().cloned().collect()
  }
}

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the backend.
///
/// Everything under `/api` is answered here with CORS headers and a
/// per-request correlation id. Other paths go to `static_dir` when configured
/// and are a bare 404 otherwise.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ObjectStore + Clone + 'static,
{
  let static_dir = state.config.static_dir.clone();

  let api = Router::new()
    // Agents
    .route("/api/agents",                      any(agents::collection::<S>))
    .route("/api/agents/",                     any(agents::collection::<S>))
    .route("/api/agents/{id}",                 any(agents::item::<S>))
    .route("/api/agents/{id}/",                any(agents::item::<S>))
    .route("/api/agents/{id}/{action}",        any(agents::action::<S>))
    // LLM providers
    .route("/api/llm-providers",               any(resource::collection::<LlmProvider, S>))
    .route("/api/llm-providers/",              any(resource::collection::<LlmProvider, S>))
    .route("/api/llm-providers/{id}",          any(resource::item::<LlmProvider, S>))
    .route("/api/llm-providers/{id}/",         any(resource::item::<LlmProvider, S>))
    // Datastores
    .route("/api/datastores",                  any(resource::collection::<Datastore, S>))
    .route("/api/datastores/",                 any(resource::collection::<Datastore, S>))
    .route("/api/datastores/{id}",             any(resource::item::<Datastore, S>))
    .route("/api/datastores/{id}/",            any(resource::item::<Datastore, S>))
    // Conversations
    .route("/api/conversations",               any(resource::collection::<Conversation, S>))
    .route("/api/conversations/",              any(resource::collection::<Conversation, S>))
    .route("/api/conversations/{id}",          any(resource::item::<Conversation, S>))
    .route("/api/conversations/{id}/",         any(resource::item::<Conversation, S>))
    .route("/api/conversations/{id}/{action}", any(conversations::action::<S>))
    // Chat history
    .route("/api/chat-history",                any(chat_history::handler::<S>))
    .route("/api/chat-history/",               any(chat_history::handler::<S>))
    // Validation and management
    .route("/api/validate/{kind}/{id}",        any(validate::handler::<S>))
    .route("/api/management/{action}",         any(management::handler::<S>))
    // Message-channel bridge
    .route("/api/events",                      any(events::stream::<S>))
    .route("/api/messages",                    any(events::post_message::<S>))
    // Everything else under the API base
    .route("/api",                             any(handlers::not_found::<S>))
    .route("/api/",                            any(handlers::not_found::<S>))
    .route("/api/{*rest}",                     any(handlers::not_found::<S>))
    .route_layer(middleware::from_fn_with_state(state.clone(), handlers::request_log::<S>))
    .route_layer(middleware::from_fn(handlers::cors))
    .with_state(state);

  match static_dir {
    Some(dir) => api.fallback_service(ServeDir::new(dir)),
    None => api.fallback(|| async { StatusCode::NOT_FOUND }),
  }
}

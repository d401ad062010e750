//! `/management/:action`: diagnostics and reset actions.
//!
//! | Action                | Result |
//! |-----------------------|--------|
//! | `debug-info`          | [`DebugInfo`] |
//! | `performance-metrics` | [`PerformanceMetrics`], all zero |
//! | `clear-data`          | Wipe and reseed |
//! | `reset`               | Wipe, reseed, clear logs |
//! | `reset-database`      | Recreate the schema and reseed |
//! | `logs`                | `?count=N&level=L` over the log buffer |
//!
//! The same operations back the message-channel bridge.

use analyst_core::store::ObjectStore;
use axum::{
  Extension,
  extract::{Path, Query, State},
  http::Uri,
  response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use super::{LogsCleared, RequestId, finish, ok, success};
use crate::{
  ApiError, AppState, lock,
  logger::{LogEntry, LogLevel},
  mirror::{Mirror, RecoveryState},
};

const DEFAULT_LOG_COUNT: usize = 50;

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Extension(rid): Extension<RequestId>,
  Path(action): Path<String>,
  uri: Uri,
) -> Response
where
  S: ObjectStore + Clone + 'static,
{
  let rid_str = Some(rid.as_str());
  let result = match action.as_str() {
    "debug-info" => ok(state.debug_info().await),
    "performance-metrics" => ok(PerformanceMetrics::zeroed()),
    "clear-data" => state.clear_data(rid_str).await.and_then(|()| success()),
    "reset" => state.reset(rid_str).await.and_then(|()| success()).map(|mut res| {
      res.extensions_mut().insert(LogsCleared);
      res
    }),
    "reset-database" => state
      .reset_database(rid_str)
      .await
      .and_then(|()| ok(json!({ "success": true, "message": "Database reset successfully" }))),
    "logs" => logs(&state, &uri),
    _ => Err(ApiError::NotFound("Management action not found".into())),
  };
  finish(&state, &rid, result)
}

#[derive(Debug, Deserialize)]
struct LogsParams {
  count: Option<usize>,
  level: Option<LogLevel>,
}

fn logs<S: ObjectStore>(state: &AppState<S>, uri: &Uri) -> Result<Response, ApiError> {
  let Query(params) = Query::<LogsParams>::try_from_uri(uri)
    .map_err(|e| ApiError::BadRequest(format!("Invalid query: {e}")))?;
  ok(state.logger.recent(params.count.unwrap_or(DEFAULT_LOG_COUNT), params.level))
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
  pub used:  u64,
  pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
  pub service_worker_version: &'static str,
  /// Milliseconds since the state was created.
  pub uptime:                 u64,
  pub memory_usage:           MemoryUsage,
  pub active_requests:        Vec<String>,
  pub schema_version:         Option<u32>,
  pub recovery_state:         RecoveryState,
  pub last_errors:            Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
  pub request_count: u64,
  pub response_time: u64,
  pub error_count:   u64,
  pub last_updated:  DateTime<Utc>,
}

impl PerformanceMetrics {
  /// Counters are not tracked; every field but the timestamp is zero.
  pub fn zeroed() -> Self {
    Self { request_count: 0, response_time: 0, error_count: 0, last_updated: Utc::now() }
  }
}

/// Resident and virtual size of this process in bytes.
///
/// Zero where the platform does not expose per-process memory.
fn memory_usage() -> MemoryUsage {
  let Ok(pid) = sysinfo::get_current_pid() else {
    return MemoryUsage::default();
  };
  let mut sys = System::new();
  sys.refresh_processes_specifics(
    ProcessesToUpdate::Some(&[pid]),
    true,
    ProcessRefreshKind::nothing().with_memory(),
  );
  sys
    .process(pid)
    .map(|p| MemoryUsage { used: p.memory(), total: p.virtual_memory() })
    .unwrap_or_default()
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: ObjectStore> AppState<S> {
  pub async fn debug_info(&self) -> DebugInfo {
    DebugInfo {
      service_worker_version: env!("CARGO_PKG_VERSION"),
      uptime:                 self.started_at.elapsed().as_millis() as u64,
      memory_usage:           memory_usage(),
      active_requests:        self.active_requests(),
      schema_version:         self.store.schema_version().await.ok(),
      recovery_state:         self.recovery_state(),
      last_errors:            self.logger.recent(10, Some(LogLevel::Error)),
    }
  }

  async fn wipe_and_reseed(&self, request_id: Option<&str>) -> Result<(), ApiError> {
    let mut mirror = self.mirror.lock().await;
    self.store.clear_all().await.map_err(ApiError::store)?;
    *mirror = Mirror::demo();
    self.save_all(&mut mirror, request_id).await
  }

  /// Wipe every collection and reseed from fixtures.
  pub async fn clear_data(&self, request_id: Option<&str>) -> Result<(), ApiError> {
    self.wipe_and_reseed(request_id).await?;
    self.logger.info("Cleared all data and reset to demo data", request_id);
    Ok(())
  }

  /// [`clear_data`](Self::clear_data), then empty the log buffer.
  pub async fn reset(&self, request_id: Option<&str>) -> Result<(), ApiError> {
    self.wipe_and_reseed(request_id).await?;
    self.logger.info("Service worker reset to initial state", request_id);
    self.logger.clear();
    Ok(())
  }

  /// Recreate the database from scratch and reseed it.
  ///
  /// This is the only way out of [`RecoveryState::Failed`].
  pub async fn reset_database(&self, request_id: Option<&str>) -> Result<(), ApiError> {
    let mut mirror = self.mirror.lock().await;
    self.reseed(&mut mirror, request_id).await.map_err(ApiError::store)?;
    *lock(&self.recovery) = RecoveryState::Normal;
    self.logger.info("Database reset successfully", request_id);
    Ok(())
  }

  /// Replace the mirror with fixtures and persist it.
  pub async fn load_sample_data(&self, request_id: Option<&str>) -> Result<(), ApiError> {
    let mut mirror = self.mirror.lock().await;
    *mirror = Mirror::demo();
    self.save_all(&mut mirror, request_id).await?;
    self.logger.info("Loaded sample data", request_id);
    Ok(())
  }

  /// Empty the store and the mirror without reseeding.
  pub async fn clear_all_data(&self, request_id: Option<&str>) -> Result<(), ApiError> {
    let mut mirror = self.mirror.lock().await;
    self.store.clear_all().await.map_err(ApiError::store)?;
    *mirror = Mirror::default();
    self.logger.info("Cleared all data", request_id);
    Ok(())
  }
}

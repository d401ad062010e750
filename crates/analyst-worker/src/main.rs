//! analyst-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite object store, activates the worker and serves the API over HTTP.

use std::path::{Path, PathBuf};

use analyst_store_sqlite::SqliteStore;
use analyst_worker::{AppState, ServerConfig};
use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Analyst mock backend")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ANALYST").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  server_cfg.store_path = expand_tilde(&server_cfg.store_path);
  server_cfg.static_dir = server_cfg.static_dir.as_deref().map(expand_tilde);

  // Open SQLite store.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  let state = AppState::new(store, server_cfg);
  state.install();
  state.activate().await;

  let app = analyst_worker::router(state).layer(TraceLayer::new_for_http());

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

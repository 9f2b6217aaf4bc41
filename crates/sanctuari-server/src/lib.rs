//! Server assembly for Sanctuari: configuration, store wiring and the
//! top-level axum [`Router`].

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use sanctuari_api::{Accounts, api_router};
use sanctuari_core::{
  notify::LogNotifier,
  workflow::{Procurement, Settings},
};
use sanctuari_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// The workflow as the server runs it.
pub type Service = Procurement<SqliteStore, LogNotifier>;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SANCTUARI_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  pub store_path: PathBuf,
  /// Logins accepted for owner endpoints.
  #[serde(default)]
  pub accounts:   Accounts,
  #[serde(default)]
  pub workflow:   Settings,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

// ─── Assembly ─────────────────────────────────────────────────────────────────

/// Wrap an opened store in the workflow with notices going to the log.
pub fn service(store: SqliteStore, settings: Settings) -> Service {
  Procurement::new(Arc::new(store), LogNotifier, settings)
}

/// Build the full application router: the JSON API under `/api` plus a
/// liveness check, with request tracing.
pub fn app(service: Arc<Service>, accounts: Arc<Accounts>) -> Router {
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", api_router(service, accounts))
    .layer(TraceLayer::new_for_http())
}

//! Quiz Backend
//!
//! - Axum HTTP API (registration, leaderboard, CSV uploads, question bank)
//! - SQLite store by default, in-memory store for throwaway runs
//!
//! Important env variables:
//!   PORT              : u16 (default 4005)
//!   QUIZ_CONFIG_PATH  : path to TOML config (server, store, auth, limits)
//!   QUIZ_STORE        : "sqlite" (default) or "memory"
//!   QUIZ_DB_PATH      : SQLite file (default "quiz.db")
//!   BCRYPT_COST       : bcrypt work factor
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use quiz_backend::config::QuizConfig;
use quiz_backend::{build_router, telemetry, AppState};

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = QuizConfig::from_env();
  let port = config.server.port;

  // Open the store once; every request shares it through AppState.
  let state = Arc::new(AppState::from_config(config)?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "quiz_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "quiz_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "quiz_backend", error = %e, "Failed to listen for Ctrl+C; running until killed");
    std::future::pending::<()>().await;
  }
}

//! Dojo · Coding & SQL Practice Backend
//!
//! - Axum HTTP + WebSocket API
//! - Local LLM integration for grading feedback (LM Studio style endpoint)
//! - Append-only wrong-notes record store + favorites store on disk
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   DOJO_CONFIG_PATH  : path to TOML config (prompts + data directory)
//!   DOJO_DATA_DIR     : data directory when no config file sets one
//!   LLM_ENDPOINT      : chat/completions URL (default local LM Studio)
//!   LLM_MODEL         : model name sent in the payload
//!   LLM_TIMEOUT_SECS  : request timeout (default 180)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod catalog;
mod notes;
mod favorites;
mod selection;
mod llm;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (catalog, store paths, LLM client, prompts).
  let state = Arc::new(AppState::new()?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "dojo_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}

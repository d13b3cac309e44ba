//! `conduit serve`: start the HTTP driver.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use conduit_kernel::Registry;
use conduit_server::ServerState;

/// Bind the HTTP driver and serve until interrupted.
pub async fn execute(host: &str, port: u16) -> Result<ExitCode> {
    let mut registry = Registry::with_builtins();
    let loaded = registry
        .load_search_paths()
        .context("failed to load element search paths")?;
    if loaded > 0 {
        tracing::info!(count = loaded, "loaded composite elements from search paths");
    }

    conduit_server::serve(Arc::new(ServerState::new(registry)), host, port)
        .await
        .with_context(|| format!("server failed on {host}:{port}"))?;
    Ok(ExitCode::SUCCESS)
}

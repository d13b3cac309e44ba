//! `conduit schema`: emit the element JSON Schema.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use conduit_kernel::Registry;

/// Emit the schema to stdout or a file.
pub fn execute(out: Option<&Path>) -> Result<ExitCode> {
    let mut registry = Registry::with_builtins();
    registry
        .load_search_paths()
        .context("failed to load element search paths")?;

    let schema = conduit_kernel::emit_schema(&registry);
    let rendered = serde_json::to_string_pretty(&schema)?;

    match out {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write schema to '{}'", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(ExitCode::SUCCESS)
}

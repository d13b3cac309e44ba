//! `conduit run`: build and execute a pipeline locally.

use std::collections::HashMap;
use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use conduit_kernel::{build_from_yaml, BuildOptions, Registry, RunContext};

/// Run a pipeline file (or stdin with `-`).
pub async fn execute(pipeline: &str, args: &[String], continue_on_error: bool) -> Result<ExitCode> {
    let source = if pipeline == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read pipeline from stdin")?;
        buf
    } else {
        std::fs::read_to_string(pipeline)
            .with_context(|| format!("failed to read pipeline file '{pipeline}'"))?
    };

    let args = parse_args(args)?;

    let mut registry = Registry::with_builtins();
    match registry.load_search_paths() {
        Ok(0) => {}
        Ok(n) => tracing::info!(count = n, "loaded composite elements from search paths"),
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(e.exit_code()));
        }
    }

    let built = build_from_yaml(&source, &registry, &args, &BuildOptions::default());
    let mut built = match built {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    let ctx = RunContext::local(args).with_stop_on_error(!continue_on_error);
    match built.execute(&ctx).await {
        Ok(report) => {
            for result in &report.results {
                println!("{}", serde_json::to_string(result)?);
            }
            let stats = &report.stats;
            eprintln!(
                "{} item(s) in {:.3}s ({:.1} items/s)",
                stats.total_items_processed, stats.duration, stats.throughput
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

/// Parse `key=value` run-args.
fn parse_args(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut args = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid --args '{pair}', expected key=value"))?;
        args.insert(key.to_string(), value.to_string());
    }
    Ok(args)
}

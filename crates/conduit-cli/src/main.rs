//! conduit CLI entry point.
//!
//! Usage:
//!   conduit run pipeline.yaml --args key=value    # run locally
//!   conduit run - < pipeline.yaml                 # read YAML from stdin
//!   conduit serve --host 127.0.0.1 --port 8000    # HTTP driver
//!   conduit schema --out schema.json              # element JSON Schema
//!
//! Exit codes: 0 success, 1 pipeline failure, 2 invalid invocation,
//! 3 unknown element, 4 schema mismatch.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "conduit", version, about = "Streaming, declarative data pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline file ("-" reads YAML from stdin)
    Run {
        /// Path to the pipeline YAML, or "-" for stdin
        pipeline: String,
        /// Run-args as key=value, usable as ${key} in the pipeline
        #[arg(long = "args", value_name = "KEY=VALUE")]
        args: Vec<String>,
        /// Record per-item errors and keep going instead of aborting
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Start the HTTP driver
    Serve {
        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Emit the element JSON Schema
    Schema {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Commands::Run {
            pipeline,
            args,
            continue_on_error,
        } => commands::run::execute(&pipeline, &args, continue_on_error).await,
        Commands::Serve { host, port } => commands::serve::execute(&host, port).await,
        Commands::Schema { out } => commands::schema::execute(out.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

//! Per-run context shared with every element.
//!
//! Registry, environment and args are read-only after build. The capture
//! buffers are owned by the run and written through a mutex so parallel
//! Fork paths stay serialized.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// Where `Console` renderings and per-item errors go.
///
/// The HTTP driver captures both; the CLI echoes stdout lines to the real
/// stdout as they happen.
#[derive(Debug, Default)]
pub struct RunIo {
    stdout: Mutex<Vec<String>>,
    stderr: Mutex<Vec<String>>,
    echo: bool,
}

impl RunIo {
    /// Capture-only buffers (server mode).
    pub fn captured() -> Self {
        Self::default()
    }

    /// Capture and echo stdout lines to the process stdout (CLI mode).
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Record one stdout line.
    pub fn push_stdout(&self, line: impl Into<String>) {
        let line = line.into();
        if self.echo {
            println!("{line}");
        }
        self.stdout.lock().expect("stdout buffer poisoned").push(line);
    }

    /// Record one stderr line.
    pub fn push_stderr(&self, line: impl Into<String>) {
        let line = line.into();
        if self.echo {
            eprintln!("{line}");
        }
        self.stderr.lock().expect("stderr buffer poisoned").push(line);
    }

    /// Drain the captured stdout lines.
    pub fn take_stdout(&self) -> Vec<String> {
        std::mem::take(&mut *self.stdout.lock().expect("stdout buffer poisoned"))
    }

    /// Drain the captured stderr lines.
    pub fn take_stderr(&self) -> Vec<String> {
        std::mem::take(&mut *self.stderr.lock().expect("stderr buffer poisoned"))
    }
}

/// Read-only run state handed to elements.
#[derive(Debug)]
pub struct RunContext {
    /// Run-args from the CLI `--args` flags or the HTTP request body.
    pub args: HashMap<String, String>,
    /// Capture buffers for `Console` output and continue-policy errors.
    pub io: RunIo,
    /// Cancellation token; the executor checks it between items and
    /// long-running elements should observe it too.
    pub cancel: CancellationToken,
    /// Abort on the first per-item error when true; record and continue
    /// when false.
    pub stop_on_error: bool,
}

impl RunContext {
    /// Context for a local (CLI) run: stdout echoes as it happens.
    pub fn local(args: HashMap<String, String>) -> Self {
        Self {
            args,
            io: RunIo::echoing(),
            cancel: CancellationToken::new(),
            stop_on_error: true,
        }
    }

    /// Context for a captured (server/test) run.
    pub fn captured(args: HashMap<String, String>) -> Self {
        Self {
            args,
            io: RunIo::captured(),
            cancel: CancellationToken::new(),
            stop_on_error: true,
        }
    }

    /// Set the error policy.
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::captured(HashMap::new())
    }
}

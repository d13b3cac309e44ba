//! Cli — run a child process per item.
//!
//! Arguments are templates rendered against the item. With
//! `capture_output` the captured stdout is yielded; otherwise the exit
//! code is.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use conduit_types::value::to_display_string;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;
use tokio::process::Command;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;
use crate::template::TemplateEngine;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Cli", "Run a child process per item")
        .param(ParamSchema::required("command", "string", "Executable to run"))
        .param(ParamSchema::optional(
            "args",
            "array",
            json!([]),
            "Arguments (templates rendered against the item)",
        ))
        .param(ParamSchema::optional(
            "capture_output",
            "bool",
            json!(false),
            "Yield captured stdout instead of the exit code",
        ))
        .param(ParamSchema::optional(
            "shell",
            "bool",
            json!(false),
            "Run the command through sh -c",
        ))
        .param(ParamSchema::optional(
            "timeout",
            "int",
            Value::Null,
            "Kill the child after this many seconds",
        ))
        .field(FieldSchema::optional("command", "string", "Per-item command"))
        .field(FieldSchema::optional("args", "array", "Per-item arguments"))
        .field(FieldSchema::optional(
            "capture_output",
            "bool",
            "Per-item capture toggle",
        ))
        .field(FieldSchema::optional("timeout", "int", "Per-item timeout"))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        params.require_str("command")?;
        Ok(Box::new(Cli {
            engine: TemplateEngine::new(),
            shell: params.get_bool("shell").unwrap_or(false),
        }))
    })
}

struct Cli {
    engine: TemplateEngine,
    shell: bool,
}

#[async_trait]
impl Element for Cli {
    async fn apply(&mut self, record: Record, ctx: &RunContext) -> ConduitResult<Emit> {
        let command = record.require_str("command")?;
        let capture_output = record.get_bool("capture_output").unwrap_or(false);
        let timeout = record.get_i64("timeout").filter(|t| *t > 0);
        let item = record.item().clone();

        let mut rendered_args = Vec::new();
        if let Some(args) = record.get_array("args") {
            for arg in args {
                rendered_args
                    .push(self.engine.render_str(&to_display_string(arg), &item)?);
            }
        }

        let mut cmd = if self.shell {
            let mut line = command.clone();
            for arg in &rendered_args {
                line.push(' ');
                line.push_str(arg);
            }
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(line);
            cmd
        } else {
            let mut cmd = Command::new(&command);
            cmd.args(&rendered_args);
            cmd
        };
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| ConduitError::Resource(format!("failed to spawn '{command}': {e}")))?;

        let output = match timeout {
            Some(secs) => {
                tokio::time::timeout(Duration::from_secs(secs as u64), child.wait_with_output())
                    .await
                    .map_err(|_| {
                        ConduitError::Resource(format!("'{command}' timed out after {secs}s"))
                    })?
            }
            None => child.wait_with_output().await,
        }
        .map_err(|e| ConduitError::Resource(format!("failed to wait for '{command}': {e}")))?;

        if capture_output {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            Ok(Emit::One(Value::String(stdout)))
        } else {
            Ok(Emit::One(json!(output.status.code().unwrap_or(-1))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(item: Value, defaults: &[(&str, Value)]) -> Record {
        let defaults: Map<String, Value> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Record::coerce(item, &spec().fields, &defaults)
    }

    fn cli(shell: bool) -> Cli {
        Cli {
            engine: TemplateEngine::new(),
            shell,
        }
    }

    #[tokio::test]
    async fn captures_stdout_with_templated_args() {
        let ctx = RunContext::default();
        let rec = record(
            json!({"word": "conduit"}),
            &[
                ("command", json!("echo")),
                ("args", json!(["{{input.word}}"])),
                ("capture_output", json!(true)),
            ],
        );
        let out = cli(false).apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out, vec![json!("conduit\n")]);
    }

    #[tokio::test]
    async fn yields_exit_code_without_capture() {
        let ctx = RunContext::default();
        let rec = record(json!({}), &[("command", json!("true"))]);
        let out = cli(false).apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out, vec![json!(0)]);

        let rec = record(json!({}), &[("command", json!("false"))]);
        let out = cli(false).apply(rec, &ctx).await.unwrap().into_vec();
        assert_eq!(out, vec![json!(1)]);
    }

    #[tokio::test]
    async fn missing_executables_are_resource_errors() {
        let ctx = RunContext::default();
        let rec = record(
            json!({}),
            &[("command", json!("definitely-not-a-command-42"))],
        );
        let err = cli(false).apply(rec, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), "ResourceError");
    }
}

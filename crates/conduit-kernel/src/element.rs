//! The element contract and constructor-parameter helpers.
//!
//! Every processing unit implements [`Element`]. The executor owns the
//! stream mechanics — elements only see one merged [`Record`] at a time and
//! answer with an [`Emit`]:
//!
//! ```text
//! open(ctx)                 before the first pull; acquire resources
//! apply(record, ctx)        one record in, zero or more values out
//! flush(ctx)                after upstream exhaustion (buffered elements
//!                           and pure sources emit here)
//! close(ctx)                exactly once, reverse stage order, all paths
//! ```

use async_trait::async_trait;
use conduit_types::value::type_name;
use conduit_types::{ConduitError, ConduitResult, Value};
use serde_json::Map;

use crate::context::RunContext;
use crate::record::Record;

/// Values produced by one `apply` or `flush` call.
#[derive(Debug, Clone)]
pub enum Emit {
    /// Nothing (filtered out, or buffering).
    None,
    /// One value.
    One(Value),
    /// Several values, emitted downstream one at a time.
    Many(Vec<Value>),
}

impl Emit {
    /// Flatten into a vec (test helper and fork joining).
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Emit::None => Vec::new(),
            Emit::One(v) => vec![v],
            Emit::Many(vs) => vs,
        }
    }
}

/// A processing unit wired into a pipeline stage.
///
/// Elements live for one run and are never reused across runs.
#[async_trait]
pub trait Element: Send {
    /// Acquire resources before the first pull.
    async fn open(&mut self, _ctx: &RunContext) -> ConduitResult<()> {
        Ok(())
    }

    /// Process one merged record.
    async fn apply(&mut self, record: Record, ctx: &RunContext) -> ConduitResult<Emit>;

    /// Emit after upstream exhaustion. Buffered elements and pure sources
    /// produce their output here; everything else keeps the default.
    async fn flush(&mut self, _ctx: &RunContext) -> ConduitResult<Emit> {
        Ok(Emit::None)
    }

    /// Release resources. Called exactly once, on success, error and cancel.
    async fn close(&mut self, _ctx: &RunContext) -> ConduitResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Element")
    }
}

/// Typed access to a stage descriptor's constructor parameters.
///
/// Factories use this to pull their configuration out of the (already
/// env-resolved) descriptor mapping. Numeric strings coerce, since `${...}`
/// substitution always produces strings.
pub struct Params<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    /// Wrap a descriptor mapping.
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Raw value of a parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    /// String parameter; numbers and bools stringify.
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Integer parameter; numeric strings parse.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Float parameter; numeric strings parse.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Boolean parameter; "true"/"false" strings parse.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// Array parameter.
    pub fn get_array(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name).and_then(|v| v.as_array())
    }

    /// Object parameter.
    pub fn get_object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(|v| v.as_object())
    }

    /// A parameter the constructor cannot do without.
    pub fn require(&self, name: &str) -> ConduitResult<&Value> {
        self.get(name)
            .ok_or_else(|| ConduitError::ElementInit(format!("missing required parameter '{name}'")))
    }

    /// A required string parameter.
    pub fn require_str(&self, name: &str) -> ConduitResult<String> {
        let value = self.require(name)?;
        self.get_str(name).ok_or_else(|| {
            ConduitError::ElementInit(format!(
                "parameter '{name}' must be a string, got {}",
                type_name(value)
            ))
        })
    }
}

//! Random — generate random numbers.
//!
//! One value per input item, or `count` values when set (useful as the
//! first stage). Seeding makes runs reproducible; a per-item seed reseeds
//! the generator mid-stream.

use async_trait::async_trait;
use conduit_types::{ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Random", "Generate random numbers")
        .param(ParamSchema::optional(
            "seed",
            "int",
            Value::Null,
            "Seed for reproducible runs",
        ))
        .param(ParamSchema::optional("min", "float", json!(0.0), "Lower bound"))
        .param(ParamSchema::optional("max", "float", json!(1.0), "Upper bound"))
        .param(ParamSchema::optional(
            "type",
            "string",
            json!("float"),
            "Output type: float or int",
        ))
        .param(ParamSchema::optional(
            "count",
            "int",
            Value::Null,
            "Values per input item (default one)",
        ))
        .field(FieldSchema::optional("seed", "int", "Per-item reseed"))
        .field(FieldSchema::optional("min", "float", "Per-item lower bound"))
        .field(FieldSchema::optional("max", "float", "Per-item upper bound"))
        .field(FieldSchema::optional("type", "string", "Per-item output type"))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let seed = params.get_i64("seed");
        Ok(Box::new(Random {
            rng: match seed {
                Some(s) => StdRng::seed_from_u64(s as u64),
                None => StdRng::from_entropy(),
            },
            count: params.get_i64("count").map(|n| n.max(0) as usize),
        }))
    })
}

struct Random {
    rng: StdRng,
    count: Option<usize>,
}

impl Random {
    fn draw(&mut self, record: &Record) -> Value {
        let min = record.get_f64("min").unwrap_or(0.0);
        let max = record.get_f64("max").unwrap_or(1.0);
        let kind = record.get_str("type").unwrap_or_else(|| "float".to_string());
        if kind == "int" {
            let (lo, hi) = (min as i64, max as i64);
            json!(self.rng.gen_range(lo..=hi.max(lo)))
        } else {
            json!(self.rng.gen_range(min..max.max(min + f64::EPSILON)))
        }
    }
}

#[async_trait]
impl Element for Random {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        if let Some(seed) = record.get_i64("seed") {
            self.rng = StdRng::seed_from_u64(seed as u64);
        }
        match self.count {
            Some(n) => {
                let values = (0..n).map(|_| self.draw(&record)).collect();
                Ok(Emit::Many(values))
            }
            None => {
                let value = self.draw(&record);
                Ok(Emit::One(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(defaults: &[(&str, Value)]) -> Record {
        let defaults: Map<String, Value> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Record::coerce(json!({}), &spec().fields, &defaults)
    }

    async fn draw(seed: u64, ctx: &RunContext) -> Vec<Value> {
        let mut element = Random {
            rng: StdRng::seed_from_u64(seed),
            count: Some(5),
        };
        element
            .apply(record(&[("type", json!("int")), ("max", json!(100))]), ctx)
            .await
            .unwrap()
            .into_vec()
    }

    #[tokio::test]
    async fn seeded_runs_are_reproducible() {
        let ctx = RunContext::default();
        assert_eq!(draw(7, &ctx).await, draw(7, &ctx).await);
    }

    #[tokio::test]
    async fn int_values_respect_bounds() {
        let ctx = RunContext::default();
        let mut element = Random {
            rng: StdRng::seed_from_u64(1),
            count: Some(50),
        };
        let values = element
            .apply(
                record(&[
                    ("type", json!("int")),
                    ("min", json!(3)),
                    ("max", json!(5)),
                ]),
                &ctx,
            )
            .await
            .unwrap()
            .into_vec();
        for v in values {
            let n = v.as_i64().unwrap();
            assert!((3..=5).contains(&n));
        }
    }
}

//! Numpy — aggregate and elementwise numeric operations on array items.
//!
//! Aggregates (`sum`, `mean`, `min`, `max`, `std`, `var`) reduce an array
//! of numbers to one number; with `axis` set they reduce an array of
//! arrays column-wise (0) or row-wise (1). Elementwise ops (`abs`,
//! `round`) map over the array.

use async_trait::async_trait;
use conduit_types::value::{as_f64, type_name};
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.Numpy", "Numeric operations on array items")
        .param(ParamSchema::required(
            "operation",
            "string",
            "sum | mean | min | max | std | var | abs | round",
        ))
        .param(ParamSchema::optional(
            "axis",
            "int",
            Value::Null,
            "For arrays of arrays: 0 column-wise, 1 row-wise",
        ))
        .param(ParamSchema::optional(
            "dtype",
            "string",
            json!("float"),
            "Result type: float or int (int truncates)",
        ))
        .field(FieldSchema::optional("input", "any", "The array to reduce"))
        .field(FieldSchema::optional("operation", "string", "Per-item operation"))
        .field(FieldSchema::optional("axis", "int", "Per-item axis"))
        .field(FieldSchema::optional("dtype", "string", "Per-item result type"))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let operation = params.require_str("operation")?;
        if !is_known(&operation) {
            return Err(ConduitError::ElementInit(format!(
                "unknown operation '{operation}'"
            )));
        }
        Ok(Box::new(Numeric))
    })
}

fn is_known(op: &str) -> bool {
    matches!(
        op,
        "sum" | "mean" | "min" | "max" | "std" | "var" | "abs" | "round"
    )
}

struct Numeric;

fn numbers(values: &[Value]) -> ConduitResult<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            as_f64(v).ok_or_else(|| {
                ConduitError::Item(format!("expected a number, got {}", type_name(v)))
            })
        })
        .collect()
}

fn reduce(op: &str, xs: &[f64]) -> ConduitResult<f64> {
    if xs.is_empty() {
        return Err(ConduitError::Item(format!("{op} of an empty array")));
    }
    let n = xs.len() as f64;
    let sum: f64 = xs.iter().sum();
    Ok(match op {
        "sum" => sum,
        "mean" => sum / n,
        "min" => xs.iter().cloned().fold(f64::INFINITY, f64::min),
        "max" => xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        "var" | "std" => {
            let mean = sum / n;
            let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            if op == "std" {
                var.sqrt()
            } else {
                var
            }
        }
        _ => return Err(ConduitError::Item(format!("'{op}' is not an aggregate"))),
    })
}

fn elementwise(op: &str, values: &[Value]) -> ConduitResult<Vec<Value>> {
    values
        .iter()
        .map(|v| {
            // abs and round keep integers integral.
            if let Some(i) = v.as_i64() {
                return Ok(json!(if op == "abs" { i.abs() } else { i }));
            }
            let x = as_f64(v).ok_or_else(|| {
                ConduitError::Item(format!("expected a number, got {}", type_name(v)))
            })?;
            Ok(json!(if op == "abs" { x.abs() } else { x.round() }))
        })
        .collect()
}

/// The rows of an array-of-arrays, or None for a flat array.
fn as_matrix(values: &[Value]) -> Option<Vec<&Vec<Value>>> {
    values.iter().map(Value::as_array).collect()
}

#[async_trait]
impl Element for Numeric {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let operation = record.require_str("operation")?;
        if !is_known(&operation) {
            return Err(ConduitError::Item(format!("unknown operation '{operation}'")));
        }
        let input = record.get("input").cloned().unwrap_or(Value::Null);
        let values = input.as_array().ok_or_else(|| {
            ConduitError::Item(format!("expected an array, got {}", type_name(&input)))
        })?;

        if matches!(operation.as_str(), "abs" | "round") {
            return Ok(Emit::One(Value::Array(elementwise(&operation, values)?)));
        }

        let as_int = record
            .get_str("dtype")
            .map_or(false, |d| d == "int");
        let scalar = |x: f64| if as_int { json!(x.trunc() as i64) } else { json!(x) };

        let axis = record.get_i64("axis");
        let result = match (axis, as_matrix(values)) {
            (Some(0), Some(rows)) => {
                let width = rows.first().map(|r| r.len()).unwrap_or(0);
                let mut columns = Vec::with_capacity(width);
                for c in 0..width {
                    let column: Vec<Value> = rows
                        .iter()
                        .map(|r| r.get(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    columns.push(scalar(reduce(&operation, &numbers(&column)?)?));
                }
                Value::Array(columns)
            }
            (Some(1), Some(rows)) => Value::Array(
                rows.iter()
                    .map(|r| Ok(scalar(reduce(&operation, &numbers(r)?)?)))
                    .collect::<ConduitResult<Vec<_>>>()?,
            ),
            (Some(axis), _) => {
                return Err(ConduitError::Item(format!(
                    "axis {axis} needs an array of arrays (axis 0 or 1)"
                )))
            }
            (None, _) => scalar(reduce(&operation, &numbers(values)?)?),
        };
        Ok(Emit::One(result))
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

    async fn run(op: &str, input: Value, axis: Option<i64>) -> Value {
        let ctx = RunContext::default();
        let mut defaults = vec![("operation", json!(op))];
        if let Some(a) = axis {
            defaults.push(("axis", json!(a)));
        }
        Numeric
            .apply(record(input, &defaults), &ctx)
            .await
            .unwrap()
            .into_vec()
            .remove(0)
    }

    #[tokio::test]
    async fn aggregates_flat_arrays() {
        assert_eq!(run("sum", json!([1, 2, 3]), None).await, json!(6.0));
        assert_eq!(run("mean", json!([1, 2, 3]), None).await, json!(2.0));
        assert_eq!(run("min", json!([3, 1, 2]), None).await, json!(1.0));
        assert_eq!(run("max", json!([3, 1, 2]), None).await, json!(3.0));
        assert_eq!(run("var", json!([2, 4]), None).await, json!(1.0));
    }

    #[tokio::test]
    async fn axis_reduces_matrices() {
        let m = json!([[1, 2], [3, 4]]);
        assert_eq!(run("sum", m.clone(), Some(0)).await, json!([4.0, 6.0]));
        assert_eq!(run("sum", m, Some(1)).await, json!([3.0, 7.0]));
    }

    #[tokio::test]
    async fn elementwise_abs_keeps_ints() {
        assert_eq!(run("abs", json!([-1, 2.5, -3.5]), None).await, json!([1, 2.5, 3.5]));
    }

    #[tokio::test]
    async fn int_dtype_truncates_results() {
        let ctx = RunContext::default();
        let out = Numeric
            .apply(
                record(
                    json!([1, 2]),
                    &[("operation", json!("mean")), ("dtype", json!("int"))],
                ),
                &ctx,
            )
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!(1)]);
    }

    #[tokio::test]
    async fn non_numeric_items_error() {
        let ctx = RunContext::default();
        let err = Numeric
            .apply(
                record(json!(["x"]), &[("operation", json!("sum"))]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ItemError");
    }
}

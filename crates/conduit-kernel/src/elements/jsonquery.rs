//! JsonQuery — run a jq filter over each item.
//!
//! Uses jaq (pure-Rust jq), so filters validate at build time and run
//! without a subprocess. Array-expanding filters (`.items[]`) yield one
//! value per produced element. String items that parse as JSON are queried
//! as data; other strings are queried as string values.

use std::rc::Rc;

use async_trait::async_trait;
use conduit_types::{ConduitError, ConduitResult, ElementSpec, FieldSchema, ParamSchema, Value};
use jaq_core::{compile, load, Ctx, RcIter};
use jaq_json::Val;
use serde_json::json;

use crate::context::RunContext;
use crate::element::{Element, Emit};
use crate::record::Record;
use crate::registry::Factory;

pub(super) fn spec() -> ElementSpec {
    ElementSpec::new("conduit.JsonQuery", "Apply a jq filter to each item")
        .param(ParamSchema::optional(
            "query",
            "string",
            json!("."),
            "jq filter expression, e.g. \".results[]\"",
        ))
        .field(FieldSchema::optional("input", "any", "The value to query"))
        .field(FieldSchema::optional(
            "query",
            "string",
            "Per-item query override",
        ))
}

pub(super) fn factory() -> Factory {
    Box::new(|params, _ctx| {
        let query = params.get_str("query").unwrap_or_else(|| ".".to_string());
        let filter = compile_filter(&query).map_err(ConduitError::ElementInit)?;
        Ok(Box::new(JsonQuery { query, filter }))
    })
}

type Filter = jaq_core::Filter<jaq_core::Native<Val>>;

/// Parse and compile a jq filter with the standard library loaded.
fn compile_filter(filter_str: &str) -> Result<Filter, String> {
    let arena = load::Arena::default();
    let defs = jaq_std::defs().chain(jaq_json::defs());
    let loader = load::Loader::new(defs);

    let modules = loader
        .load(
            &arena,
            load::File {
                path: (),
                code: filter_str,
            },
        )
        .map_err(|errs| {
            let msgs: Vec<String> = errs
                .into_iter()
                .flat_map(|(_, e)| -> Vec<String> {
                    match e {
                        load::Error::Io(io_errs) => {
                            io_errs.into_iter().map(|(_, msg)| msg).collect()
                        }
                        load::Error::Lex(lex_errs) => lex_errs
                            .into_iter()
                            .map(|(expected, _)| format!("expected {}", expected.as_str()))
                            .collect(),
                        load::Error::Parse(parse_errs) => parse_errs
                            .into_iter()
                            .map(|(expected, _)| format!("expected {}", expected.as_str()))
                            .collect(),
                    }
                })
                .collect();
            format!("jq parse error in '{}': {}", filter_str, msgs.join(", "))
        })?;

    let funs = jaq_std::funs().chain(jaq_json::funs());
    compile::Compiler::default()
        .with_funs(funs)
        .compile(modules)
        .map_err(|errs| {
            let msgs: Vec<String> = errs
                .into_iter()
                .flat_map(|(_, errors)| {
                    errors
                        .into_iter()
                        .map(|(_, undefined)| format!("undefined {}", undefined.as_str()))
                })
                .collect();
            format!("jq compile error in '{}': {}", filter_str, msgs.join(", "))
        })
}

/// Run a compiled filter over one value.
fn run_filter(filter: &Filter, input: Value) -> Result<Vec<Value>, String> {
    let inputs: RcIter<_> = RcIter::new(Box::new(core::iter::empty()));
    let ctx = Ctx::new(Vec::new(), &inputs);

    let mut outputs = Vec::new();
    for result in filter.run((ctx, json_to_val(input))) {
        match result {
            Ok(val) => outputs.push(val_to_json(&val)),
            Err(e) => return Err(format!("jq runtime error: {e}")),
        }
    }
    Ok(outputs)
}

fn json_to_val(json: Value) -> Val {
    match json {
        Value::Null => Val::Null,
        Value::Bool(b) => Val::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if let Ok(i) = isize::try_from(i) {
                    Val::Int(i)
                } else {
                    Val::Num(Rc::new(n.to_string()))
                }
            } else if let Some(f) = n.as_f64() {
                Val::Float(f)
            } else {
                Val::Num(Rc::new(n.to_string()))
            }
        }
        Value::String(s) => Val::Str(Rc::new(s)),
        Value::Array(arr) => Val::Arr(Rc::new(arr.into_iter().map(json_to_val).collect())),
        Value::Object(obj) => Val::obj(
            obj.into_iter()
                .map(|(k, v)| (Rc::new(k), json_to_val(v)))
                .collect(),
        ),
    }
}

fn val_to_json(val: &Val) -> Value {
    match val {
        Val::Null => Value::Null,
        Val::Bool(b) => Value::Bool(*b),
        Val::Int(n) => Value::Number((*n as i64).into()),
        Val::Float(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Val::Num(s) => serde_json::from_str(s).unwrap_or(Value::String(s.to_string())),
        Val::Str(s) => Value::String(s.to_string()),
        Val::Arr(arr) => Value::Array(arr.iter().map(val_to_json).collect()),
        Val::Obj(obj) => {
            let map: serde_json::Map<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.to_string(), val_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}

struct JsonQuery {
    query: String,
    filter: Filter,
}

#[async_trait]
impl Element for JsonQuery {
    async fn apply(&mut self, record: Record, _ctx: &RunContext) -> ConduitResult<Emit> {
        let input = record.get("input").cloned().unwrap_or(Value::Null);

        // String items that hold JSON are queried as data.
        let data = match &input {
            Value::String(s) => serde_json::from_str(s).unwrap_or(input.clone()),
            other => other.clone(),
        };

        let outputs = match record.get_str("query") {
            Some(ref q) if q != &self.query => {
                let filter = compile_filter(q).map_err(ConduitError::Item)?;
                run_filter(&filter, data)
            }
            _ => run_filter(&self.filter, data),
        }
        .map_err(ConduitError::Item)?;

        Ok(Emit::Many(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn query(q: &str) -> JsonQuery {
        JsonQuery {
            query: q.to_string(),
            filter: compile_filter(q).unwrap(),
        }
    }

    fn record(item: Value) -> Record {
        Record::coerce(item, &spec().fields, &Map::new())
    }

    #[tokio::test]
    async fn selects_a_path() {
        let ctx = RunContext::default();
        let mut element = query(".user.name");
        let out = element
            .apply(record(json!({"user": {"name": "ada"}})), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!("ada")]);
    }

    #[tokio::test]
    async fn array_queries_expand() {
        let ctx = RunContext::default();
        let mut element = query(".items[]");
        let out = element
            .apply(record(json!({"items": [1, 2, 3]})), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn json_strings_are_parsed_before_querying() {
        let ctx = RunContext::default();
        let mut element = query(".a");
        let out = element
            .apply(record(json!(r#"{"a": 7}"#)), &ctx)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(out, vec![json!(7)]);
    }

    #[test]
    fn invalid_filters_fail_to_compile() {
        assert!(compile_filter(".[ broken").is_err());
    }
}

//! `${NAME}` / `${NAME:-default}` expansion over a parsed pipeline tree.
//!
//! Applied to every string scalar after YAML parsing, before any element is
//! built. Lookup precedence: run-args, then process environment, then the
//! token's `:-` default. A token with no binding and no default is a build
//! error. Substituted values stay strings — typed coercion is the element
//! schema's job. Resolution is idempotent: a resolved tree resolves to
//! itself.

use std::collections::HashMap;

use conduit_types::{ConduitError, ConduitResult, Value};
use regex::Regex;

/// Resolve every string scalar in the tree.
pub fn resolve_tree(value: &Value, args: &HashMap<String, String>) -> ConduitResult<Value> {
    match value {
        Value::String(s) => Ok(Value::String(resolve_str(s, args)?)),
        Value::Array(items) => {
            let resolved = items
                .iter()
                .map(|v| resolve_tree(v, args))
                .collect::<ConduitResult<Vec<_>>>()?;
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_tree(v, args)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Expand `${NAME[:-default]}` tokens in one string.
pub fn resolve_str(text: &str, args: &HashMap<String, String>) -> ConduitResult<String> {
    // Compiled per call; pipelines are small and this runs once per build.
    let token = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("token pattern is valid");

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in token.captures_iter(text) {
        let whole = caps.get(0).expect("match has a range");
        let name = &caps[1];
        out.push_str(&text[last..whole.start()]);

        let replacement = if let Some(v) = args.get(name) {
            v.clone()
        } else if let Ok(v) = std::env::var(name) {
            v
        } else if let Some(default) = caps.get(2) {
            default.as_str().trim_matches(|c| c == '\'' || c == '"').to_string()
        } else {
            return Err(ConduitError::Parse(format!(
                "unresolved variable '${{{name}}}' (no run-arg, no environment value, no default)"
            )));
        };
        out.push_str(&replacement);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

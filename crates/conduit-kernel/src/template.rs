//! Per-item template rendering for `Format`, `Console`, `Path` and friends.
//!
//! Templates use `{{ expr }}` interpolations and `{{ expr | filter }}` pipes
//! over a context where the current item is bound as `input` (and, for
//! mapping items, each key is also a top-level variable). Unknown variables
//! render as empty strings. Rendering is pure — no statements, no loops
//! reaching outside the context, no host access.
//!
//! Constructor-provided templates are compiled once per stage; per-item
//! override strings are rendered ad hoc.

use std::path::Path;

use conduit_types::{ConduitError, ConduitResult, Value};
use minijinja::{Environment, UndefinedBehavior};

const STAGE_TEMPLATE: &str = "__stage__";

/// A template engine owning one compiled stage template.
///
/// Elements that render templates hold one of these; the environment carries
/// the registered filters and the lenient undefined behavior.
pub struct TemplateEngine {
    env: Environment<'static>,
    has_stage_template: bool,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish()
    }
}

impl TemplateEngine {
    /// Create an engine with no stage template (per-item rendering only).
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        register_filters(&mut env);
        Self {
            env,
            has_stage_template: false,
        }
    }

    /// Create an engine and compile the stage's default template.
    ///
    /// Syntax errors surface at build time as `Template` errors.
    pub fn with_template(source: &str) -> ConduitResult<Self> {
        let mut engine = Self::new();
        engine
            .env
            .add_template_owned(STAGE_TEMPLATE.to_string(), source.to_string())
            .map_err(|e| ConduitError::Template(format!("invalid template '{source}': {e}")))?;
        engine.has_stage_template = true;
        Ok(engine)
    }

    /// Render the compiled stage template against an item.
    pub fn render(&self, input: &Value) -> ConduitResult<String> {
        if !self.has_stage_template {
            return Err(ConduitError::Internal(
                "render called without a stage template".into(),
            ));
        }
        let tmpl = self
            .env
            .get_template(STAGE_TEMPLATE)
            .map_err(|e| ConduitError::Template(e.to_string()))?;
        tmpl.render(context_for(input))
            .map_err(|e| ConduitError::Template(e.to_string()))
    }

    /// Render an arbitrary template string (per-item overrides).
    pub fn render_str(&self, source: &str, input: &Value) -> ConduitResult<String> {
        self.env
            .render_str(source, context_for(input))
            .map_err(|e| ConduitError::Template(format!("template '{source}': {e}")))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the render context: the item as `input`, plus — for mapping items —
/// each key as a top-level variable.
fn context_for(input: &Value) -> Value {
    let mut map = match input {
        Value::Object(fields) => fields.clone(),
        _ => serde_json::Map::new(),
    };
    map.insert("input".to_string(), input.clone());
    Value::Object(map)
}

fn register_filters(env: &mut Environment<'_>) {
    env.add_filter("get_filename", |path: String| -> String {
        Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    env.add_filter("get_dirname", |path: String| -> String {
        Path::new(&path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    env.add_filter("get_basename", |path: String| -> String {
        Path::new(&path)
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    env.add_filter("get_stem", |path: String| -> String {
        Path::new(&path)
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    env.add_filter("get_extension", |path: String| -> String {
        Path::new(&path)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    });
    env.add_filter("get_normpath", |path: String| -> String {
        normalize_path(&path)
    });
    env.add_filter("filesizeformat", |size: f64| -> String {
        format_file_size(size)
    });
    // Identity placeholder kept for user templates that pipe through it.
    env.add_filter("process", |value: minijinja::Value| value);
}

/// Lexical path normalization: collapse `.`, `..` and duplicate separators.
pub(crate) fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Human-readable file size ("1.2 MB", "456 B").
fn format_file_size(size: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * KB;
    const GB: f64 = 1024.0 * MB;

    if size >= GB {
        format!("{:.1} GB", size / GB)
    } else if size >= MB {
        format!("{:.1} MB", size / MB)
    } else if size >= KB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{} B", size as u64)
    }
}

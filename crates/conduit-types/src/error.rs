//! Error taxonomy shared by the builder, executor and drivers.
//!
//! Errors carry a kind (not a type hierarchy) plus optional stage/item
//! coordinates so failures are reproducible from the report alone.

use thiserror::Error;

/// Result type for runtime operations.
pub type ConduitResult<T> = Result<T, ConduitError>;

/// Pipeline runtime errors.
#[derive(Debug, Clone, Error)]
pub enum ConduitError {
    /// Malformed pipeline document or unresolvable `${...}` token.
    #[error("parse error: {0}")]
    Parse(String),
    /// Stage id not present in the registry.
    #[error("unknown element: {0}")]
    UnknownElement(String),
    /// Descriptor or item does not match the element's declared schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Template compilation or rendering failed.
    #[error("template error: {0}")]
    Template(String),
    /// Expression compilation or evaluation failed.
    #[error("expression error: {0}")]
    Expression(String),
    /// Element constructor rejected its configuration.
    #[error("element init error: {0}")]
    ElementInit(String),
    /// Per-item failure inside `process`.
    #[error("item error: {0}")]
    Item(String),
    /// I/O or external-service failure.
    #[error("resource error: {0}")]
    Resource(String),
    /// The run's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// Invariant violation inside the runtime itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConduitError {
    /// Stable kind string used in reports and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ConduitError::Parse(_) => "ParseError",
            ConduitError::UnknownElement(_) => "UnknownElement",
            ConduitError::SchemaMismatch(_) => "SchemaMismatch",
            ConduitError::Template(_) => "TemplateError",
            ConduitError::Expression(_) => "ExpressionError",
            ConduitError::ElementInit(_) => "ElementInitError",
            ConduitError::Item(_) => "ItemError",
            ConduitError::Resource(_) => "ResourceError",
            ConduitError::Cancelled => "Cancelled",
            ConduitError::Internal(_) => "InternalError",
        }
    }

    /// Whether this kind aborts the run regardless of the error policy.
    ///
    /// Per-item kinds (`Item`, `Resource`, and the per-item template and
    /// expression failures) are skippable under `stop_on_error = false`;
    /// everything else always aborts.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ConduitError::Item(_)
                | ConduitError::Resource(_)
                | ConduitError::Template(_)
                | ConduitError::Expression(_)
        )
    }

    /// Process exit code for the CLI surface.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConduitError::UnknownElement(_) => 3,
            ConduitError::SchemaMismatch(_) => 4,
            _ => 1,
        }
    }

    /// Attach stage coordinates to the message.
    pub fn at_stage(self, index: usize, id: &str) -> Self {
        self.map_message(|msg| format!("stage {index} ({id}): {msg}"))
    }

    /// Attach an item index to the message.
    pub fn at_item(self, index: usize) -> Self {
        self.map_message(|msg| format!("item {index}: {msg}"))
    }

    fn map_message(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            ConduitError::Parse(m) => ConduitError::Parse(f(m)),
            ConduitError::UnknownElement(m) => ConduitError::UnknownElement(f(m)),
            ConduitError::SchemaMismatch(m) => ConduitError::SchemaMismatch(f(m)),
            ConduitError::Template(m) => ConduitError::Template(f(m)),
            ConduitError::Expression(m) => ConduitError::Expression(f(m)),
            ConduitError::ElementInit(m) => ConduitError::ElementInit(f(m)),
            ConduitError::Item(m) => ConduitError::Item(f(m)),
            ConduitError::Resource(m) => ConduitError::Resource(f(m)),
            ConduitError::Cancelled => ConduitError::Cancelled,
            ConduitError::Internal(m) => ConduitError::Internal(f(m)),
        }
    }
}

impl From<std::io::Error> for ConduitError {
    fn from(err: std::io::Error) -> Self {
        ConduitError::Resource(err.to_string())
    }
}

impl From<serde_json::Error> for ConduitError {
    fn from(err: serde_json::Error) -> Self {
        ConduitError::Parse(err.to_string())
    }
}

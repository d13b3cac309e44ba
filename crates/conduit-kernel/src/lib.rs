//! conduit-kernel: the pipeline runtime.
//!
//! This crate provides:
//!
//! - **Resolver**: `${NAME:-default}` expansion over parsed pipeline trees
//! - **Templates**: per-item `{{ ... }}` rendering with path filters
//! - **Expressions**: sandboxed predicates and keys over `input`
//! - **Registry**: dotted-id element lookup, builtin and manifest-declared
//! - **Builder**: descriptor parsing, key splitting, element instantiation
//! - **Executor**: the lazy pull loop, stage lifecycle, metrics and the
//!   fail-fast-or-continue error policy
//! - **Elements**: the standard `conduit.*` element set
//! - **Schema**: JSON Schema emission over the registry

pub mod context;
pub mod element;
pub mod elements;
pub mod expr;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod resolve;
pub mod schema_emit;
pub mod template;

pub use context::{RunContext, RunIo};
pub use element::{Element, Emit, Params};
pub use pipeline::{
    build_from_value, build_from_yaml, BuildContext, BuildOptions, Pipeline, StageDescriptor,
};
pub use record::Record;
pub use registry::{Factory, Registry, SEARCH_PATHS_VAR};
pub use schema_emit::emit_schema;

// Re-export the shared data contracts so embedders depend on one crate.
pub use conduit_types::{
    ConduitError, ConduitResult, ElementMetrics, ElementSpec, FieldSchema, ParamSchema, RunReport,
    RunStats, Value,
};

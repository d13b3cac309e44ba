//! conduit-types: data contracts for the conduit pipeline runtime.
//!
//! This crate is the leaf of the workspace — no async dependencies. It
//! provides:
//!
//! - **Value helpers**: items flowing through a pipeline are `serde_json::Value`;
//!   this crate adds the display/truthiness/path-lookup conventions
//! - **Element schemas**: constructor params and input-record fields that
//!   describe every registered element
//! - **Errors**: the `ConduitError` kind taxonomy shared by builder, executor
//!   and drivers
//! - **Run reports**: per-element metrics and the aggregate stats returned by
//!   the CLI and HTTP drivers

pub mod error;
pub mod report;
pub mod schema;
pub mod value;

pub use error::{ConduitError, ConduitResult};
pub use report::{ElementMetrics, RunReport, RunStats};
pub use schema::{ElementSpec, FieldSchema, ParamSchema};
pub use value::Value;

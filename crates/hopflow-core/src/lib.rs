#![forbid(unsafe_code)]
//! hopflow-core: row/schema model, graph metadata, the step contract, and
//! engine configuration shared by every other hopflow crate.
//!
//! No threads or IO live here. The executor (`hopflow-exec`) turns a
//! `GraphMeta` into running step units; step plugins (`hopflow-steps`)
//! implement `StepLogic` against the `RowIo` surface defined in `step`.

pub mod config;
pub mod error;
pub mod graph;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod partition;
pub mod prelude;
pub mod schema;
pub mod step;
pub mod types;
pub mod variables;

/// Engine version recorded in run manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

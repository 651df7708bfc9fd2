#![forbid(unsafe_code)]
//! hopflow-steps: built-in step plugins (generate/filter/rename/dummy/csv).
//!
//! Design intent:
//! - Steps are plain synchronous `StepLogic` implementations; the executor
//!   owns threads, queues and error routing.
//! - Each step reads its settings from the JSON config blob of its
//!   `StepMeta`; configuration problems surface as `StepError::Config` either
//!   when the registry creates the step or during `init`.
//! - Row-level problems are returned as `StepError::Row` so a graph can route
//!   them to an error hop.

pub mod fields;
pub mod registry;

pub mod csv_input;
pub mod csv_output;
pub mod dummy;
pub mod filter;
pub mod generate;
pub mod rename;

pub use registry::StepRegistry;

#[cfg(test)]
pub(crate) mod testing;

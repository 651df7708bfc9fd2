#![forbid(unsafe_code)]
//! hopflow-planner: from (YAML) graph files → validated `GraphMeta`
//! → the physical layout of units and queues an executor run will build.
//!
//! Design:
//! - Graph metadata types live in `hopflow-core::graph`; this crate only
//!   produces and checks them.
//! - This crate adds:
//!     * a YAML DSL → `GraphMeta` + run config overrides
//!     * static validation rules (names, hop endpoints, cycles)
//!     * the copy-pairing rule shared with the executor, and an `explain`
//!       rendering of the resulting layout
//!
//! No threads or I/O here; the executor owns both.

pub mod dsl;
pub mod error;
pub mod physical;
pub mod rules;

pub use dsl::yaml::{parse_yaml_graph, ParsedGraph, PipelineConfig};
pub use error::PlanError;
pub use physical::{copy_pairs, explain, layout, PhysicalLayout, QueuePlan, UnitPlan};
pub use rules::{validate_graph, ValidationReport};

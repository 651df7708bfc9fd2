#![forbid(unsafe_code)]
//! hopflow: a step-graph ETL engine.
//!
//! A graph of steps joined by hops runs with one OS thread per step copy.
//! Rows travel through bounded queues, row-level failures can be diverted to
//! an error hop, and every run ends in a `RunResult` with per-step counters.
//!
//! This crate re-exports the workspace crates:
//! - [`core`]: rows, schemas, graph metadata and the `StepLogic` contract
//! - [`planner`]: YAML graph files, validation and queue layout
//! - [`exec`]: the executor
//! - [`steps`]: built-in steps and the `StepRegistry`

pub use hopflow_core as core;
pub use hopflow_exec as exec;
pub use hopflow_planner as planner;
pub use hopflow_steps as steps;

pub use hopflow_core::config::EngineConfig;
pub use hopflow_core::graph::{GraphMeta, HopMeta, StepMeta};
pub use hopflow_exec::{Executor, RunResult, RunStatus};
pub use hopflow_steps::StepRegistry;

/// Parse a YAML graph, apply its config on top of `config`, and run it with
/// the built-in steps.
pub fn run_yaml(yaml: &str, mut config: EngineConfig) -> Result<RunResult, Box<dyn std::error::Error>> {
    let parsed = hopflow_planner::parse_yaml_graph(yaml)?;
    parsed.config.apply(&mut config);
    Ok(Executor::execute(&parsed.graph, &config, &StepRegistry::new())?)
}

//! YAML → `GraphMeta` parser for step graphs.
//!
//! Example:
//! ```yaml
//! name: upper-half
//! config:
//!   queue_capacity: 1000
//!   variables: { OUT: "/tmp/out" }
//! steps:
//!   - name: gen
//!     type: generate
//!     config: { rows: 1000, sequence_field: n }
//!   - name: upper
//!     type: filter
//!     config: { condition: "n >= 500" }
//!     error_handling: { max_errors: 10 }
//!   - name: sink
//!     type: csv_output
//!     copies: 1
//!     config: { path: "${OUT}/upper.csv" }
//!   - name: rejects
//!     type: dummy
//! hops:
//!   - { from: gen, to: upper }
//!   - { from: upper, to: sink }
//!   - { from: upper, to: rejects, error: true }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hopflow_core::config::EngineConfig;
use hopflow_core::graph::{ErrorHandlingMeta, GraphMeta, HopMeta, PartitionSpec, StepMeta};

use crate::error::PlanError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDoc {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    pub steps: Vec<StepDef>,
    #[serde(default)]
    pub hops: Vec<HopDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub copies: Option<usize>,
    #[serde(default)]
    pub distribute: bool,
    #[serde(default)]
    pub partition_by: Vec<String>,
    #[serde(default)]
    pub error_handling: Option<ErrorHandlingMeta>,
    #[serde(default)]
    pub config: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopDef {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub error: bool,
}

/// Run settings carried by the graph file. Unset fields leave the engine
/// config untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: Option<usize>,
    pub input_poll_ms: Option<u64>,
    pub safe_mode: Option<bool>,
    pub run_timeout_ms: Option<u64>,
    pub variables: BTreeMap<String, String>,
}

impl PipelineConfig {
    /// Overlay the file's settings on `cfg`. Variables from the file are
    /// added after the ones already present, so they win on lookup.
    pub fn apply(&self, cfg: &mut EngineConfig) {
        if let Some(v) = self.queue_capacity {
            cfg.queue_capacity = v;
        }
        if let Some(v) = self.input_poll_ms {
            cfg.input_poll_ms = v;
        }
        if let Some(v) = self.safe_mode {
            cfg.safe_mode = v;
        }
        if let Some(v) = self.run_timeout_ms {
            cfg.run_timeout_ms = Some(v);
        }
        for (k, v) in &self.variables {
            cfg.variables.push((k.clone(), v.clone()));
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedGraph {
    pub graph: GraphMeta,
    pub config: PipelineConfig,
}

/// Parse a YAML graph file. Only the document shape is checked here; run
/// `rules::validate_graph` for the graph rules.
pub fn parse_yaml_graph(yaml_src: &str) -> Result<ParsedGraph, PlanError> {
    let doc: GraphDoc = serde_yaml::from_str(yaml_src)?;

    let mut graph = GraphMeta::new(doc.name.unwrap_or_else(|| "graph".to_string()));
    for def in doc.steps {
        let config = match def.config {
            Some(v) => serde_json::to_value(v)?,
            None => serde_json::Value::Null,
        };
        graph.steps.push(StepMeta {
            name: def.name,
            step_type: def.step_type,
            config,
            copies: def.copies.unwrap_or(1),
            distribute: def.distribute,
            partitioning: if def.partition_by.is_empty() {
                None
            } else {
                Some(PartitionSpec {
                    fields: def.partition_by,
                })
            },
            error_handling: def.error_handling,
        });
    }
    for def in doc.hops {
        graph.hops.push(HopMeta {
            from: def.from,
            to: def.to,
            enabled: def.enabled.unwrap_or(true),
            error: def.error,
        });
    }

    Ok(ParsedGraph {
        graph,
        config: doc.config.unwrap_or_default(),
    })
}

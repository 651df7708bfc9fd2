//! Static graph metadata: steps connected by hops.
//!
//! This is read-only input to the executor. Loading it from files is the
//! planner's job (`hopflow-planner::dsl`); the executor only ever sees an
//! already-parsed `GraphMeta`. A new executor run is built from the same
//! metadata every time.

use serde::{Deserialize, Serialize};

/// Key-based routing into the copies of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Fields whose values form the partitioning key.
    pub fields: Vec<String>,
}

/// Error-hop behavior for a step: rejection thresholds and the names of the
/// fields appended to each error row. A `None` field name omits that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingMeta {
    /// Fail the step once more than this many rows were rejected. 0 = unlimited.
    pub max_errors: u64,
    /// Fail the step once the rejected percentage exceeds this. 0 = unlimited.
    pub max_percent_errors: u32,
    /// Rows that must be read before the percentage check applies.
    pub min_rows_for_percent: u64,
    pub count_field: Option<String>,
    pub description_field: Option<String>,
    pub field_name_field: Option<String>,
    pub code_field: Option<String>,
}

impl Default for ErrorHandlingMeta {
    fn default() -> Self {
        Self {
            max_errors: 0,
            max_percent_errors: 0,
            min_rows_for_percent: 0,
            count_field: Some("error_count".to_string()),
            description_field: Some("error_description".to_string()),
            field_name_field: Some("error_field".to_string()),
            code_field: Some("error_code".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMeta {
    pub name: String,
    /// Plugin key resolved by the step factory (e.g. "filter").
    pub step_type: String,
    /// Opaque configuration blob handed to the factory.
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default = "default_copies")]
    pub copies: usize,
    /// Round-robin rows across target steps instead of copying to each.
    #[serde(default)]
    pub distribute: bool,
    #[serde(default)]
    pub partitioning: Option<PartitionSpec>,
    #[serde(default)]
    pub error_handling: Option<ErrorHandlingMeta>,
}

fn default_copies() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl StepMeta {
    pub fn new(name: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step_type: step_type.into(),
            config: serde_json::Value::Null,
            copies: 1,
            distribute: false,
            partitioning: None,
            error_handling: None,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_copies(mut self, copies: usize) -> Self {
        self.copies = copies;
        self
    }

    pub fn distributed(mut self) -> Self {
        self.distribute = true;
        self
    }

    pub fn partitioned_by(mut self, fields: &[&str]) -> Self {
        self.partitioning = Some(PartitionSpec {
            fields: fields.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_error_handling(mut self, meta: ErrorHandlingMeta) -> Self {
        self.error_handling = Some(meta);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopMeta {
    pub from: String,
    pub to: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Rows that fail processing in `from` flow here instead of aborting the run.
    #[serde(default)]
    pub error: bool,
}

impl HopMeta {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            enabled: true,
            error: false,
        }
    }

    pub fn error(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            error: true,
            ..Self::new(from, to)
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMeta {
    #[serde(default)]
    pub name: String,
    pub steps: Vec<StepMeta>,
    #[serde(default)]
    pub hops: Vec<HopMeta>,
}

impl GraphMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            hops: Vec::new(),
        }
    }

    pub fn step(mut self, step: StepMeta) -> Self {
        self.steps.push(step);
        self
    }

    pub fn hop(mut self, hop: HopMeta) -> Self {
        self.hops.push(hop);
        self
    }

    pub fn find_step(&self, name: &str) -> Option<&StepMeta> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// Enabled, non-error hops leaving `step`, in declaration order.
    pub fn output_hops<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a HopMeta> + 'a {
        self.hops
            .iter()
            .filter(move |h| h.enabled && !h.error && h.from == step)
    }

    /// The enabled error hop leaving `step`, if any.
    pub fn error_hop(&self, step: &str) -> Option<&HopMeta> {
        self.hops
            .iter()
            .find(|h| h.enabled && h.error && h.from == step)
    }

    /// All enabled hops (normal and error) entering `step`.
    pub fn input_hops<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a HopMeta> + 'a {
        self.hops.iter().filter(move |h| h.enabled && h.to == step)
    }
}

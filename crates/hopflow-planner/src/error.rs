use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("graph has no steps")]
    Empty,

    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    #[error("step '{0}' must run at least one copy")]
    ZeroCopies(String),

    #[error("hop {from} -> {to}: unknown step '{missing}'")]
    UnknownStep {
        from: String,
        to: String,
        missing: String,
    },

    #[error("step '{0}' has a hop to itself")]
    SelfLoop(String),

    #[error("duplicate hop {from} -> {to}")]
    DuplicateHop { from: String, to: String },

    #[error("step '{0}' has more than one error hop")]
    MultipleErrorHops(String),

    #[error("graph contains a cycle through steps {0:?}")]
    Cycle(Vec<String>),

    #[error("step '{step}': {message}")]
    InvalidStep { step: String, message: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("step config is not representable as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

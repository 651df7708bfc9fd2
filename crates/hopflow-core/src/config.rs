//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity (in rows) of every row queue. A full queue blocks its producer.
    pub queue_capacity: usize,

    /// How long a unit with several inputs waits on one queue before trying the next.
    pub input_poll_ms: u64,

    /// Reject rows whose schema differs from the one already negotiated on a hop.
    pub safe_mode: bool,

    /// Optional wall-clock limit; a watchdog requests a stop when it elapses.
    pub run_timeout_ms: Option<u64>,

    /// Variables made available to steps for `${NAME}` substitution.
    pub variables: Vec<(String, String)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            input_poll_ms: 1,
            safe_mode: true,
            run_timeout_ms: None,
            variables: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `HOPFLOW_QUEUE_CAPACITY`: rows per queue
    /// - `HOPFLOW_INPUT_POLL_MS`: multi-input poll interval
    /// - `HOPFLOW_SAFE_MODE`: `true`/`false`
    /// - `HOPFLOW_RUN_TIMEOUT_MS`: watchdog timeout
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("HOPFLOW_QUEUE_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.queue_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("HOPFLOW_INPUT_POLL_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.input_poll_ms = v;
            }
        }

        if let Ok(s) = std::env::var("HOPFLOW_SAFE_MODE") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.safe_mode = v;
            }
        }

        if let Ok(s) = std::env::var("HOPFLOW_RUN_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.run_timeout_ms = Some(v);
            }
        }

        cfg
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.run_timeout_ms == Some(0) {
            return Err(Error::Config("run_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

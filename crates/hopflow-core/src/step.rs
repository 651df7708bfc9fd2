//! The step contract: what a step plugin implements and what the engine
//! offers it in return.
//!
//! The engine only ever calls `init`, `process_row` and `dispose`. Everything
//! a step does with rows goes through the `RowIo` it is handed on each call.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::graph::StepMeta;
use crate::schema::RowSchema;
use crate::types::Row;
use crate::variables::{MessageCatalog, VariableSpace};

/// Outcome of one `process_row` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Call `process_row` again.
    Continue,
    /// This step has no more rows to produce.
    EndOfStream,
}

/// Why a row was rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCause {
    pub message: String,
    /// Field that caused the failure, when known.
    pub field: Option<String>,
    /// Short machine-readable code, when the step has one.
    pub code: Option<String>,
}

impl ErrorCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
            code: None,
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(field) = &self.field {
            write!(f, " (field '{field}')")?;
        }
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    /// A single row could not be processed. Redirected to the error hop when
    /// the step has one; fatal otherwise.
    #[error("row rejected: {cause}")]
    Row {
        row: Option<Row>,
        /// Shape of `row` when it is not the step's current input schema.
        schema: Option<Arc<RowSchema>>,
        cause: ErrorCause,
    },

    /// The run is stopping; not a failure of this step.
    #[error("step stopped")]
    Stopped,

    #[error("schema error: {0}")]
    Schema(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

impl StepError {
    /// Reject an input row.
    pub fn row(row: Row, cause: ErrorCause) -> Self {
        StepError::Row {
            row: Some(row),
            schema: None,
            cause,
        }
    }

    /// Reject a row the step built itself (e.g. a parsed input record).
    pub fn row_with_schema(schema: Arc<RowSchema>, row: Row, cause: ErrorCause) -> Self {
        StepError::Row {
            row: Some(row),
            schema: Some(schema),
            cause,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, StepError::Stopped)
    }

    /// Split into the offending row and its schema (if any) and a cause record.
    pub fn into_parts(self) -> (Option<Row>, Option<Arc<RowSchema>>, ErrorCause) {
        match self {
            StepError::Row { row, schema, cause } => (row, schema, cause),
            other => {
                let code = match &other {
                    StepError::Schema(_) => "SCHEMA",
                    StepError::Config(_) => "CONFIG",
                    StepError::Io(_) => "IO",
                    _ => "FAILED",
                };
                (None, None, ErrorCause::new(other.to_string()).with_code(code))
            }
        }
    }
}

impl From<crate::error::Error> for StepError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Schema(m) => StepError::Schema(m),
            crate::error::Error::Config(m) => StepError::Config(m),
            other => StepError::Failed(other.to_string()),
        }
    }
}

/// Opaque per-unit context passed to `init` and `dispose`.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub step_name: String,
    pub copy: usize,
    pub copies: usize,
    pub variables: Arc<VariableSpace>,
    pub messages: Arc<MessageCatalog>,
}

impl StepContext {
    /// Name used as the logging channel for this unit, e.g. `filter.0`.
    pub fn log_channel(&self) -> String {
        format!("{}.{}", self.step_name, self.copy)
    }

    pub fn substitute(&self, text: &str) -> String {
        self.variables.substitute(text)
    }
}

/// Row access offered to a step while it runs.
pub trait RowIo {
    /// Next input row, or `None` once every input is drained (or the run is
    /// stopping). Blocks while inputs are empty but not yet done.
    fn get_row(&mut self) -> Result<Option<Row>, StepError>;

    /// Schema of the input row most recently returned by `get_row`.
    fn input_schema(&self) -> Option<Arc<RowSchema>>;

    /// Whether this unit has any input hops at all.
    fn has_inputs(&self) -> bool;

    /// Send a row downstream according to the step's distribution policy.
    fn put_row(&mut self, schema: &Arc<RowSchema>, row: Row) -> Result<(), StepError>;

    /// Send a row to one named target step only.
    fn put_row_to(&mut self, target: &str, schema: &Arc<RowSchema>, row: Row)
        -> Result<(), StepError>;

    /// Names of the target steps reachable through normal output hops.
    fn output_targets(&self) -> Vec<String>;

    /// Count a row read from an external source (file, database, ...).
    fn count_input(&mut self);

    /// Count a row written to an external sink.
    fn count_output(&mut self);

    /// True once a stop was requested for the run.
    fn is_stopped(&self) -> bool;
}

/// Business behavior of one step copy.
pub trait StepLogic: Send {
    fn init(&mut self, _ctx: &StepContext) -> Result<(), StepError> {
        Ok(())
    }

    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError>;

    fn dispose(&mut self, _ctx: &StepContext) -> Result<(), StepError> {
        Ok(())
    }
}

/// Creates one `StepLogic` per step copy.
pub trait StepFactory: Send + Sync {
    fn create(&self, meta: &StepMeta, copy: usize) -> Result<Box<dyn StepLogic>, StepError>;

    /// Message templates the created steps render through `StepContext::messages`.
    fn messages(&self) -> MessageCatalog {
        MessageCatalog::new()
    }
}

impl<F> StepFactory for F
where
    F: Fn(&StepMeta, usize) -> Result<Box<dyn StepLogic>, StepError> + Send + Sync,
{
    fn create(&self, meta: &StepMeta, copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
        self(meta, copy)
    }
}

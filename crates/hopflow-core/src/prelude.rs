//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::graph::{ErrorHandlingMeta, GraphMeta, HopMeta, PartitionSpec, StepMeta};
pub use crate::id::{QueueId, UnitId};
pub use crate::manifest::{RunId, RunManifest};
pub use crate::partition::{HashPartitioner, Partitioner};
pub use crate::schema::{FieldMeta, RowSchema, ValueType};
pub use crate::step::{
    ErrorCause, Flow, RowIo, StepContext, StepError, StepFactory, StepLogic,
};
pub use crate::types::{Row, Value};
pub use crate::variables::{MessageCatalog, VariableSpace};

//! Row listeners: taps attached to a step before execution (previews,
//! sampling, test probes). Called synchronously on the unit's thread.

use hopflow_core::schema::RowSchema;
use hopflow_core::types::Row;

pub trait RowListener: Send + Sync {
    /// A row was taken from one of the step's input queues.
    fn row_read(&self, _schema: &RowSchema, _row: &Row) {}

    /// The step emitted a row to its normal outputs.
    fn row_written(&self, _schema: &RowSchema, _row: &Row) {}

    /// The step redirected a row to its error hop. `row` already carries the
    /// appended error fields.
    fn error_row_written(&self, _schema: &RowSchema, _row: &Row) {}
}

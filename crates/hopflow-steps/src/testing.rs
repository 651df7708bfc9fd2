//! In-memory `RowIo` for driving a single step in unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use hopflow_core::schema::RowSchema;
use hopflow_core::step::{RowIo, StepContext, StepError};
use hopflow_core::types::Row;
use hopflow_core::variables::VariableSpace;

use crate::StepRegistry;
use hopflow_core::step::StepFactory;

pub fn context(vars: &[(&str, &str)]) -> StepContext {
    StepContext {
        step_name: "test".into(),
        copy: 0,
        copies: 1,
        variables: Arc::new(vars.iter().copied().collect::<VariableSpace>()),
        messages: Arc::new(StepRegistry::new().messages()),
    }
}

#[derive(Default)]
pub struct MemoryIo {
    pub input: VecDeque<Row>,
    pub input_schema: Option<Arc<RowSchema>>,
    pub has_inputs: bool,
    pub targets: Vec<String>,
    pub output: Vec<Row>,
    pub output_schema: Option<Arc<RowSchema>>,
    pub targeted: Vec<(String, Row)>,
    pub inputs_counted: u64,
    pub outputs_counted: u64,
}

impl MemoryIo {
    pub fn source() -> Self {
        Self {
            targets: vec!["next".into()],
            ..Self::default()
        }
    }

    pub fn with_input(schema: Arc<RowSchema>, rows: Vec<Row>) -> Self {
        Self {
            input: rows.into(),
            input_schema: Some(schema),
            has_inputs: true,
            targets: vec!["next".into()],
            ..Self::default()
        }
    }
}

impl RowIo for MemoryIo {
    fn get_row(&mut self) -> Result<Option<Row>, StepError> {
        Ok(self.input.pop_front())
    }

    fn input_schema(&self) -> Option<Arc<RowSchema>> {
        self.input_schema.clone()
    }

    fn has_inputs(&self) -> bool {
        self.has_inputs
    }

    fn put_row(&mut self, schema: &Arc<RowSchema>, row: Row) -> Result<(), StepError> {
        self.output_schema = Some(Arc::clone(schema));
        self.output.push(row);
        Ok(())
    }

    fn put_row_to(
        &mut self,
        target: &str,
        schema: &Arc<RowSchema>,
        row: Row,
    ) -> Result<(), StepError> {
        if !self.targets.iter().any(|t| t == target) {
            return Err(StepError::Config(format!("no output hop to '{target}'")));
        }
        self.output_schema = Some(Arc::clone(schema));
        self.targeted.push((target.to_string(), row));
        Ok(())
    }

    fn output_targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    fn count_input(&mut self) {
        self.inputs_counted += 1;
    }

    fn count_output(&mut self) {
        self.outputs_counted += 1;
    }

    fn is_stopped(&self) -> bool {
        false
    }
}

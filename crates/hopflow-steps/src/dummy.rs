//! `dummy`: forwards every row when it has output hops, otherwise just
//! consumes them. Useful as a sink and as a counting stage in tests.

use hopflow_core::graph::StepMeta;
use hopflow_core::step::{Flow, RowIo, StepError, StepLogic};

pub const TYPE: &str = "dummy";

#[derive(Debug, Default)]
pub struct Dummy {
    seen: u64,
}

impl Dummy {
    pub fn rows_seen(&self) -> u64 {
        self.seen
    }
}

pub fn create(_meta: &StepMeta, _copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
    Ok(Box::<Dummy>::default())
}

impl StepLogic for Dummy {
    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        let Some(row) = io.get_row()? else {
            return Ok(Flow::EndOfStream);
        };
        self.seen += 1;
        if let Some(schema) = io.input_schema() {
            if !io.output_targets().is_empty() {
                io.put_row(&schema, row)?;
            }
        }
        Ok(Flow::Continue)
    }
}

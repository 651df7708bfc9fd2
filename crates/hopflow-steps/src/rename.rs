//! `rename`: passes rows through under a schema with renamed fields.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hopflow_core::graph::StepMeta;
use hopflow_core::schema::RowSchema;
use hopflow_core::step::{Flow, RowIo, StepError, StepLogic};

use crate::registry::parse_config;

pub const TYPE: &str = "rename";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameConfig {
    /// old name -> new name
    pub renames: BTreeMap<String, String>,
}

pub struct Rename {
    config: RenameConfig,
    /// (input schema, renamed schema)
    cached: Option<(Arc<RowSchema>, Arc<RowSchema>)>,
}

impl Rename {
    pub fn new(config: RenameConfig) -> Self {
        Self {
            config,
            cached: None,
        }
    }

    fn renamed(&mut self, input: &Arc<RowSchema>) -> Result<Arc<RowSchema>, StepError> {
        if let Some((from, to)) = &self.cached {
            if Arc::ptr_eq(from, input) {
                return Ok(Arc::clone(to));
            }
        }
        for old in self.config.renames.keys() {
            if input.index_of(old).is_none() {
                return Err(StepError::Schema(format!(
                    "cannot rename missing field '{old}'"
                )));
            }
        }
        let fields = input
            .fields()
            .iter()
            .map(|f| {
                let mut f = f.clone();
                if let Some(new) = self.config.renames.get(&f.name) {
                    f.name = new.clone();
                }
                f
            })
            .collect();
        let out = Arc::new(RowSchema::new(fields)?);
        self.cached = Some((Arc::clone(input), Arc::clone(&out)));
        Ok(out)
    }
}

pub fn create(meta: &StepMeta, _copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
    Ok(Box::new(Rename::new(parse_config(meta)?)))
}

impl StepLogic for Rename {
    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        let Some(row) = io.get_row()? else {
            return Ok(Flow::EndOfStream);
        };
        let input = io
            .input_schema()
            .ok_or_else(|| StepError::Schema("input row without schema".into()))?;
        let schema = self.renamed(&input)?;
        io.put_row(&schema, row)?;
        Ok(Flow::Continue)
    }
}

//! Field declarations shared by steps that build rows from scratch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hopflow_core::schema::{FieldMeta, RowSchema, ValueType};
use hopflow_core::step::StepError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub value_type: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    /// Constant value (generate) as text or a JSON scalar.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

fn default_type() -> String {
    "string".to_string()
}

impl FieldDef {
    pub fn to_meta(&self) -> Result<FieldMeta, StepError> {
        let ty = ValueType::parse(&self.value_type).ok_or_else(|| {
            StepError::Config(format!(
                "field '{}': unknown type '{}'",
                self.name, self.value_type
            ))
        })?;
        let mut meta = FieldMeta::new(self.name.clone(), ty);
        meta.length = self.length;
        meta.precision = self.precision;
        Ok(meta)
    }

    /// The constant value as text, if one is set.
    pub fn value_text(&self) -> Option<String> {
        match &self.value {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

pub fn schema_of(defs: &[FieldDef]) -> Result<Arc<RowSchema>, StepError> {
    let metas = defs
        .iter()
        .map(FieldDef::to_meta)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(RowSchema::new(metas)?))
}

//! `generate`: emits a fixed number of rows built from constants, with an
//! optional 0-based sequence field appended last.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hopflow_core::graph::StepMeta;
use hopflow_core::schema::{FieldMeta, RowSchema, ValueType};
use hopflow_core::step::{Flow, RowIo, StepContext, StepError, StepLogic};
use hopflow_core::types::{Row, Value};

use crate::fields::{schema_of, FieldDef};
use crate::registry::parse_config;

pub const TYPE: &str = "generate";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    pub rows: u64,
    pub fields: Vec<FieldDef>,
    pub sequence_field: Option<String>,
}

pub struct Generate {
    config: GenerateConfig,
    schema: Option<Arc<RowSchema>>,
    template: Vec<Value>,
    emitted: u64,
}

impl Generate {
    pub fn new(config: GenerateConfig) -> Self {
        Self {
            config,
            schema: None,
            template: Vec::new(),
            emitted: 0,
        }
    }
}

pub fn create(meta: &StepMeta, _copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
    Ok(Box::new(Generate::new(parse_config(meta)?)))
}

impl StepLogic for Generate {
    fn init(&mut self, ctx: &StepContext) -> Result<(), StepError> {
        let mut schema = schema_of(&self.config.fields)?.as_ref().clone();
        let mut template = Vec::with_capacity(self.config.fields.len());
        for (def, meta) in self.config.fields.iter().zip(schema.fields()) {
            let value = match def.value_text() {
                Some(text) => Value::parse_as(meta.value_type, &ctx.substitute(&text))
                    .map_err(|e| StepError::Config(format!("field '{}': {e}", def.name)))?,
                None => Value::Null,
            };
            template.push(value);
        }
        if let Some(seq) = &self.config.sequence_field {
            schema = schema.with_field(FieldMeta::new(seq.clone(), ValueType::Integer))?;
        }
        self.schema = Some(Arc::new(schema));
        self.template = template;
        self.emitted = 0;
        Ok(())
    }

    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        if self.emitted >= self.config.rows {
            return Ok(Flow::EndOfStream);
        }
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| StepError::Failed("generate used before init".into()))?;
        let mut row = Row::new(self.template.clone());
        if self.config.sequence_field.is_some() {
            row.push(Value::Integer(self.emitted as i64));
        }
        io.put_row(schema, row)?;
        self.emitted += 1;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, MemoryIo};

    #[test]
    fn emits_constants_and_sequence() {
        let config: GenerateConfig = serde_json::from_value(serde_json::json!({
            "rows": 3,
            "fields": [
                {"name": "region", "value": "${REGION}"},
                {"name": "weight", "type": "number", "value": 1.5}
            ],
            "sequence_field": "n"
        }))
        .unwrap();
        let mut step = Generate::new(config);
        step.init(&context(&[("REGION", "east")])).unwrap();

        let mut io = MemoryIo::source();
        while step.process_row(&mut io).unwrap() == Flow::Continue {}

        assert_eq!(io.output.len(), 3);
        let schema = io.output_schema.clone().unwrap();
        assert_eq!(schema.index_of("n"), Some(2));
        assert_eq!(io.output[2].values()[0], Value::String("east".into()));
        assert_eq!(io.output[2].values()[1], Value::Number(1.5));
        assert_eq!(io.output[2].values()[2], Value::Integer(2));
    }

    #[test]
    fn bad_constant_fails_init() {
        let config: GenerateConfig = serde_json::from_value(serde_json::json!({
            "rows": 1,
            "fields": [{"name": "n", "type": "integer", "value": "ten"}]
        }))
        .unwrap();
        let err = Generate::new(config).init(&context(&[])).unwrap_err();
        assert!(matches!(err, StepError::Config(m) if m.contains("field 'n'")));
    }

    #[test]
    fn zero_rows_ends_immediately() {
        let mut step = Generate::new(GenerateConfig::default());
        step.init(&context(&[])).unwrap();
        let mut io = MemoryIo::source();
        assert_eq!(step.process_row(&mut io).unwrap(), Flow::EndOfStream);
        assert!(io.output.is_empty());
    }
}

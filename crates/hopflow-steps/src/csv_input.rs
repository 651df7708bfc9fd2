//! `csv_input`: reads a delimited text file, one row per record.
//!
//! Values are typed by the declared field list, matched to columns by
//! position. Without a field list every column becomes a String field named
//! after the header. A value that does not parse is a row error carrying the
//! partially typed row (the bad value as Null).
//!
//! Only copy 0 reads the file; further copies end immediately.

use std::fs::File;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hopflow_core::graph::StepMeta;
use hopflow_core::schema::{FieldMeta, RowSchema, ValueType};
use hopflow_core::step::{ErrorCause, Flow, RowIo, StepContext, StepError, StepLogic};
use hopflow_core::types::{Row, Value};
use hopflow_core::variables::MessageCatalog;

use crate::fields::{schema_of, FieldDef};
use crate::registry::parse_config;

pub const TYPE: &str = "csv_input";

pub const MSG_BAD_VALUE: &str = "csv_input.bad_value";

pub fn register_messages(catalog: &mut MessageCatalog) {
    catalog.insert(MSG_BAD_VALUE, "line {0}: {1}");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvInputConfig {
    pub path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_header")]
    pub header: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

pub(crate) fn default_delimiter() -> String {
    ",".to_string()
}

pub(crate) fn default_header() -> bool {
    true
}

/// Single-byte delimiter from config text.
pub(crate) fn delimiter_byte(text: &str) -> Result<u8, StepError> {
    match text.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(StepError::Config(format!(
            "delimiter must be a single ASCII character, got '{text}'"
        ))),
    }
}

pub struct CsvInput {
    config: CsvInputConfig,
    reader: Option<csv::Reader<File>>,
    schema: Option<Arc<RowSchema>>,
    record: csv::StringRecord,
    messages: Arc<MessageCatalog>,
}

impl CsvInput {
    pub fn new(config: CsvInputConfig) -> Result<Self, StepError> {
        delimiter_byte(&config.delimiter)?;
        Ok(Self {
            config,
            reader: None,
            schema: None,
            record: csv::StringRecord::new(),
            messages: Arc::new(MessageCatalog::new()),
        })
    }

    pub fn schema(&self) -> Option<&Arc<RowSchema>> {
        self.schema.as_ref()
    }
}

pub fn create(meta: &StepMeta, _copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
    Ok(Box::new(CsvInput::new(parse_config(meta)?)?))
}

fn csv_error(path: &str, e: csv::Error) -> StepError {
    if e.is_io_error() {
        if let csv::ErrorKind::Io(io) = e.into_kind() {
            return StepError::Io(io);
        }
        return StepError::Failed(format!("{path}: I/O error"));
    }
    StepError::Failed(format!("{path}: {e}"))
}

impl StepLogic for CsvInput {
    fn init(&mut self, ctx: &StepContext) -> Result<(), StepError> {
        self.messages = Arc::clone(&ctx.messages);
        if ctx.copy > 0 {
            tracing::debug!(channel = %ctx.log_channel(), "csv input copy idle");
            return Ok(());
        }
        let path = ctx.substitute(&self.config.path);
        let file = File::open(&path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_byte(&self.config.delimiter)?)
            .has_headers(self.config.header)
            .flexible(true)
            .from_reader(file);

        let schema = if self.config.fields.is_empty() {
            if !self.config.header {
                return Err(StepError::Config(
                    "csv_input needs a field list when the file has no header".into(),
                ));
            }
            let headers = reader.headers().map_err(|e| csv_error(&path, e))?;
            Arc::new(RowSchema::new(
                headers
                    .iter()
                    .map(|h| FieldMeta::new(h.trim(), ValueType::String))
                    .collect(),
            )?)
        } else {
            schema_of(&self.config.fields)?
        };
        tracing::debug!(%path, fields = schema.len(), "csv input opened");
        self.schema = Some(schema);
        self.reader = Some(reader);
        Ok(())
    }

    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        let (Some(reader), Some(schema)) = (self.reader.as_mut(), self.schema.as_ref()) else {
            return Ok(Flow::EndOfStream);
        };
        if !reader
            .read_record(&mut self.record)
            .map_err(|e| csv_error(&self.config.path, e))?
        {
            return Ok(Flow::EndOfStream);
        }
        io.count_input();

        let line = self.record.position().map_or(0, |p| p.line());
        let mut values = Vec::with_capacity(schema.len());
        let mut failure = None;
        for (i, field) in schema.fields().iter().enumerate() {
            let text = self.record.get(i).unwrap_or("");
            match Value::parse_as(field.value_type, text) {
                Ok(v) => values.push(v),
                Err(e) => {
                    values.push(Value::Null);
                    failure.get_or_insert((field.name.clone(), e));
                }
            }
        }
        let row = Row::new(values);

        if let Some((field, e)) = failure {
            let line = line.to_string();
            let message = self.messages.render(MSG_BAD_VALUE, &[line.as_str(), e.as_str()]);
            return Err(StepError::row_with_schema(
                Arc::clone(schema),
                row,
                ErrorCause::new(message).on_field(field).with_code("CSV_VALUE"),
            ));
        }
        io.put_row(schema, row)?;
        Ok(Flow::Continue)
    }

    fn dispose(&mut self, _ctx: &StepContext) -> Result<(), StepError> {
        self.reader = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, MemoryIo};
    use std::io::Write;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn config(path: &str, fields: serde_json::Value) -> CsvInputConfig {
        serde_json::from_value(serde_json::json!({ "path": path, "fields": fields })).unwrap()
    }

    fn drain(step: &mut CsvInput, io: &mut MemoryIo) -> Vec<StepError> {
        let mut errors = Vec::new();
        loop {
            match step.process_row(io) {
                Ok(Flow::Continue) => {}
                Ok(Flow::EndOfStream) => return errors,
                Err(e) => errors.push(e),
            }
        }
    }

    #[test]
    fn reads_typed_rows_and_counts_input() {
        let f = file_with("id,name\n1,ann\n2,bob\n,carl\n");
        let dir = f.path().parent().unwrap().to_str().unwrap().to_string();
        let name = f.path().file_name().unwrap().to_str().unwrap().to_string();
        let fields = serde_json::json!([{"name": "id", "type": "integer"}, {"name": "name"}]);
        let mut step = CsvInput::new(config(&format!("${{DIR}}/{name}"), fields)).unwrap();
        step.init(&context(&[("DIR", dir.as_str())])).unwrap();

        let mut io = MemoryIo::source();
        assert!(drain(&mut step, &mut io).is_empty());
        assert_eq!(io.output.len(), 3);
        assert_eq!(io.inputs_counted, 3);
        assert_eq!(io.output[0].values()[0], Value::Integer(1));
        assert_eq!(io.output[2].values()[0], Value::Null);
    }

    #[test]
    fn header_only_schema_is_all_strings() {
        let f = file_with("a;b\nx;y\n");
        let mut cfg = config(f.path().to_str().unwrap(), serde_json::json!([]));
        cfg.delimiter = ";".into();
        let mut step = CsvInput::new(cfg).unwrap();
        step.init(&context(&[])).unwrap();
        let schema = step.schema().cloned().unwrap();
        assert_eq!(schema.index_of("b"), Some(1));
        assert_eq!(schema.field(0).unwrap().value_type, ValueType::String);
    }

    #[test]
    fn bad_values_become_row_errors_with_their_schema() {
        let f = file_with("id\n1\nx\n3\n");
        let fields = serde_json::json!([{"name": "id", "type": "integer"}]);
        let mut step = CsvInput::new(config(f.path().to_str().unwrap(), fields)).unwrap();
        step.init(&context(&[])).unwrap();
        let mut io = MemoryIo::source();
        let errors = drain(&mut step, &mut io);
        assert_eq!(io.output.len(), 2);
        assert_eq!(errors.len(), 1);
        let (row, schema, cause) = errors.into_iter().next().unwrap().into_parts();
        assert_eq!(row.unwrap().values(), &[Value::Null]);
        assert!(schema.is_some());
        assert_eq!(cause.field.as_deref(), Some("id"));
        assert!(cause.message.starts_with("line 3:"));
    }

    #[test]
    fn missing_file_fails_init_and_bad_delimiter_fails_create() {
        let mut step = CsvInput::new(config("/nonexistent/in.csv", serde_json::json!([]))).unwrap();
        assert!(matches!(step.init(&context(&[])), Err(StepError::Io(_))));

        let mut cfg = config("x.csv", serde_json::json!([]));
        cfg.delimiter = "::".into();
        assert!(CsvInput::new(cfg).is_err());
    }
}

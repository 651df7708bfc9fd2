//! `csv_output`: writes every row as a delimited text record and forwards it
//! to the step's output hops, if any.
//!
//! The file is created at init. The header comes from the first row's schema.
//! With several copies each copy writes its own file, `out_1.csv` for copy 1
//! of `out.csv`.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use hopflow_core::graph::StepMeta;
use hopflow_core::step::{Flow, RowIo, StepContext, StepError, StepLogic};

use crate::csv_input::{default_delimiter, default_header, delimiter_byte};
use crate::registry::parse_config;

pub const TYPE: &str = "csv_output";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvOutputConfig {
    pub path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_header")]
    pub header: bool,
}

pub struct CsvOutput {
    config: CsvOutputConfig,
    writer: Option<csv::Writer<File>>,
    wrote_header: bool,
    record: Vec<String>,
}

impl CsvOutput {
    pub fn new(config: CsvOutputConfig) -> Result<Self, StepError> {
        delimiter_byte(&config.delimiter)?;
        Ok(Self {
            config,
            writer: None,
            wrote_header: false,
            record: Vec::new(),
        })
    }

    fn flush(&mut self) -> Result<(), StepError> {
        if let Some(w) = self.writer.as_mut() {
            w.flush()?;
        }
        Ok(())
    }
}

/// `dir/name.ext` → `dir/name_{copy}.ext`; copy 0 keeps the plain name.
fn copy_path(path: &str, copy: usize) -> String {
    if copy == 0 {
        return path.to_string();
    }
    let p = Path::new(path);
    match (p.file_stem(), p.extension()) {
        (Some(stem), Some(ext)) => p
            .with_file_name(format!(
                "{}_{copy}.{}",
                stem.to_string_lossy(),
                ext.to_string_lossy()
            ))
            .to_string_lossy()
            .into_owned(),
        _ => format!("{path}_{copy}"),
    }
}

fn write_error(e: csv::Error) -> StepError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => StepError::Io(io),
        other => StepError::Failed(format!("csv write: {other:?}")),
    }
}

pub fn create(meta: &StepMeta, _copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
    Ok(Box::new(CsvOutput::new(parse_config(meta)?)?))
}

impl StepLogic for CsvOutput {
    fn init(&mut self, ctx: &StepContext) -> Result<(), StepError> {
        let path = copy_path(&ctx.substitute(&self.config.path), ctx.copy);
        let file = File::create(&path)?;
        self.writer = Some(
            csv::WriterBuilder::new()
                .delimiter(delimiter_byte(&self.config.delimiter)?)
                .from_writer(file),
        );
        self.wrote_header = !self.config.header;
        tracing::debug!(%path, "csv output created");
        Ok(())
    }

    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        let Some(row) = io.get_row()? else {
            self.flush()?;
            return Ok(Flow::EndOfStream);
        };
        let schema = io
            .input_schema()
            .ok_or_else(|| StepError::Schema("input row without schema".into()))?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StepError::Failed("csv output used before init".into()))?;

        if !self.wrote_header {
            writer
                .write_record(schema.fields().iter().map(|f| f.name.as_str()))
                .map_err(write_error)?;
            self.wrote_header = true;
        }
        self.record.clear();
        self.record.extend(row.values().iter().map(|v| v.to_string()));
        writer.write_record(&self.record).map_err(write_error)?;
        io.count_output();

        if !io.output_targets().is_empty() {
            io.put_row(&schema, row)?;
        }
        Ok(Flow::Continue)
    }

    fn dispose(&mut self, _ctx: &StepContext) -> Result<(), StepError> {
        self.flush()?;
        self.writer = None;
        Ok(())
    }
}

//! Shared helpers for the end-to-end tests: extra test steps on top of the
//! built-in registry, and graph/config shortcuts.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hopflow::core::prelude::{
    EngineConfig, ErrorCause, Flow, Row, RowIo, RowSchema, StepContext, StepError, StepLogic,
    StepMeta, Value,
};
use hopflow::exec::RowListener;
use hopflow::StepRegistry;

/// Small queues so backpressure is exercised.
pub fn config() -> EngineConfig {
    EngineConfig {
        queue_capacity: 16,
        ..EngineConfig::default()
    }
}

/// `generate` step with `rows` rows of a 0-based `n` sequence.
pub fn generate(name: &str, rows: u64) -> StepMeta {
    StepMeta::new(name, "generate").with_config(serde_json::json!({
        "rows": rows,
        "sequence_field": "n"
    }))
}

/// `generate` step whose rows carry a constant `tag` plus the `n` sequence.
pub fn generate_tagged(name: &str, rows: u64, tag: &str) -> StepMeta {
    StepMeta::new(name, "generate").with_config(serde_json::json!({
        "rows": rows,
        "fields": [{"name": "tag", "value": tag}],
        "sequence_field": "n"
    }))
}

/// Rejects every row whose `n` is a multiple of `every` (config `every`).
pub struct FailEvery {
    every: i64,
}

impl StepLogic for FailEvery {
    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        let Some(row) = io.get_row()? else {
            return Ok(Flow::EndOfStream);
        };
        let schema = io.input_schema().ok_or(StepError::Stopped)?;
        let n = schema
            .index_of("n")
            .and_then(|i| row.get(i))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if (n + 1) % self.every == 0 {
            return Err(StepError::row(
                row,
                ErrorCause::new(format!("row {n} refused"))
                    .on_field("n")
                    .with_code("E_EVERY"),
            ));
        }
        io.put_row(&schema, row)?;
        Ok(Flow::Continue)
    }
}

/// Consumes rows slowly.
pub struct SlowSink {
    delay: Duration,
}

impl StepLogic for SlowSink {
    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        match io.get_row()? {
            Some(_) => {
                thread::sleep(self.delay);
                Ok(Flow::Continue)
            }
            None => Ok(Flow::EndOfStream),
        }
    }
}

pub struct BrokenInit;

impl StepLogic for BrokenInit {
    fn init(&mut self, _ctx: &StepContext) -> Result<(), StepError> {
        Err(StepError::Config("no connection settings".into()))
    }

    fn process_row(&mut self, _io: &mut dyn RowIo) -> Result<Flow, StepError> {
        Ok(Flow::EndOfStream)
    }
}

pub type Seen = Arc<Mutex<Vec<(usize, String)>>>;

/// Records `(copy, tag)` for every row it reads; rows without a `tag` field
/// record their `n`.
pub struct Recorder {
    copy: usize,
    seen: Seen,
}

impl StepLogic for Recorder {
    fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
        let Some(row) = io.get_row()? else {
            return Ok(Flow::EndOfStream);
        };
        let schema = io.input_schema().ok_or(StepError::Stopped)?;
        let key = schema
            .index_of("tag")
            .or_else(|| schema.index_of("n"))
            .and_then(|i| row.get(i))
            .map(|v| v.to_string())
            .unwrap_or_default();
        self.seen.lock().unwrap().push((self.copy, key));
        Ok(Flow::Continue)
    }
}

/// Built-in steps plus `fail_every`, `slow_sink`, `broken_init` and a
/// `recorder` writing into `seen`.
pub fn registry_with(seen: Seen) -> StepRegistry {
    let mut r = StepRegistry::new();
    r.register("fail_every", |meta: &StepMeta, _copy: usize| {
        let every = meta.config["every"].as_i64().unwrap_or(10).max(1);
        Ok(Box::new(FailEvery { every }) as Box<dyn StepLogic>)
    });
    r.register("slow_sink", |meta: &StepMeta, _copy: usize| {
        let ms = meta.config["delay_ms"].as_u64().unwrap_or(1);
        Ok(Box::new(SlowSink {
            delay: Duration::from_millis(ms),
        }) as Box<dyn StepLogic>)
    });
    r.register("broken_init", |_meta: &StepMeta, _copy: usize| {
        Ok(Box::new(BrokenInit) as Box<dyn StepLogic>)
    });
    r.register("recorder", move |_meta: &StepMeta, copy: usize| {
        Ok(Box::new(Recorder {
            copy,
            seen: Arc::clone(&seen),
        }) as Box<dyn StepLogic>)
    });
    r
}

pub fn registry() -> StepRegistry {
    registry_with(Arc::new(Mutex::new(Vec::new())))
}

/// Listener keeping every row read by the step it is attached to.
#[derive(Default)]
pub struct Capture {
    pub rows: Mutex<Vec<(Arc<RowSchema>, Row)>>,
}

impl RowListener for Capture {
    fn row_read(&self, schema: &RowSchema, row: &Row) {
        self.rows
            .lock()
            .unwrap()
            .push((Arc::new(schema.clone()), row.clone()));
    }
}

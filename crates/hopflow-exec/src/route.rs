//! Output routing of one unit: which queue(s) a row goes to.
//!
//! Two levels:
//! - across target steps: copy to every target, or round robin when the
//!   source step is `distribute`;
//! - across the copies of one target: round robin, or key partitioning when
//!   the target step declares partition fields.
//!
//! The error hop is routed the same way but builds its own row shape: the
//! offending row followed by the error fields.

use std::sync::Arc;

use hopflow_core::graph::ErrorHandlingMeta;
use hopflow_core::partition::{HashPartitioner, Partitioner};
use hopflow_core::schema::{FieldMeta, RowSchema, ValueType};
use hopflow_core::step::{ErrorCause, StepError};
use hopflow_core::types::{Row, Value};

use crate::queue::{QueueError, RowQueue};

enum CopyRouting {
    Single,
    RoundRobin { next: usize },
    Partitioned(HashPartitioner),
}

/// Queues leading to every copy of one target step, indexed by target copy
/// (a single queue when the hop is wired 1:1).
pub struct TargetQueues {
    target: String,
    queues: Vec<Arc<RowQueue>>,
    routing: CopyRouting,
}

impl TargetQueues {
    pub fn new(
        target: impl Into<String>,
        queues: Vec<Arc<RowQueue>>,
        partitioner: Option<HashPartitioner>,
        start: usize,
    ) -> Self {
        let routing = match (queues.len(), partitioner) {
            (0 | 1, _) => CopyRouting::Single,
            (_, Some(p)) => CopyRouting::Partitioned(p),
            (n, None) => CopyRouting::RoundRobin { next: start % n },
        };
        Self {
            target: target.into(),
            queues,
            routing,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn queues(&self) -> &[Arc<RowQueue>] {
        &self.queues
    }

    fn pick(&mut self, schema: &RowSchema, row: &Row) -> Result<usize, StepError> {
        match &mut self.routing {
            CopyRouting::Single => Ok(0),
            CopyRouting::RoundRobin { next } => {
                let idx = *next;
                *next = (idx + 1) % self.queues.len();
                Ok(idx)
            }
            CopyRouting::Partitioned(p) => p
                .partition(schema, row, self.queues.len())
                .map_err(|e| StepError::Schema(e.to_string())),
        }
    }

    pub fn send(&mut self, schema: &Arc<RowSchema>, row: Row, strict: bool) -> Result<(), StepError> {
        if self.queues.is_empty() {
            return Ok(());
        }
        let idx = self.pick(schema, &row)?;
        put_on(&self.queues[idx], schema, row, strict)
    }

    pub fn mark_done(&self) {
        for q in &self.queues {
            q.mark_done();
        }
    }
}

fn put_on(
    queue: &RowQueue,
    schema: &Arc<RowSchema>,
    row: Row,
    strict: bool,
) -> Result<(), StepError> {
    queue.negotiate_schema(schema, strict).map_err(StepError::Schema)?;
    match queue.put(row) {
        Ok(()) => Ok(()),
        // Consumer finished early; nobody will read this row.
        Err(QueueError::Detached) => Ok(()),
        Err(QueueError::Cancelled) => Err(StepError::Stopped),
        Err(QueueError::Done) => Err(StepError::Failed(format!(
            "hop '{}' already marked done",
            queue.name()
        ))),
    }
}

/// Normal outputs of one unit.
pub struct OutputRouter {
    targets: Vec<TargetQueues>,
    distribute: bool,
    next_target: usize,
    strict: bool,
}

impl OutputRouter {
    pub fn new(targets: Vec<TargetQueues>, distribute: bool, strict: bool) -> Self {
        Self {
            targets,
            distribute,
            next_target: 0,
            strict,
        }
    }

    /// Route by the step's distribution policy. A step without outputs drops
    /// the row.
    pub fn route(&mut self, schema: &Arc<RowSchema>, row: Row) -> Result<(), StepError> {
        let n = self.targets.len();
        if n == 0 {
            return Ok(());
        }
        if self.distribute {
            let idx = self.next_target;
            self.next_target = (idx + 1) % n;
            return self.targets[idx].send(schema, row, self.strict);
        }
        let strict = self.strict;
        match self.targets.split_last_mut() {
            Some((last, rest)) => {
                for t in rest {
                    t.send(schema, row.clone(), strict)?;
                }
                last.send(schema, row, strict)
            }
            None => Ok(()),
        }
    }

    pub fn route_to(
        &mut self,
        target: &str,
        schema: &Arc<RowSchema>,
        row: Row,
    ) -> Result<(), StepError> {
        let strict = self.strict;
        let t = self
            .targets
            .iter_mut()
            .find(|t| t.target == target)
            .ok_or_else(|| StepError::Config(format!("'{target}' is not an output of this step")))?;
        t.send(schema, row, strict)
    }

    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.target.clone()).collect()
    }

    pub fn mark_done(&self) {
        for t in &self.targets {
            t.mark_done();
        }
    }
}

/// The error hop of one unit plus the row shape it emits.
pub struct ErrorOutput {
    queues: TargetQueues,
    meta: ErrorHandlingMeta,
    strict: bool,
    // Layout built for the last source schema seen.
    cached: Option<ErrorLayout>,
}

struct ErrorLayout {
    source: Arc<RowSchema>,
    schema: Arc<RowSchema>,
    // Position of each enabled error field in `schema`, in `error_fields` order.
    slots: Vec<usize>,
}

impl ErrorOutput {
    pub fn new(queues: TargetQueues, meta: ErrorHandlingMeta, strict: bool) -> Self {
        Self {
            queues,
            meta,
            strict,
            cached: None,
        }
    }

    pub fn meta(&self) -> &ErrorHandlingMeta {
        &self.meta
    }

    pub fn target(&self) -> &str {
        self.queues.target()
    }

    /// Schema of rows emitted for failures on rows shaped like `source`.
    ///
    /// Error fields are appended. A source that already carries an error
    /// field of the same name and type (rows coming off another error hop)
    /// keeps its position and the value is overwritten; a type clash is a
    /// schema error.
    pub fn error_schema(&mut self, source: &Arc<RowSchema>) -> Result<Arc<RowSchema>, StepError> {
        if let Some(layout) = &self.cached {
            if Arc::ptr_eq(&layout.source, source) || *layout.source == **source {
                return Ok(Arc::clone(&layout.schema));
            }
        }
        let mut fields = source.fields().to_vec();
        let mut slots = Vec::new();
        for field in error_fields(&self.meta) {
            match source.index_of(&field.name) {
                Some(idx) => {
                    let existing = source.fields()[idx].value_type;
                    if existing != field.value_type {
                        return Err(StepError::Schema(format!(
                            "error field '{}' already exists as {} (needs {})",
                            field.name,
                            existing.name(),
                            field.value_type.name()
                        )));
                    }
                    slots.push(idx);
                }
                None => {
                    slots.push(fields.len());
                    fields.push(field);
                }
            }
        }
        let schema = Arc::new(RowSchema::new(fields)?);
        self.cached = Some(ErrorLayout {
            source: Arc::clone(source),
            schema: Arc::clone(&schema),
            slots,
        });
        Ok(schema)
    }

    /// The offending row (or nulls when there is none) with the error fields
    /// filled in. Call `error_schema` for the same `source` first.
    pub fn build_row(&self, source: &RowSchema, row: Option<Row>, cause: &ErrorCause) -> Row {
        let (width, slots) = match &self.cached {
            Some(l) if *l.source == *source => (l.schema.len(), l.slots.as_slice()),
            _ => (source.len(), &[][..]),
        };
        let mut out = match row {
            Some(r) => r.resized(source.len()),
            None => Row::nulls(source.len()),
        }
        .resized(width);

        let mut values = Vec::new();
        if self.meta.count_field.is_some() {
            values.push(Value::Integer(1));
        }
        if self.meta.description_field.is_some() {
            values.push(Value::String(cause.message.clone()));
        }
        if self.meta.field_name_field.is_some() {
            values.push(cause.field.clone().map_or(Value::Null, Value::String));
        }
        if self.meta.code_field.is_some() {
            values.push(cause.code.clone().map_or(Value::Null, Value::String));
        }
        for (slot, value) in slots.iter().zip(values) {
            out.set(*slot, value);
        }
        out
    }

    pub fn send(&mut self, schema: &Arc<RowSchema>, row: Row) -> Result<(), StepError> {
        self.queues.send(schema, row, self.strict)
    }

    pub fn mark_done(&self) {
        self.queues.mark_done();
    }
}

fn error_fields(meta: &ErrorHandlingMeta) -> Vec<FieldMeta> {
    let mut fields = Vec::new();
    if let Some(name) = &meta.count_field {
        fields.push(FieldMeta::new(name.clone(), ValueType::Integer));
    }
    if let Some(name) = &meta.description_field {
        fields.push(FieldMeta::new(name.clone(), ValueType::String));
    }
    if let Some(name) = &meta.field_name_field {
        fields.push(FieldMeta::new(name.clone(), ValueType::String));
    }
    if let Some(name) = &meta.code_field {
        fields.push(FieldMeta::new(name.clone(), ValueType::String));
    }
    fields
}

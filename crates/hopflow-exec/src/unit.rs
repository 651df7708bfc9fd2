//! StepUnit: one running copy of a step, driven on its own thread.
//!
//! Lifecycle: `init` → start gate → `process_row` loop → outputs marked done
//! → `dispose`. `dispose` always runs, whatever happened before. A failure
//! that is not redirected to an error hop requests a run-wide stop.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use hopflow_core::graph::ErrorHandlingMeta;
use hopflow_core::id::UnitId;
use hopflow_core::schema::RowSchema;
use hopflow_core::step::{Flow, RowIo, StepContext, StepError, StepLogic};
use hopflow_core::types::Row;

use crate::control::{RunControl, StartGate, StopReason};
use crate::listener::RowListener;
use crate::queue::{Poll, RowQueue};
use crate::result::{Phase, StepCounters, StepOutcome, UnitState};
use crate::route::{ErrorOutput, OutputRouter};

/// Row access of one unit; handed to `StepLogic::process_row`.
pub struct UnitIo {
    inputs: Vec<Arc<RowQueue>>,
    // Indices into `inputs` that may still deliver rows.
    active: Vec<usize>,
    cursor: usize,
    poll: Duration,
    current_schema: Option<Arc<RowSchema>>,
    outputs: OutputRouter,
    counters: Arc<StepCounters>,
    control: Arc<RunControl>,
    listeners: Vec<Arc<dyn RowListener>>,
    // Set once this unit itself observed the stop, through its queues or
    // `is_stopped`.
    saw_stop: Cell<bool>,
}

impl UnitIo {
    pub fn new(
        inputs: Vec<Arc<RowQueue>>,
        outputs: OutputRouter,
        counters: Arc<StepCounters>,
        control: Arc<RunControl>,
        poll: Duration,
    ) -> Self {
        let active = (0..inputs.len()).collect();
        Self {
            inputs,
            active,
            cursor: 0,
            poll,
            current_schema: None,
            outputs,
            counters,
            control,
            listeners: Vec::new(),
            saw_stop: Cell::new(false),
        }
    }

    fn accept(&mut self, queue: &RowQueue, row: Row) -> Row {
        self.current_schema = queue.schema();
        self.counters.inc_read();
        if let Some(schema) = &self.current_schema {
            for l in &self.listeners {
                l.row_read(schema, &row);
            }
        }
        row
    }

    fn check_arity(schema: &RowSchema, row: &Row) -> Result<(), StepError> {
        if row.len() != schema.len() {
            return Err(StepError::Schema(format!(
                "row has {} values but its schema has {} fields",
                row.len(),
                schema.len()
            )));
        }
        Ok(())
    }

    fn finish(&mut self, error_output: Option<&ErrorOutput>) {
        self.outputs.mark_done();
        if let Some(out) = error_output {
            out.mark_done();
        }
        for q in &self.inputs {
            q.detach_consumer();
        }
        self.active.clear();
    }
}

impl RowIo for UnitIo {
    fn get_row(&mut self) -> Result<Option<Row>, StepError> {
        loop {
            if self.active.is_empty() {
                return Ok(None);
            }
            if self.control.is_stopped() {
                self.saw_stop.set(true);
                return Ok(None);
            }

            if self.active.len() == 1 {
                let q = Arc::clone(&self.inputs[self.active[0]]);
                return match q.get() {
                    Some(row) => Ok(Some(self.accept(&q, row))),
                    None => {
                        if q.is_cancelled() {
                            self.saw_stop.set(true);
                        } else {
                            self.active.clear();
                        }
                        Ok(None)
                    }
                };
            }

            let slot = self.cursor % self.active.len();
            let q = Arc::clone(&self.inputs[self.active[slot]]);
            match q.poll(self.poll) {
                Poll::Row(row) => {
                    self.cursor = slot + 1;
                    return Ok(Some(self.accept(&q, row)));
                }
                Poll::Empty => self.cursor = slot + 1,
                Poll::Done => {
                    self.active.remove(slot);
                    self.cursor = slot;
                }
                Poll::Cancelled => {
                    self.saw_stop.set(true);
                    return Ok(None);
                }
            }
        }
    }

    fn input_schema(&self) -> Option<Arc<RowSchema>> {
        self.current_schema.clone()
    }

    fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    fn put_row(&mut self, schema: &Arc<RowSchema>, row: Row) -> Result<(), StepError> {
        Self::check_arity(schema, &row)?;
        for l in &self.listeners {
            l.row_written(schema, &row);
        }
        self.outputs.route(schema, row)?;
        self.counters.inc_written();
        Ok(())
    }

    fn put_row_to(
        &mut self,
        target: &str,
        schema: &Arc<RowSchema>,
        row: Row,
    ) -> Result<(), StepError> {
        Self::check_arity(schema, &row)?;
        for l in &self.listeners {
            l.row_written(schema, &row);
        }
        self.outputs.route_to(target, schema, row)?;
        self.counters.inc_written();
        Ok(())
    }

    fn output_targets(&self) -> Vec<String> {
        self.outputs.target_names()
    }

    fn count_input(&mut self) {
        self.counters.inc_input();
    }

    fn count_output(&mut self) {
        self.counters.inc_output();
    }

    fn is_stopped(&self) -> bool {
        let stopped = self.control.is_stopped();
        if stopped {
            self.saw_stop.set(true);
        }
        stopped
    }
}

/// What a unit thread hands back when it exits.
#[derive(Debug)]
pub struct UnitReport {
    pub id: UnitId,
    pub step: String,
    pub copy: usize,
    pub outcome: StepOutcome,
    pub messages: Vec<String>,
}

pub struct StepUnit {
    id: UnitId,
    ctx: StepContext,
    logic: Box<dyn StepLogic>,
    io: UnitIo,
    error_output: Option<ErrorOutput>,
    messages: Vec<String>,
}

impl StepUnit {
    pub fn new(
        id: UnitId,
        ctx: StepContext,
        logic: Box<dyn StepLogic>,
        io: UnitIo,
        error_output: Option<ErrorOutput>,
    ) -> Self {
        Self {
            id,
            ctx,
            logic,
            io,
            error_output,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn step_name(&self) -> &str {
        &self.ctx.step_name
    }

    pub fn copy(&self) -> usize {
        self.ctx.copy
    }

    pub fn counters(&self) -> Arc<StepCounters> {
        Arc::clone(&self.io.counters)
    }

    pub fn add_listener(&mut self, listener: Arc<dyn RowListener>) {
        self.io.listeners.push(listener);
    }

    /// Thread name, e.g. `filter.1`.
    pub fn thread_name(&self) -> String {
        self.ctx.log_channel()
    }

    /// Drive the unit to completion. Never panics out of step logic.
    pub fn run(mut self, gate: &StartGate) -> UnitReport {
        let span = tracing::info_span!("unit", step = %self.ctx.step_name, copy = self.ctx.copy);
        let _enter = span.enter();
        let counters = Arc::clone(&self.io.counters);

        counters.set_state(UnitState::Initializing);
        let outcome = match self.call_init() {
            Err(msg) => {
                counters.inc_errors();
                self.fail(format!("init failed: {msg}"), true);
                gate.arrive_and_wait();
                StepOutcome::Failed { phase: Phase::Init }
            }
            Ok(()) => {
                tracing::debug!("initialized");
                gate.arrive_and_wait();
                if self.io.control.is_stopped() {
                    StepOutcome::Stopped
                } else {
                    counters.set_state(UnitState::Running);
                    self.run_loop()
                }
            }
        };

        counters.set_state(if outcome.is_failed() {
            UnitState::Failed
        } else {
            UnitState::Finishing
        });
        self.io.finish(self.error_output.as_ref());

        let outcome = self.call_dispose(outcome);
        counters.set_state(UnitState::Disposed);
        tracing::debug!(?outcome, "unit finished");

        UnitReport {
            id: self.id,
            step: self.ctx.step_name,
            copy: self.ctx.copy,
            outcome,
            messages: self.messages,
        }
    }

    fn call_init(&mut self) -> Result<(), String> {
        let ctx = &self.ctx;
        let logic = &mut self.logic;
        match panic::catch_unwind(AssertUnwindSafe(|| {
            crate::fail_point!("unit.init", ctx.step_name.as_str());
            logic.init(ctx)
        })) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload)),
        }
    }

    fn call_dispose(&mut self, outcome: StepOutcome) -> StepOutcome {
        let ctx = &self.ctx;
        let logic = &mut self.logic;
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            crate::fail_point!("unit.dispose", ctx.step_name.as_str());
            logic.dispose(ctx)
        }));
        let msg = match res {
            Ok(Ok(())) => return outcome,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload),
        };
        // Only a clean run is turned into a dispose failure.
        self.io.counters.inc_errors();
        self.fail(format!("dispose failed: {msg}"), false);
        match outcome {
            StepOutcome::Completed => StepOutcome::Failed {
                phase: Phase::Dispose,
            },
            other => other,
        }
    }

    fn run_loop(&mut self) -> StepOutcome {
        loop {
            if self.io.control.is_paused() {
                self.io.counters.set_state(UnitState::Paused);
                self.io.control.wait_while_paused();
                self.io.counters.set_state(UnitState::Running);
            }
            if self.io.control.is_stopped() {
                return StepOutcome::Stopped;
            }
            let step = self.ctx.step_name.as_str();
            let logic = &mut self.logic;
            let io = &mut self.io;
            let res = panic::catch_unwind(AssertUnwindSafe(|| {
                crate::fail_point!("unit.process_row", step);
                logic.process_row(io)
            }));
            match res {
                Ok(Ok(Flow::Continue)) => {}
                // A stream that ran to its end is complete even if a peer
                // stopped the run meanwhile.
                Ok(Ok(Flow::EndOfStream)) => {
                    return if self.io.saw_stop.get() {
                        StepOutcome::Stopped
                    } else {
                        StepOutcome::Completed
                    };
                }
                Ok(Err(e)) if e.is_stop() => return StepOutcome::Stopped,
                Ok(Err(e)) => {
                    if let Err(msg) = self.handle_step_error(e) {
                        self.fail(msg, true);
                        return StepOutcome::Failed { phase: Phase::Run };
                    }
                }
                Err(payload) => {
                    self.io.counters.inc_errors();
                    self.fail(panic_message(payload), true);
                    return StepOutcome::Failed { phase: Phase::Run };
                }
            }
        }
    }

    /// Count the error and redirect it to the error hop when there is one.
    /// `Err` means the failure is fatal for this unit.
    fn handle_step_error(&mut self, err: StepError) -> Result<(), String> {
        self.io.counters.inc_errors();
        let Some(out) = self.error_output.as_mut() else {
            return Err(err.to_string());
        };

        let (row, row_schema, cause) = err.into_parts();
        let source = row_schema
            .or_else(|| self.io.current_schema.clone())
            .unwrap_or_else(|| Arc::new(RowSchema::empty()));
        let schema = out.error_schema(&source).map_err(|e| e.to_string())?;
        let error_row = out.build_row(&source, row, &cause);
        for l in &self.io.listeners {
            l.error_row_written(&schema, &error_row);
        }
        match out.send(&schema, error_row) {
            Ok(()) => {}
            // The loop notices the stop on its next turn.
            Err(e) if e.is_stop() => return Ok(()),
            Err(e) => return Err(e.to_string()),
        }

        let rejected = self.io.counters.inc_rejected();
        tracing::debug!(%cause, target = out.target(), "row sent to error hop");
        let c = self.io.counters.snapshot();
        check_rejection_rates(out.meta(), rejected, c.rows_read + c.rows_input)
    }

    /// Record a failure message; the error itself is already counted.
    /// `fatal` also stops the run.
    fn fail(&mut self, msg: String, fatal: bool) {
        tracing::error!(error = %msg, "step failed");
        self.messages.push(msg);
        if fatal {
            self.io.counters.set_state(UnitState::Failed);
            self.io.control.request_stop(StopReason::Failure);
        }
    }
}

/// Fail once rejections pass either configured limit.
fn check_rejection_rates(meta: &ErrorHandlingMeta, rejected: u64, seen: u64) -> Result<(), String> {
    if meta.max_errors > 0 && rejected > meta.max_errors {
        return Err(format!(
            "{rejected} rejected rows exceed the maximum of {}",
            meta.max_errors
        ));
    }
    if meta.max_percent_errors > 0 && seen > 0 && seen >= meta.min_rows_for_percent {
        let percent = (rejected * 100).div_ceil(seen);
        if percent > u64::from(meta.max_percent_errors) {
            return Err(format!(
                "{percent}% rejected rows ({rejected} of {seen}) exceed the maximum of {}%",
                meta.max_percent_errors
            ));
        }
    }
    Ok(())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic in step logic".to_string()
    }
}

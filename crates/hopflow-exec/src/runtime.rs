//! Runtime: turn a step graph into running units, drive them to the end and
//! freeze the outcome into a `RunResult`.
//!
//! Behavior:
//! - `Executor::prepare` validates the graph (via `hopflow-planner`), creates
//!   one `StepLogic` per step copy through the `StepFactory` and wires the
//!   queues. Nothing runs yet.
//! - `PreparedRun::execute` starts one thread per unit, waits for all of them
//!   and emits a `RunManifest` with the graph hash.
//! - A `RunHandle` stops, pauses or resumes the run from any thread; an
//!   optional watchdog stops it once `run_timeout_ms` elapses.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use hopflow_core::config::EngineConfig;
use hopflow_core::graph::GraphMeta;
use hopflow_core::hash::{hash_graph, Hash256};
use hopflow_core::id::UnitId;
use hopflow_core::manifest::{RunId, RunManifest};
use hopflow_core::step::StepFactory;
use hopflow_planner::{validate_graph, PlanError};

use crate::control::{RunControl, StartGate, StopReason};
use crate::listener::RowListener;
use crate::metrics;
use crate::result::{
    Phase, RunResult, RunStatus, StepCounters, StepOutcome, StepProgress, StepResult,
};
use crate::unit::{StepUnit, UnitReport};
use crate::wiring::build_units;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid graph: {0}")]
    Plan(#[from] PlanError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unknown step '{0}'")]
    UnknownStep(String),
    #[error("cannot build step '{step}' copy {copy}: {message}")]
    Build {
        step: String,
        copy: usize,
        message: String,
    },
    #[error("hashing error: {0}")]
    Hash(String),
}

impl ExecError {
    pub(crate) fn build(step: &str, copy: usize, message: String) -> Self {
        ExecError::Build {
            step: step.to_string(),
            copy,
            message,
        }
    }
}

/// Entry point; all state lives in the `PreparedRun` it returns.
pub struct Executor;

impl Executor {
    /// Validate and build a run without starting it.
    pub fn prepare(
        graph: &GraphMeta,
        config: &EngineConfig,
        factory: &dyn StepFactory,
    ) -> Result<PreparedRun, ExecError> {
        config
            .validate()
            .map_err(|e| ExecError::Config(e.to_string()))?;
        let report = validate_graph(graph)?;
        for w in report.warnings() {
            tracing::warn!(graph = %graph.name, "{w}");
        }
        let graph_hash = hash_graph(graph).map_err(|e| ExecError::Hash(e.to_string()))?;

        let wiring = build_units(graph, config, factory)?;
        let probes = wiring
            .units
            .iter()
            .map(|u| UnitProbe {
                step: u.step_name().to_string(),
                copy: u.copy(),
                counters: u.counters(),
            })
            .collect();

        tracing::info!(
            graph = %graph.name,
            units = wiring.units.len(),
            queues = wiring.control.queues().len(),
            "run prepared"
        );

        Ok(PreparedRun {
            run_id: RunId::new(),
            graph_name: graph.name.clone(),
            graph_hash,
            units: wiring.units,
            control: wiring.control,
            probes: Arc::new(probes),
            timeout: config.run_timeout_ms.map(Duration::from_millis),
        })
    }

    /// Prepare and execute in one go.
    pub fn execute(
        graph: &GraphMeta,
        config: &EngineConfig,
        factory: &dyn StepFactory,
    ) -> Result<RunResult, ExecError> {
        Ok(Self::prepare(graph, config, factory)?.execute())
    }
}

#[derive(Debug)]
struct UnitProbe {
    step: String,
    copy: usize,
    counters: Arc<StepCounters>,
}

/// Control surface of a run, usable from any thread while it executes.
#[derive(Debug, Clone)]
pub struct RunHandle {
    control: Arc<RunControl>,
    probes: Arc<Vec<UnitProbe>>,
}

impl RunHandle {
    /// Ask every unit to stop. Idempotent.
    pub fn request_stop(&self) {
        self.control.request_stop(StopReason::Requested);
    }

    pub fn is_stopped(&self) -> bool {
        self.control.is_stopped()
    }

    /// Hold every unit before its next row. Units already blocked on a queue
    /// finish that call first. Ignored once the run is stopped.
    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// Live state and counters of every unit.
    pub fn progress(&self) -> Vec<StepProgress> {
        self.probes
            .iter()
            .map(|p| StepProgress {
                step: p.step.clone(),
                copy: p.copy,
                state: p.counters.state(),
                counters: p.counters.snapshot(),
            })
            .collect()
    }
}

/// A fully wired run. Single use: `execute` consumes it.
pub struct PreparedRun {
    run_id: RunId,
    graph_name: String,
    graph_hash: Hash256,
    units: Vec<StepUnit>,
    control: Arc<RunControl>,
    probes: Arc<Vec<UnitProbe>>,
    timeout: Option<Duration>,
}

impl PreparedRun {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Names of all queues, `from.i - to.j`.
    pub fn queue_names(&self) -> Vec<String> {
        self.control.queues().iter().map(|q| q.name()).collect()
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle {
            control: Arc::clone(&self.control),
            probes: Arc::clone(&self.probes),
        }
    }

    /// Attach a listener to every copy of `step`.
    pub fn add_row_listener(
        &mut self,
        step: &str,
        listener: Arc<dyn RowListener>,
    ) -> Result<(), ExecError> {
        let mut found = false;
        for unit in self.units.iter_mut().filter(|u| u.step_name() == step) {
            unit.add_listener(Arc::clone(&listener));
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(ExecError::UnknownStep(step.to_string()))
        }
    }

    /// Run every unit on its own thread and block until all have finished.
    pub fn execute(self) -> RunResult {
        let started_ms = now_millis();
        tracing::info!(run_id = %self.run_id, graph = %self.graph_name, "run started");

        let gate = Arc::new(StartGate::new(self.units.len()));
        let watchdog = self
            .timeout
            .and_then(|t| spawn_watchdog(Arc::clone(&self.control), t));

        let mut pending = Vec::with_capacity(self.units.len());
        for unit in self.units {
            let (id, step, copy) = (unit.id(), unit.step_name().to_string(), unit.copy());
            let gate_ref = Arc::clone(&gate);
            let control = Arc::clone(&self.control);
            let spawned = thread::Builder::new()
                .name(unit.thread_name())
                .spawn(move || {
                    let (id, step, copy) = (unit.id(), unit.step_name().to_string(), unit.copy());
                    panic::catch_unwind(AssertUnwindSafe(|| unit.run(&gate_ref))).unwrap_or_else(
                        |_| {
                            control.request_stop(StopReason::Failure);
                            failed_report(id, step, copy, Phase::Run, "unit thread panicked")
                        },
                    )
                });
            match spawned {
                Ok(h) => pending.push(Pending::Running(h, id, step, copy)),
                Err(e) => {
                    tracing::error!(%step, copy, error = %e, "cannot start unit thread");
                    self.control.request_stop(StopReason::Failure);
                    gate.force_open();
                    let msg = format!("cannot start thread: {e}");
                    pending.push(Pending::Done(failed_report(id, step, copy, Phase::Init, &msg)));
                }
            }
        }

        let reports: Vec<UnitReport> = pending
            .into_iter()
            .map(|p| match p {
                Pending::Running(h, id, step, copy) => h.join().unwrap_or_else(|_| {
                    self.control.request_stop(StopReason::Failure);
                    failed_report(id, step, copy, Phase::Run, "unit thread panicked")
                }),
                Pending::Done(r) => r,
            })
            .collect();

        if let Some((tx, h)) = watchdog {
            drop(tx);
            let _ = h.join();
        }

        let status = run_status(
            reports.iter().map(|r| r.outcome),
            self.control.has_failed(),
        );

        let steps = reports
            .into_iter()
            .zip(self.probes.iter())
            .map(|(r, probe)| {
                let mut counters = probe.counters.snapshot();
                if r.outcome.is_failed() && counters.errors == 0 {
                    counters.errors = 1;
                }
                StepResult::new(r.step, r.copy, r.outcome, counters, r.messages)
            })
            .collect();

        let manifest = RunManifest::new(self.run_id, self.graph_name, self.graph_hash, started_ms)
            .finish(now_millis());
        let result = RunResult::new(manifest, status, steps);
        metrics::emit_run_summary(&result);
        result
    }
}

enum Pending {
    Running(JoinHandle<UnitReport>, UnitId, String, usize),
    Done(UnitReport),
}

/// Failed if any unit failed, Stopped if any unit was cut short, else
/// Completed. A stop that arrives after every unit completed changes nothing.
fn run_status(outcomes: impl Iterator<Item = StepOutcome>, failure_seen: bool) -> RunStatus {
    let mut status = if failure_seen {
        RunStatus::Failed
    } else {
        RunStatus::Completed
    };
    for outcome in outcomes {
        if outcome.is_failed() {
            return RunStatus::Failed;
        }
        if outcome == StepOutcome::Stopped && status == RunStatus::Completed {
            status = RunStatus::Stopped;
        }
    }
    status
}

fn failed_report(id: UnitId, step: String, copy: usize, phase: Phase, msg: &str) -> UnitReport {
    UnitReport {
        id,
        step,
        copy,
        outcome: StepOutcome::Failed { phase },
        messages: vec![msg.to_string()],
    }
}

/// Requests a stop once `timeout` elapses, unless the sender is dropped first.
fn spawn_watchdog(
    control: Arc<RunControl>,
    timeout: Duration,
) -> Option<(mpsc::Sender<()>, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel::<()>();
    let spawned = thread::Builder::new()
        .name("watchdog".into())
        .spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(timeout) {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "run timeout elapsed");
                control.request_stop(StopReason::Timeout);
            }
        });
    match spawned {
        Ok(h) => Some((tx, h)),
        Err(e) => {
            tracing::warn!(error = %e, "cannot start watchdog; run has no timeout");
            None
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use hopflow_core::graph::{ErrorHandlingMeta, HopMeta, StepMeta};
    use hopflow_core::schema::{FieldMeta, RowSchema, ValueType};
    use hopflow_core::step::{ErrorCause, Flow, RowIo, StepContext, StepError, StepLogic};
    use hopflow_core::types::{Row, Value};

    use crate::result::UnitState;

    struct Source {
        rows: i64,
        next: i64,
        schema: Arc<RowSchema>,
    }

    impl StepLogic for Source {
        fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
            if self.next >= self.rows || io.is_stopped() {
                return Ok(Flow::EndOfStream);
            }
            io.put_row(&self.schema, Row::new(vec![Value::Integer(self.next)]))?;
            self.next += 1;
            Ok(Flow::Continue)
        }
    }

    /// Passes rows through; rejects every `fail_every`-th id.
    struct Pass {
        fail_every: i64,
    }

    impl StepLogic for Pass {
        fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
            let Some(row) = io.get_row()? else {
                return Ok(Flow::EndOfStream);
            };
            let id = row.get(0).and_then(Value::as_i64).unwrap_or(0);
            if self.fail_every > 0 && id % self.fail_every == 0 {
                return Err(StepError::row(row, ErrorCause::new("rejected id").on_field("id")));
            }
            let schema = io.input_schema().ok_or(StepError::Stopped)?;
            io.put_row(&schema, row)?;
            Ok(Flow::Continue)
        }
    }

    struct Sink;

    impl StepLogic for Sink {
        fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
            match io.get_row()? {
                Some(_) => Ok(Flow::Continue),
                None => Ok(Flow::EndOfStream),
            }
        }
    }

    /// Reads everything, then fails once its input is exhausted.
    struct LateFail;

    impl StepLogic for LateFail {
        fn process_row(&mut self, io: &mut dyn RowIo) -> Result<Flow, StepError> {
            match io.get_row()? {
                Some(_) => Ok(Flow::Continue),
                None => Err(StepError::Config("cannot finish".into())),
            }
        }
    }

    struct FailingInit;

    impl StepLogic for FailingInit {
        fn init(&mut self, _ctx: &StepContext) -> Result<(), StepError> {
            Err(StepError::Config("missing setting".into()))
        }
        fn process_row(&mut self, _io: &mut dyn RowIo) -> Result<Flow, StepError> {
            Ok(Flow::EndOfStream)
        }
    }

    fn schema() -> Arc<RowSchema> {
        Arc::new(RowSchema::new(vec![FieldMeta::new("id", ValueType::Integer)]).unwrap())
    }

    fn factory(meta: &StepMeta, _copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
        let rows = meta.config["rows"].as_i64().unwrap_or(0);
        let fail_every = meta.config["fail_every"].as_i64().unwrap_or(0);
        Ok(match meta.step_type.as_str() {
            "source" => Box::new(Source {
                rows,
                next: 0,
                schema: schema(),
            }),
            "pass" => Box::new(Pass { fail_every }),
            "sink" => Box::new(Sink),
            "failing_init" => Box::new(FailingInit),
            "late_fail" => Box::new(LateFail),
            other => return Err(StepError::Config(format!("unknown step type '{other}'"))),
        })
    }

    fn cfg() -> EngineConfig {
        EngineConfig {
            queue_capacity: 8,
            ..Default::default()
        }
    }

    fn source(name: &str, rows: i64) -> StepMeta {
        StepMeta::new(name, "source").with_config(serde_json::json!({ "rows": rows }))
    }

    #[test]
    fn linear_run_conserves_rows() {
        let g = GraphMeta::new("linear")
            .step(source("src", 500))
            .step(StepMeta::new("pass", "pass"))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "pass"))
            .hop(HopMeta::new("pass", "sink"));
        let res = Executor::execute(&g, &cfg(), &factory).unwrap();
        assert_eq!(res.status(), RunStatus::Completed);
        assert_eq!(res.rows_written("src"), 500);
        assert_eq!(res.rows_read("pass"), 500);
        assert_eq!(res.rows_read("sink"), 500);
        assert_eq!(res.errors(), 0);
        assert!(res.manifest().finished_ms >= res.manifest().started_ms);
    }

    #[test]
    fn error_hop_isolates_bad_rows() {
        let g = GraphMeta::new("errors")
            .step(source("src", 100))
            .step(
                StepMeta::new("pass", "pass")
                    .with_config(serde_json::json!({ "fail_every": 10 }))
                    .with_error_handling(ErrorHandlingMeta::default()),
            )
            .step(StepMeta::new("good", "sink"))
            .step(StepMeta::new("bad", "sink"))
            .hop(HopMeta::new("src", "pass"))
            .hop(HopMeta::new("pass", "good"))
            .hop(HopMeta::error("pass", "bad"));
        let res = Executor::execute(&g, &cfg(), &factory).unwrap();
        assert_eq!(res.status(), RunStatus::Completed);
        assert_eq!(res.rows_read("good"), 90);
        assert_eq!(res.rows_read("bad"), 10);
        assert_eq!(res.rows_rejected("pass"), 10);
        assert_eq!(res.step_errors("pass"), 10);
    }

    #[test]
    fn row_error_without_error_hop_fails_the_run() {
        let g = GraphMeta::new("fatal")
            .step(source("src", 10_000))
            .step(StepMeta::new("pass", "pass").with_config(serde_json::json!({ "fail_every": 7 })))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "pass"))
            .hop(HopMeta::new("pass", "sink"));
        let res = Executor::execute(&g, &cfg(), &factory).unwrap();
        assert_eq!(res.status(), RunStatus::Failed);
        let failed: Vec<_> = res.failed_steps().map(|s| s.step().to_string()).collect();
        assert_eq!(failed, vec!["pass".to_string()]);
        assert!(res.step_errors("pass") >= 1);
        assert!(res.rows_written("src") < 10_000);
    }

    #[test]
    fn init_failure_prevents_any_processing() {
        let g = GraphMeta::new("init")
            .step(source("src", 100))
            .step(StepMeta::new("broken", "failing_init"))
            .hop(HopMeta::new("src", "broken"));
        let res = Executor::execute(&g, &cfg(), &factory).unwrap();
        assert_eq!(res.status(), RunStatus::Failed);
        assert_eq!(res.rows_written("src"), 0);
        let broken = res.steps().iter().find(|s| s.step() == "broken").unwrap();
        assert_eq!(broken.outcome(), StepOutcome::Failed { phase: Phase::Init });
        assert!(broken.messages()[0].contains("missing setting"));
    }

    #[test]
    fn unknown_step_type_is_a_build_error() {
        let g = GraphMeta::new("bad").step(StepMeta::new("x", "nope"));
        assert!(matches!(
            Executor::prepare(&g, &cfg(), &factory),
            Err(ExecError::Build { .. })
        ));
    }

    #[test]
    fn diamond_merges_both_branches() {
        let g = GraphMeta::new("diamond")
            .step(source("src", 1_000))
            .step(StepMeta::new("left", "pass"))
            .step(StepMeta::new("right", "pass"))
            .step(StepMeta::new("join", "sink"))
            .hop(HopMeta::new("src", "left"))
            .hop(HopMeta::new("src", "right"))
            .hop(HopMeta::new("left", "join"))
            .hop(HopMeta::new("right", "join"));
        let res = Executor::execute(&g, &cfg(), &factory).unwrap();
        assert!(res.is_success());
        assert_eq!(res.rows_read("join"), 2_000);
    }

    #[test]
    fn copies_split_and_merge() {
        let g = GraphMeta::new("copies")
            .step(source("src", 1_000))
            .step(StepMeta::new("work", "pass").with_copies(3))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "work"))
            .hop(HopMeta::new("work", "sink"));
        let prepared = Executor::prepare(&g, &cfg(), &factory).unwrap();
        assert_eq!(prepared.unit_count(), 5);
        assert_eq!(prepared.queue_names().len(), 6);
        let res = prepared.execute();
        assert!(res.is_success());
        assert_eq!(res.rows_read("work"), 1_000);
        assert_eq!(res.rows_read("sink"), 1_000);
        assert!(res.steps().iter().filter(|s| s.step() == "work").all(|s| s.rows_read() > 0));
    }

    #[test]
    fn stop_request_ends_an_endless_run() {
        let g = GraphMeta::new("endless")
            .step(source("src", i64::MAX))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "sink"));
        let prepared = Executor::prepare(&g, &cfg(), &factory).unwrap();
        let handle = prepared.handle();
        let runner = thread::spawn(move || prepared.execute());
        while handle.progress().iter().all(|p| p.counters.rows_read == 0) {
            thread::sleep(Duration::from_millis(1));
        }
        handle.request_stop();
        handle.request_stop();
        let res = runner.join().unwrap();
        assert_eq!(res.status(), RunStatus::Stopped);
        assert!(res.steps().iter().all(|s| !s.outcome().is_failed()));
    }

    #[test]
    fn watchdog_stops_after_timeout() {
        let g = GraphMeta::new("slow")
            .step(source("src", i64::MAX))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "sink"));
        let config = EngineConfig {
            run_timeout_ms: Some(50),
            ..cfg()
        };
        let res = Executor::execute(&g, &config, &factory).unwrap();
        assert_eq!(res.status(), RunStatus::Stopped);
    }

    struct Tap(AtomicU64);

    impl RowListener for Tap {
        fn row_written(&self, _schema: &hopflow_core::schema::RowSchema, _row: &Row) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn listeners_see_written_rows() {
        let g = GraphMeta::new("tap")
            .step(source("src", 42))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "sink"));
        let mut prepared = Executor::prepare(&g, &cfg(), &factory).unwrap();
        let tap = Arc::new(Tap(AtomicU64::new(0)));
        prepared.add_row_listener("src", tap.clone()).unwrap();
        assert!(prepared.add_row_listener("missing", tap.clone()).is_err());
        prepared.execute();
        assert_eq!(tap.0.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn failed_units_still_reach_disposed() {
        let g = GraphMeta::new("init")
            .step(source("src", 100))
            .step(StepMeta::new("broken", "failing_init"))
            .hop(HopMeta::new("src", "broken"));
        let prepared = Executor::prepare(&g, &cfg(), &factory).unwrap();
        let handle = prepared.handle();
        let res = prepared.execute();
        assert_eq!(res.status(), RunStatus::Failed);
        for p in handle.progress() {
            assert_eq!(p.state, UnitState::Disposed, "{} not disposed", p.step);
        }
    }

    fn totals(handle: &RunHandle) -> Vec<(u64, u64)> {
        handle
            .progress()
            .iter()
            .map(|p| (p.counters.rows_read, p.counters.rows_written))
            .collect()
    }

    /// Counters once they stop moving.
    fn settled(handle: &RunHandle) -> Vec<(u64, u64)> {
        loop {
            let before = totals(handle);
            thread::sleep(Duration::from_millis(20));
            if totals(handle) == before {
                return before;
            }
        }
    }

    fn endless() -> GraphMeta {
        GraphMeta::new("endless")
            .step(source("src", i64::MAX))
            .step(StepMeta::new("pass", "pass"))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "pass"))
            .hop(HopMeta::new("pass", "sink"))
    }

    #[test]
    fn pause_freezes_progress_until_resumed() {
        let prepared = Executor::prepare(&endless(), &cfg(), &factory).unwrap();
        let handle = prepared.handle();
        let runner = thread::spawn(move || prepared.execute());
        while handle.progress().iter().all(|p| p.counters.rows_read == 0) {
            thread::sleep(Duration::from_millis(1));
        }

        handle.pause();
        assert!(handle.is_paused());
        let frozen = settled(&handle);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(totals(&handle), frozen);
        assert!(handle.progress().iter().any(|p| p.state == UnitState::Paused));

        handle.resume();
        assert!(!handle.is_paused());
        while totals(&handle) == frozen {
            thread::sleep(Duration::from_millis(1));
        }
        handle.request_stop();
        let res = runner.join().unwrap();
        assert_eq!(res.status(), RunStatus::Stopped);
    }

    #[test]
    fn stop_while_paused_terminates() {
        let prepared = Executor::prepare(&endless(), &cfg(), &factory).unwrap();
        let handle = prepared.handle();
        let runner = thread::spawn(move || prepared.execute());
        while handle.progress().iter().all(|p| p.counters.rows_read == 0) {
            thread::sleep(Duration::from_millis(1));
        }
        handle.pause();
        settled(&handle);
        handle.request_stop();
        let res = runner.join().unwrap();
        assert_eq!(res.status(), RunStatus::Stopped);
        assert!(res.steps().iter().all(|s| !s.outcome().is_failed()));
    }

    #[test]
    fn status_follows_unit_outcomes() {
        use StepOutcome::*;
        let failed = Failed { phase: Phase::Run };
        assert_eq!(run_status([Completed, Completed].into_iter(), false), RunStatus::Completed);
        assert_eq!(run_status([Completed, Stopped].into_iter(), false), RunStatus::Stopped);
        assert_eq!(run_status([Stopped, failed].into_iter(), false), RunStatus::Failed);
        assert_eq!(run_status([Completed].into_iter(), true), RunStatus::Failed);
    }

    #[test]
    fn stop_after_every_unit_completed_keeps_completed() {
        let g = GraphMeta::new("late-stop")
            .step(source("src", 10))
            .step(StepMeta::new("sink", "sink"))
            .hop(HopMeta::new("src", "sink"));
        let prepared = Executor::prepare(&g, &cfg(), &factory).unwrap();
        let handle = prepared.handle();
        let res = prepared.execute();
        handle.request_stop();
        assert_eq!(res.status(), RunStatus::Completed);
        assert!(handle.is_stopped());
    }

    #[test]
    fn source_that_finished_stays_completed_when_a_peer_fails() {
        let g = GraphMeta::new("late-fail")
            .step(source("src", 20))
            .step(StepMeta::new("late", "late_fail"))
            .hop(HopMeta::new("src", "late"));
        let res = Executor::execute(&g, &cfg(), &factory).unwrap();
        assert_eq!(res.status(), RunStatus::Failed);
        let src = res.steps().iter().find(|s| s.step() == "src").unwrap();
        assert_eq!(src.outcome(), StepOutcome::Completed);
        assert_eq!(res.rows_read("late"), 20);
    }

    #[test]
    fn error_rows_can_pass_through_a_second_error_hop() {
        let g = GraphMeta::new("chained")
            .step(source("src", 100))
            .step(
                StepMeta::new("first", "pass")
                    .with_config(serde_json::json!({ "fail_every": 10 }))
                    .with_error_handling(ErrorHandlingMeta::default()),
            )
            .step(StepMeta::new("good", "sink"))
            .step(
                StepMeta::new("second", "pass")
                    .with_config(serde_json::json!({ "fail_every": 1 }))
                    .with_error_handling(ErrorHandlingMeta::default()),
            )
            .step(StepMeta::new("bad", "sink"))
            .hop(HopMeta::new("src", "first"))
            .hop(HopMeta::new("first", "good"))
            .hop(HopMeta::error("first", "second"))
            .hop(HopMeta::error("second", "bad"));
        let res = Executor::execute(&g, &cfg(), &factory).unwrap();
        assert_eq!(res.status(), RunStatus::Completed);
        assert_eq!(res.rows_rejected("second"), 10);
        assert_eq!(res.rows_read("bad"), 10);
    }
}

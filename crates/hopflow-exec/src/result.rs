//! Per-unit counters, live progress snapshots and the frozen run result.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use hopflow_core::manifest::RunManifest;

/// Lifecycle state of a unit, observable while the run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    Created,
    Initializing,
    Running,
    /// Waiting at the top of its row loop until the run is resumed.
    Paused,
    Finishing,
    Failed,
    Disposed,
}

impl UnitState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => UnitState::Created,
            1 => UnitState::Initializing,
            2 => UnitState::Running,
            3 => UnitState::Finishing,
            4 => UnitState::Failed,
            6 => UnitState::Paused,
            _ => UnitState::Disposed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            UnitState::Created => 0,
            UnitState::Initializing => 1,
            UnitState::Running => 2,
            UnitState::Finishing => 3,
            UnitState::Failed => 4,
            UnitState::Disposed => 5,
            UnitState::Paused => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init,
    Run,
    Dispose,
}

/// How a unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    Stopped,
    Failed { phase: Phase },
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

/// Live counters of one unit. Written by the unit thread, read by anyone.
#[derive(Debug)]
pub struct StepCounters {
    rows_read: AtomicU64,
    rows_written: AtomicU64,
    rows_input: AtomicU64,
    rows_output: AtomicU64,
    rows_rejected: AtomicU64,
    errors: AtomicU64,
    state: AtomicU8,
}

impl Default for StepCounters {
    fn default() -> Self {
        Self {
            rows_read: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            rows_input: AtomicU64::new(0),
            rows_output: AtomicU64::new(0),
            rows_rejected: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            state: AtomicU8::new(UnitState::Created.as_u8()),
        }
    }
}

impl StepCounters {
    pub(crate) fn inc_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn inc_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn inc_input(&self) {
        self.rows_input.fetch_add(1, Ordering::Relaxed);
    }
    pub(crate) fn inc_output(&self) {
        self.rows_output.fetch_add(1, Ordering::Relaxed);
    }
    /// Returns the new rejected count.
    pub(crate) fn inc_rejected(&self) -> u64 {
        self.rows_rejected.fetch_add(1, Ordering::Relaxed) + 1
    }
    pub(crate) fn inc_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, state: UnitState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn state(&self) -> UnitState {
        UnitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_input: self.rows_input.load(Ordering::Relaxed),
            rows_output: self.rows_output.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_input: u64,
    pub rows_output: u64,
    pub rows_rejected: u64,
    pub errors: u64,
}

/// Live view of one unit, from `RunHandle::progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub step: String,
    pub copy: usize,
    pub state: UnitState,
    pub counters: CounterSnapshot,
}

/// Final record of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    step: String,
    copy: usize,
    outcome: StepOutcome,
    #[serde(flatten)]
    counters: CounterSnapshot,
    messages: Vec<String>,
}

impl StepResult {
    pub(crate) fn new(
        step: String,
        copy: usize,
        outcome: StepOutcome,
        counters: CounterSnapshot,
        messages: Vec<String>,
    ) -> Self {
        Self {
            step,
            copy,
            outcome,
            counters,
            messages,
        }
    }

    pub fn step(&self) -> &str {
        &self.step
    }
    pub fn copy(&self) -> usize {
        self.copy
    }
    pub fn outcome(&self) -> StepOutcome {
        self.outcome
    }
    pub fn counters(&self) -> &CounterSnapshot {
        &self.counters
    }
    pub fn rows_read(&self) -> u64 {
        self.counters.rows_read
    }
    pub fn rows_written(&self) -> u64 {
        self.counters.rows_written
    }
    pub fn rows_rejected(&self) -> u64 {
        self.counters.rows_rejected
    }
    pub fn errors(&self) -> u64 {
        self.counters.errors
    }
    /// Error messages recorded by the unit, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Stopped,
    Failed,
}

/// Frozen summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    manifest: RunManifest,
    status: RunStatus,
    steps: Vec<StepResult>,
}

impl RunResult {
    pub(crate) fn new(manifest: RunManifest, status: RunStatus, steps: Vec<StepResult>) -> Self {
        Self {
            manifest,
            status,
            steps,
        }
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_stopped(&self) -> bool {
        self.status == RunStatus::Stopped
    }

    /// One entry per unit, in graph step order then copy order.
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    fn copies_of<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a StepResult> + 'a {
        self.steps.iter().filter(move |s| s.step == step)
    }

    /// Rows read by all copies of `step`.
    pub fn rows_read(&self, step: &str) -> u64 {
        self.copies_of(step).map(|s| s.counters.rows_read).sum()
    }

    pub fn rows_written(&self, step: &str) -> u64 {
        self.copies_of(step).map(|s| s.counters.rows_written).sum()
    }

    pub fn rows_input(&self, step: &str) -> u64 {
        self.copies_of(step).map(|s| s.counters.rows_input).sum()
    }

    pub fn rows_output(&self, step: &str) -> u64 {
        self.copies_of(step).map(|s| s.counters.rows_output).sum()
    }

    pub fn rows_rejected(&self, step: &str) -> u64 {
        self.copies_of(step).map(|s| s.counters.rows_rejected).sum()
    }

    pub fn step_errors(&self, step: &str) -> u64 {
        self.copies_of(step).map(|s| s.counters.errors).sum()
    }

    /// Total error count across the run.
    pub fn errors(&self) -> u64 {
        self.steps.iter().map(|s| s.counters.errors).sum()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.outcome.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopflow_core::hash::hash_bytes;
    use hopflow_core::manifest::RunId;

    fn step(name: &str, copy: usize, read: u64, errors: u64) -> StepResult {
        StepResult::new(
            name.into(),
            copy,
            StepOutcome::Completed,
            CounterSnapshot {
                rows_read: read,
                errors,
                ..Default::default()
            },
            Vec::new(),
        )
    }

    #[test]
    fn aggregates_across_copies() {
        let manifest = RunManifest::new(RunId::new(), "g", hash_bytes(b"g"), 0);
        let res = RunResult::new(
            manifest,
            RunStatus::Completed,
            vec![step("a", 0, 10, 0), step("b", 0, 4, 1), step("b", 1, 6, 2)],
        );
        assert_eq!(res.rows_read("b"), 10);
        assert_eq!(res.step_errors("b"), 3);
        assert_eq!(res.errors(), 3);
        assert_eq!(res.rows_read("missing"), 0);
        assert!(res.is_success());
    }

    #[test]
    fn counters_track_state() {
        let c = StepCounters::default();
        assert_eq!(c.state(), UnitState::Created);
        c.set_state(UnitState::Running);
        c.inc_read();
        assert_eq!(c.inc_rejected(), 1);
        assert_eq!(c.state(), UnitState::Running);
        assert_eq!(c.snapshot().rows_read, 1);
    }

    #[test]
    fn serializes_flat_counters() {
        let json = serde_json::to_value(step("a", 0, 3, 0)).unwrap();
        assert_eq!(json["rows_read"], 3);
        assert_eq!(json["outcome"]["outcome"], "completed");
    }
}

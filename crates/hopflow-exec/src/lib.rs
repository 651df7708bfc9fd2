#![forbid(unsafe_code)]
//! hopflow-exec: thread-per-unit executor, bounded row queues and run results.
//!
//! Every step copy runs as a `StepUnit` on its own OS thread. Units exchange
//! rows only through `RowQueue`s; a full queue blocks its producer, which is
//! the only flow control. A fatal error in any unit, a caller's stop request
//! or the watchdog cancels every queue so all threads wind down promptly.

pub mod control;
pub mod failpoints;
pub mod listener;
pub mod metrics;
pub mod queue;
pub mod result;
pub mod route;
pub mod runtime;
pub mod unit;
pub mod wiring;

pub use listener::RowListener;
pub use queue::{QueueError, RowQueue};
pub use result::{
    CounterSnapshot, Phase, RunResult, RunStatus, StepOutcome, StepProgress, StepResult, UnitState,
};
pub use runtime::{ExecError, Executor, PreparedRun, RunHandle};

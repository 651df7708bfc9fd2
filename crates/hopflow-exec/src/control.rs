//! Run-wide stop and pause signals, and the start gate units meet at after
//! `init`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::queue::RowQueue;

/// Why a stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Caller asked through a `RunHandle`.
    Requested,
    /// The run exceeded `run_timeout_ms`.
    Timeout,
    /// A unit failed fatally.
    Failure,
}

/// Shared by every unit of one run. Stopping is one-way: the flag is never
/// cleared and every queue of the run is cancelled so blocked units wake up.
/// Pausing holds units at the top of their row loop until `resume` or a stop.
#[derive(Debug)]
pub struct RunControl {
    stopped: AtomicBool,
    failed: AtomicBool,
    paused: AtomicBool,
    // Guards changes to `paused` against a waiter checking it.
    pause_lock: Mutex<()>,
    pause_cv: Condvar,
    queues: Vec<Arc<RowQueue>>,
}

impl RunControl {
    pub fn new(queues: Vec<Arc<RowQueue>>) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            pause_lock: Mutex::new(()),
            pause_cv: Condvar::new(),
            queues,
        }
    }

    /// Idempotent; safe from any thread.
    pub fn request_stop(&self, reason: StopReason) {
        if reason == StopReason::Failure {
            self.failed.store(true, Ordering::Release);
        }
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(?reason, queues = self.queues.len(), "stop requested");
        for q in &self.queues {
            q.cancel();
        }
        // Paused units must see the stop.
        let _guard = self.pause_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.pause_cv.notify_all();
    }

    /// No effect once the run is stopped.
    pub fn pause(&self) {
        let _guard = self.pause_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_stopped() && !self.paused.swap(true, Ordering::AcqRel) {
            tracing::info!("run paused");
        }
    }

    pub fn resume(&self) {
        let _guard = self.pause_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.paused.swap(false, Ordering::AcqRel) {
            tracing::info!("run resumed");
            self.pause_cv.notify_all();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Block while the run is paused and not stopped.
    pub fn wait_while_paused(&self) {
        let mut guard = self.pause_lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.is_paused() && !self.is_stopped() {
            guard = self
                .pause_cv
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// True once any unit reported a fatal failure.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn queues(&self) -> &[Arc<RowQueue>] {
        &self.queues
    }
}

/// Barrier that can also be forced open, so a run whose threads could not
/// all be started does not leave the started ones waiting forever.
#[derive(Debug)]
pub struct StartGate {
    expected: usize,
    state: Mutex<GateState>,
    cv: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    arrived: usize,
    open: bool,
}

impl StartGate {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            state: Mutex::new(GateState::default()),
            cv: Condvar::new(),
        }
    }

    /// Block until every expected unit arrived or the gate was forced open.
    pub fn arrive_and_wait(&self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.arrived += 1;
        if st.arrived >= self.expected {
            st.open = true;
            self.cv.notify_all();
            return;
        }
        while !st.open {
            st = self.cv.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn force_open(&self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.open = true;
        self.cv.notify_all();
    }
}

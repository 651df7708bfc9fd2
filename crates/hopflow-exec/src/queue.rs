//! Bounded single-producer/single-consumer row queue: the data channel of one
//! hop between two step units.
//!
//! Capacity is the only flow control in the engine: a full queue blocks its
//! producer until the consumer drains. Rows come out in the order they went in.
//!
//! Besides rows the queue carries three flags:
//! - `done`: set once by the producer; buffered rows still drain, then `get`
//!   reports end-of-stream forever.
//! - `cancelled`: set by the run's stop mechanism; wakes every blocked `put`
//!   and `get` so no thread stays parked after a stop request.
//! - `detached`: set by a consumer that finished early; later puts are
//!   discarded instead of blocking on a reader that will never come back.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use hopflow_core::id::QueueId;
use hopflow_core::schema::RowSchema;
use hopflow_core::types::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue already marked done")]
    Done,
    #[error("queue cancelled")]
    Cancelled,
    #[error("consumer detached")]
    Detached,
}

/// Result of a bounded wait on `poll`.
#[derive(Debug, PartialEq)]
pub enum Poll {
    Row(Row),
    /// Nothing arrived within the wait; the producer is still active.
    Empty,
    /// Drained and done.
    Done,
    Cancelled,
}

#[derive(Default)]
struct QueueState {
    rows: VecDeque<Row>,
    done: bool,
    cancelled: bool,
    detached: bool,
}

/// Endpoints of the hop copy a queue serves, for naming and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEnds {
    pub from_step: String,
    pub from_copy: usize,
    pub to_step: String,
    pub to_copy: usize,
}

pub struct RowQueue {
    id: QueueId,
    ends: QueueEnds,
    capacity: usize,
    schema: OnceLock<Arc<RowSchema>>,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl RowQueue {
    pub fn new(id: QueueId, ends: QueueEnds, capacity: usize) -> Self {
        Self {
            id,
            ends,
            capacity: capacity.max(1),
            schema: OnceLock::new(),
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Anonymous queue, handy outside a graph (tests, benches).
    pub fn standalone(capacity: usize) -> Self {
        Self::new(
            QueueId::new(0),
            QueueEnds {
                from_step: "producer".into(),
                from_copy: 0,
                to_step: "consumer".into(),
                to_copy: 0,
            },
            capacity,
        )
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn ends(&self) -> &QueueEnds {
        &self.ends
    }

    /// `from.copy - to.copy`, the way hops are named in logs.
    pub fn name(&self) -> String {
        format!(
            "{}.{} - {}.{}",
            self.ends.from_step, self.ends.from_copy, self.ends.to_step, self.ends.to_copy
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a row, blocking while the queue is full.
    pub fn put(&self, row: Row) -> Result<(), QueueError> {
        let mut st = self.lock();
        loop {
            if st.cancelled {
                return Err(QueueError::Cancelled);
            }
            if st.detached {
                return Err(QueueError::Detached);
            }
            if st.done {
                return Err(QueueError::Done);
            }
            if st.rows.len() < self.capacity {
                st.rows.push_back(row);
                self.not_empty.notify_one();
                return Ok(());
            }
            st = self
                .not_full
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Dequeue a row, blocking while the queue is empty and not done.
    /// `None` once drained and done, or after cancellation.
    pub fn get(&self) -> Option<Row> {
        let mut st = self.lock();
        loop {
            if st.cancelled {
                return None;
            }
            if let Some(row) = st.rows.pop_front() {
                self.not_full.notify_one();
                return Some(row);
            }
            if st.done {
                return None;
            }
            st = self
                .not_empty
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like `get`, but waits at most `timeout` for a row to arrive.
    pub fn poll(&self, timeout: Duration) -> Poll {
        let deadline = Instant::now() + timeout;
        let mut st = self.lock();
        loop {
            if st.cancelled {
                return Poll::Cancelled;
            }
            if let Some(row) = st.rows.pop_front() {
                self.not_full.notify_one();
                return Poll::Row(row);
            }
            if st.done {
                return Poll::Done;
            }
            let now = Instant::now();
            if now >= deadline {
                return Poll::Empty;
            }
            st = self
                .not_empty
                .wait_timeout(st, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Producer signals end-of-stream. Returns false if already done.
    pub fn mark_done(&self) -> bool {
        let mut st = self.lock();
        if st.done {
            return false;
        }
        st.done = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    /// Wake everyone and make every later `put`/`get` return immediately.
    pub fn cancel(&self) {
        let mut st = self.lock();
        st.cancelled = true;
        st.rows.clear();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Consumer will read no more; drop what is buffered and refuse new rows.
    pub fn detach_consumer(&self) {
        let mut st = self.lock();
        st.detached = true;
        st.rows.clear();
        self.not_full.notify_all();
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    /// Schema negotiated by the first row put on this queue.
    pub fn schema(&self) -> Option<Arc<RowSchema>> {
        self.schema.get().cloned()
    }

    /// Fix the hop's schema on first use; afterwards require the same shape
    /// (only checked when `strict`).
    pub fn negotiate_schema(&self, schema: &Arc<RowSchema>, strict: bool) -> Result<(), String> {
        let current = self.schema.get_or_init(|| Arc::clone(schema));
        if strict && !Arc::ptr_eq(current, schema) && **current != **schema {
            return Err(format!(
                "row schema on hop '{}' changed: expected {} fields {:?}, got {:?}",
                self.name(),
                current.len(),
                field_names(current),
                field_names(schema)
            ));
        }
        Ok(())
    }
}

fn field_names(schema: &RowSchema) -> Vec<&str> {
    schema.fields().iter().map(|f| f.name.as_str()).collect()
}

impl std::fmt::Debug for RowQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowQueue")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("capacity", &self.capacity)
            .finish()
    }
}

//! Run manifest: identity and provenance of one executor run.
//!
//! Every run gets a fresh id; the graph hash ties it back to the metadata it
//! was built from.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: RunId,

    pub graph_name: String,

    /// Stable hash of the graph metadata used.
    pub graph_hash: Hash256,

    /// Engine version string for provenance.
    pub engine_version: String,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn new(id: RunId, graph_name: impl Into<String>, graph_hash: Hash256, started_ms: u64) -> Self {
        Self {
            id,
            graph_name: graph_name.into(),
            graph_hash,
            engine_version: crate::VERSION.to_string(),
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64) -> Self {
        self.finished_ms = finished_ms.max(self.started_ms);
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_ms - self.started_ms
    }
}

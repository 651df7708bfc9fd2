//! Stable hashing helpers for graph metadata and run manifests.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::graph::GraphMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            let _ = write!(&mut s, "{b:02x}");
        }
        s
    }

    /// First 12 hex chars; enough to tell runs apart in logs.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    Hash256(blake3::hash(bytes).into())
}

/// Hash any serde-serializable value deterministically (via JSON).
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256> {
    let bytes = serde_json::to_vec(v).map_err(|e| Error::Hash(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}

/// Digest of a graph definition. Identical metadata yields identical digests,
/// so manifests of repeated runs of one graph can be grouped.
pub fn hash_graph(graph: &GraphMeta) -> Result<Hash256> {
    hash_serde(graph)
}

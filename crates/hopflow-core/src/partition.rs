//! Partition-key contract used when a step runs in several copies.
//!
//! The executor never computes keys itself; it asks a `Partitioner` which copy
//! a row belongs to and guarantees delivery to exactly that copy.

use crate::error::{Error, Result};
use crate::graph::PartitionSpec;
use crate::schema::RowSchema;
use crate::types::{hash_value, Row};

pub trait Partitioner: Send + Sync {
    /// Return the copy index in `0..partitions` for `row`.
    fn partition(&self, schema: &RowSchema, row: &Row, partitions: usize) -> Result<usize>;
}

/// Hashes the named key fields with blake3; identical keys always land on the
/// same copy.
#[derive(Debug, Clone)]
pub struct HashPartitioner {
    fields: Vec<String>,
}

impl HashPartitioner {
    pub fn new(fields: Vec<String>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::Partition("at least one key field is required".into()));
        }
        Ok(Self { fields })
    }

    pub fn from_spec(spec: &PartitionSpec) -> Result<Self> {
        Self::new(spec.fields.clone())
    }
}

impl Partitioner for HashPartitioner {
    fn partition(&self, schema: &RowSchema, row: &Row, partitions: usize) -> Result<usize> {
        if partitions == 0 {
            return Err(Error::Partition("no partitions to route to".into()));
        }
        let mut hasher = blake3::Hasher::new();
        for name in &self.fields {
            let idx = schema
                .index_of(name)
                .ok_or_else(|| Error::Partition(format!("key field '{name}' not found")))?;
            let value = row.get(idx).ok_or_else(|| {
                Error::Partition(format!("row has no value for key field '{name}'"))
            })?;
            hash_value(value, &mut hasher);
        }
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[0..8]);
        Ok((u64::from_le_bytes(head) % partitions as u64) as usize)
    }
}

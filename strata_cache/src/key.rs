use std::{fmt::Display, sync::Arc};

use sha2::{Digest, Sha256};
use strata_availability::{AvailabilitySnapshot, Interval, PartitionKind, SegmentPartition};

/// The key a result is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The segment partitions of one physical table that a query reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSignature {
    pub table: Arc<str>,
    pub partitions: Vec<SegmentPartition>,
}

impl TableSignature {
    /// Partitions of `table` overlapping `interval` in the given availability snapshot.
    pub fn from_snapshot(
        snapshot: &AvailabilitySnapshot,
        table: &str,
        interval: &Interval,
    ) -> Self {
        Self {
            table: Arc::from(table),
            partitions: snapshot.partitions(table, interval).cloned().collect(),
        }
    }
}

pub(crate) fn query_hash(query: &str) -> String {
    hex::encode(Sha256::digest(query.as_bytes()))
}

pub(crate) fn ttl_key(query: &str) -> CacheKey {
    CacheKey(query_hash(query))
}

pub(crate) fn signature_key(query: &str, signatures: &[TableSignature]) -> CacheKey {
    let mut sorted: Vec<_> = signatures.iter().collect();
    sorted.sort_by(|a, b| a.table.cmp(&b.table));

    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    for signature in sorted {
        hasher.update([0]);
        hasher.update(signature.table.as_bytes());
        let mut partitions: Vec<_> = signature.partitions.iter().collect();
        partitions.sort();
        for p in partitions {
            let kind: u8 = match p.partition.kind {
                PartitionKind::None => 0,
                PartitionKind::Numbered => 1,
                PartitionKind::Other => 2,
            };
            hasher.update([1, kind]);
            hasher.update(p.interval.to_string().as_bytes());
            hasher.update(p.version.as_bytes());
            hasher.update(p.partition.partition_num.to_be_bytes());
            match p.partition.partitions {
                Some(count) => {
                    hasher.update([1]);
                    hasher.update(count.to_be_bytes());
                }
                None => hasher.update([0]),
            }
        }
    }
    CacheKey(hex::encode(hasher.finalize()))
}

/// The backend's token is used verbatim.
pub(crate) fn etag_key(query: &str, token: &str) -> CacheKey {
    CacheKey(format!("{}:{token}", query_hash(query)))
}

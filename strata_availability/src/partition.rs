//! Segment shard specs as reported by the backend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionKind {
    /// The segment is not sharded.
    None,
    Numbered,
    /// Any other shard spec type; only the partition number is kept.
    Other,
}

/// The shard spec of one segment.
///
/// Deserialises from the backend's `shardSpec` object, e.g.
/// `{"type": "numbered", "partitionNum": 0, "partitions": 2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "ShardSpec", into = "ShardSpec")]
pub struct PartitionIdentity {
    pub kind: PartitionKind,
    pub partition_num: u32,
    pub partitions: Option<u32>,
}

impl PartitionIdentity {
    /// An unsharded spec reports `partition_num + 1` partitions, or no count when that would
    /// not fit in a `u32`.
    pub fn unsharded(partition_num: u32) -> Self {
        Self {
            kind: PartitionKind::None,
            partition_num,
            partitions: partition_num.checked_add(1),
        }
    }

    pub fn numbered(partition_num: u32, partitions: u32) -> Self {
        Self {
            kind: PartitionKind::Numbered,
            partition_num,
            partitions: Some(partitions),
        }
    }

    pub fn other(partition_num: u32) -> Self {
        Self {
            kind: PartitionKind::Other,
            partition_num,
            partitions: None,
        }
    }
}

impl Default for PartitionIdentity {
    fn default() -> Self {
        Self::unsharded(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShardSpec {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    partition_num: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partitions: Option<u32>,
}

impl From<ShardSpec> for PartitionIdentity {
    fn from(spec: ShardSpec) -> Self {
        match spec.kind.as_str() {
            "none" => Self::unsharded(spec.partition_num),
            "numbered" => Self {
                kind: PartitionKind::Numbered,
                partition_num: spec.partition_num,
                partitions: spec.partitions.or(spec.partition_num.checked_add(1)),
            },
            _ => Self::other(spec.partition_num),
        }
    }
}

impl From<PartitionIdentity> for ShardSpec {
    fn from(identity: PartitionIdentity) -> Self {
        let (kind, partitions) = match identity.kind {
            PartitionKind::None => ("none", None),
            PartitionKind::Numbered => ("numbered", identity.partitions),
            PartitionKind::Other => ("other", None),
        };
        Self {
            kind: kind.to_string(),
            partition_num: identity.partition_num,
            partitions,
        }
    }
}

//! Which physical tables have data for which columns over which intervals.
//!
//! Availability is read through an immutable [`AvailabilitySnapshot`]. The [`AvailabilityStore`]
//! rebuilds snapshots from a [`MetadataSource`] and swaps them in without disturbing readers.

use std::{path::PathBuf, sync::Arc, time::Duration};

use thiserror::Error;

pub mod availability;
pub mod interval;
pub mod partition;
pub mod source;
pub mod store;

pub use availability::{AvailabilitySnapshot, Coverage, SegmentPartition, TableAvailability};
pub use interval::{Interval, SimplifiedIntervalList};
pub use partition::{PartitionIdentity, PartitionKind};
pub use source::{DynError, FileMetadataSource, MetadataSource, SegmentMetadata};
pub use store::{AvailabilityStore, RefreshConfig, RefreshSummary};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid interval '{interval}': {reason}")]
    InvalidInterval { interval: String, reason: String },

    #[error("failed to read availability metadata from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse availability metadata: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no availability metadata for table {0}")]
    UnknownTable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Metadata for a table could not be obtained; the table is treated as having no data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AvailabilityUnavailable {
    #[error("metadata fetch for {table} timed out after {timeout:?}")]
    Timeout { table: Arc<str>, timeout: Duration },

    #[error("metadata fetch for {table} failed after {attempts} attempts: {reason}")]
    Fetch {
        table: Arc<str>,
        attempts: usize,
        reason: String,
    },
}

impl AvailabilityUnavailable {
    pub fn table(&self) -> &Arc<str> {
        match self {
            Self::Timeout { table, .. } | Self::Fetch { table, .. } => table,
        }
    }
}

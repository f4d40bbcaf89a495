use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Interval, PartitionIdentity};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One segment of a physical table, as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadata {
    pub interval: Interval,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Incomplete segments only contribute partial coverage.
    #[serde(default = "complete_default")]
    pub complete: bool,
    #[serde(default)]
    pub shard_spec: PartitionIdentity,
}

fn complete_default() -> bool {
    true
}

/// Where per-table segment listings come from.
#[async_trait]
pub trait MetadataSource: std::fmt::Debug + Send + Sync + 'static {
    async fn segments(&self, table: &str) -> Result<Vec<SegmentMetadata>, DynError>;
}

/// Reads a JSON object of `{"<table>": [<segment>, ...]}`, re-reading the file on every call.
#[derive(Debug, Clone)]
pub struct FileMetadataSource {
    path: PathBuf,
}

impl FileMetadataSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    async fn segments(&self, table: &str) -> Result<Vec<SegmentMetadata>, DynError> {
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| Error::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut listing: HashMap<String, Vec<SegmentMetadata>> =
            serde_json::from_str(&json).map_err(Error::from)?;
        listing
            .remove(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()).into())
    }
}

//! The column catalog: dimensions, metrics, and the physical and logical tables that expose them.
//!
//! A [`CatalogSnapshot`] is assembled once (usually from a JSON [`definition`]) and never mutated.
//! The shared [`Catalog`] hands out `Arc`s of the current snapshot so that a reader sees one
//! consistent view for the whole of a resolution, even if a refresh replaces the snapshot
//! concurrently.

use std::path::PathBuf;

use thiserror::Error;

pub mod catalog;
pub mod definition;
pub mod dimension;
pub mod filter;
pub mod metric;
pub mod table;

pub use catalog::{Catalog, CatalogBuilder, CatalogSnapshot};
pub use dimension::{Dimension, DimensionField};
pub use filter::{ApiFilter, ApiFilters, FilterOperation};
pub use metric::{
    ArithmeticOperation, LogicalMetric, MakerKind, MetricDictionary, MetricMaker,
    MetricMakerRegistry, MetricQuery,
};
pub use table::{Granularity, LogicalTable, PhysicalTable, TableIdentifier};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse catalog definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read catalog definition {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dimension {dimension} references unknown field set {field_set}")]
    UnknownFieldSet {
        dimension: String,
        field_set: String,
    },

    #[error("dimension {0} is defined more than once")]
    DuplicateDimension(String),

    #[error("unknown dimension {dimension} referenced by {referenced_by}")]
    UnknownDimension {
        dimension: String,
        referenced_by: String,
    },

    #[error("metric {metric} references unknown metric maker {maker}")]
    UnknownMaker { metric: String, maker: String },

    #[error("metric {0} is defined more than once")]
    DuplicateMetric(String),

    #[error("metric {metric} depends on unknown metric {dependency}")]
    UnknownMetricDependency { metric: String, dependency: String },

    #[error("metric {metric} has {actual} dependencies but maker {maker} expects {expected}")]
    MakerArity {
        metric: String,
        maker: String,
        expected: String,
        actual: usize,
    },

    #[error("metric dependency cycle through {0}")]
    MetricCycle(String),

    #[error("unknown metric {0}")]
    UnknownMetric(String),

    #[error("physical table {0} is defined more than once")]
    DuplicatePhysicalTable(String),

    #[error("logical table {logical_table} references unknown physical table {table}")]
    UnknownPhysicalTable {
        logical_table: String,
        table: String,
    },

    #[error("logical table {0} is defined more than once")]
    DuplicateLogicalTable(TableIdentifier),

    #[error("logical table {0} has no candidate physical tables")]
    EmptyLogicalTable(String),

    #[error("invalid filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("invalid granularity '{0}'")]
    InvalidGranularity(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

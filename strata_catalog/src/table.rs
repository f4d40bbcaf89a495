use std::{collections::BTreeSet, fmt::Display, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{Dimension, Error};

/// The time bucketing a table stores or a logical table serves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            _ => Err(Error::InvalidGranularity(s.to_string())),
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete, queryable backend data source with a fixed schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalTable {
    name: Arc<str>,
    granularity: Granularity,
    dimensions: BTreeSet<Arc<Dimension>>,
    dimension_names: BTreeSet<Arc<str>>,
    metric_columns: BTreeSet<Arc<str>>,
}

impl PhysicalTable {
    pub fn new(
        name: impl Into<Arc<str>>,
        granularity: Granularity,
        dimensions: impl IntoIterator<Item = Arc<Dimension>>,
        metric_columns: impl IntoIterator<Item = impl Into<Arc<str>>>,
    ) -> Self {
        let dimensions: BTreeSet<_> = dimensions.into_iter().collect();
        let dimension_names = dimensions
            .iter()
            .map(|d| Arc::clone(d.api_name()))
            .collect();
        Self {
            name: name.into(),
            granularity,
            dimensions,
            dimension_names,
            metric_columns: metric_columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.dimensions
    }

    pub fn dimension_names(&self) -> &BTreeSet<Arc<str>> {
        &self.dimension_names
    }

    pub fn metric_columns(&self) -> &BTreeSet<Arc<str>> {
        &self.metric_columns
    }

    /// Every column of the table: dimension names followed by metric column names.
    pub fn column_names(&self) -> BTreeSet<Arc<str>> {
        self.dimension_names
            .iter()
            .chain(self.metric_columns.iter())
            .cloned()
            .collect()
    }

    pub fn column_count(&self) -> usize {
        self.dimension_names.len() + self.metric_columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.dimension_names.contains(name) || self.metric_columns.contains(name)
    }
}

/// Logical tables are keyed by name and granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableIdentifier {
    pub name: Arc<str>,
    pub granularity: Granularity,
}

impl TableIdentifier {
    pub fn new(name: impl Into<Arc<str>>, granularity: Granularity) -> Self {
        Self {
            name: name.into(),
            granularity,
        }
    }
}

impl Display for TableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.granularity)
    }
}

/// A user-facing table backed by an ordered list of candidate physical tables.
///
/// The candidate order is the configured priority: when several physical tables serve a request
/// equally well, the earlier one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalTable {
    identifier: TableIdentifier,
    candidates: Vec<Arc<str>>,
    dimensions: BTreeSet<Arc<Dimension>>,
}

impl LogicalTable {
    pub fn new(
        name: impl Into<Arc<str>>,
        granularity: Granularity,
        candidates: impl IntoIterator<Item = Arc<PhysicalTable>>,
    ) -> Self {
        let candidates: Vec<_> = candidates.into_iter().collect();
        let dimensions = candidates
            .iter()
            .flat_map(|t| t.dimensions().iter().cloned())
            .collect();
        Self {
            identifier: TableIdentifier::new(name, granularity),
            candidates: candidates.iter().map(|t| Arc::clone(t.name())).collect(),
            dimensions,
        }
    }

    pub fn identifier(&self) -> &TableIdentifier {
        &self.identifier
    }

    pub fn name(&self) -> &Arc<str> {
        &self.identifier.name
    }

    pub fn granularity(&self) -> Granularity {
        self.identifier.granularity
    }

    /// Candidate physical table names in priority order.
    pub fn candidates(&self) -> &[Arc<str>] {
        &self.candidates
    }

    /// Union of the dimensions of every candidate.
    pub fn dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.dimensions
    }
}

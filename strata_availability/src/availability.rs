//! Per-table column coverage and the immutable snapshot the resolver reads.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    AvailabilityUnavailable, Interval, PartitionIdentity, SegmentMetadata, SimplifiedIntervalList,
};

/// How much of an interval a column has data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Coverage {
    None,
    Partial,
    Full,
}

impl Coverage {
    /// Does this coverage satisfy a request, given whether partial data is acceptable?
    pub fn is_usable(self, allow_partial_data: bool) -> bool {
        match self {
            Self::Full => true,
            Self::Partial => allow_partial_data,
            Self::None => false,
        }
    }
}

/// Identity of one segment for cache signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SegmentPartition {
    pub interval: Interval,
    pub version: Arc<str>,
    pub partition: PartitionIdentity,
}

/// Column coverage and segment partitions of one physical table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableAvailability {
    complete: BTreeMap<Arc<str>, SimplifiedIntervalList>,
    partial: BTreeMap<Arc<str>, SimplifiedIntervalList>,
    segments: BTreeSet<SegmentPartition>,
}

impl TableAvailability {
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a SegmentMetadata>) -> Self {
        let mut availability = Self::default();
        for segment in segments {
            let target = if segment.complete {
                &mut availability.complete
            } else {
                &mut availability.partial
            };
            for column in segment.dimensions.iter().chain(segment.metrics.iter()) {
                target
                    .entry(Arc::from(column.as_str()))
                    .or_default()
                    .insert(segment.interval);
            }
            availability.segments.insert(SegmentPartition {
                interval: segment.interval,
                version: Arc::from(segment.version.as_str()),
                partition: segment.shard_spec,
            });
        }
        availability
    }

    /// Mark `column` as fully present over `interval`.
    pub fn with_complete(mut self, column: &str, interval: Interval) -> Self {
        self.complete
            .entry(Arc::from(column))
            .or_default()
            .insert(interval);
        self
    }

    /// Mark `column` as partially present over `interval`.
    pub fn with_partial(mut self, column: &str, interval: Interval) -> Self {
        self.partial
            .entry(Arc::from(column))
            .or_default()
            .insert(interval);
        self
    }

    pub fn with_segment(mut self, segment: SegmentPartition) -> Self {
        self.segments.insert(segment);
        self
    }

    pub fn coverage(&self, column: &str, interval: &Interval) -> Coverage {
        let complete = self.complete.get(column);
        if complete.is_some_and(|list| list.covers(interval)) {
            return Coverage::Full;
        }
        let touches = |list: Option<&SimplifiedIntervalList>| {
            list.is_some_and(|list| list.intersects(interval))
        };
        if touches(complete) || touches(self.partial.get(column)) {
            Coverage::Partial
        } else {
            Coverage::None
        }
    }

    pub fn complete_intervals(&self, column: &str) -> Option<&SimplifiedIntervalList> {
        self.complete.get(column)
    }

    /// Segments overlapping `interval`, in a stable order.
    pub fn partitions(&self, interval: &Interval) -> impl Iterator<Item = &SegmentPartition> {
        self.segments
            .iter()
            .filter(move |s| s.interval.overlaps(interval))
    }

    /// Same complete intervals for every column and same partition identities.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.complete == other.complete && self.segments == other.segments
    }
}

/// The availability of every known physical table at one point in time.
#[derive(Debug, Clone, Default)]
pub struct AvailabilitySnapshot {
    tables: BTreeMap<Arc<str>, Arc<TableAvailability>>,
    unavailable: BTreeMap<Arc<str>, AvailabilityUnavailable>,
}

impl AvailabilitySnapshot {
    pub fn with_table(
        mut self,
        table: impl Into<Arc<str>>,
        availability: TableAvailability,
    ) -> Self {
        let table = table.into();
        self.unavailable.remove(&table);
        self.tables.insert(table, Arc::new(availability));
        self
    }

    pub fn with_unavailable(mut self, error: AvailabilityUnavailable) -> Self {
        let table = Arc::clone(error.table());
        self.tables.remove(&table);
        self.unavailable.insert(table, error);
        self
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableAvailability>> {
        self.tables.get(name)
    }

    /// Coverage of a column; tables that are unknown or unavailable have none.
    pub fn coverage(&self, table: &str, column: &str, interval: &Interval) -> Coverage {
        self.tables
            .get(table)
            .map_or(Coverage::None, |t| t.coverage(column, interval))
    }

    /// Why the table's metadata could not be fetched, if it could not.
    pub fn unavailable(&self, table: &str) -> Option<&AvailabilityUnavailable> {
        self.unavailable.get(table)
    }

    pub fn unavailable_tables(&self) -> impl Iterator<Item = &AvailabilityUnavailable> {
        self.unavailable.values()
    }

    pub fn partitions<'a>(
        &'a self,
        table: &str,
        interval: &'a Interval,
    ) -> impl Iterator<Item = &'a SegmentPartition> + 'a {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(move |t| t.partitions(interval))
    }

    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.tables.len() == other.tables.len()
            && self.unavailable.keys().eq(other.unavailable.keys())
            && self.tables.iter().all(|(name, table)| {
                other
                    .tables
                    .get(name)
                    .is_some_and(|o| table.is_equivalent(o))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn interval(s: &str) -> Interval {
        s.parse().unwrap()
    }

    fn segment(interval_str: &str, version: &str, complete: bool) -> SegmentMetadata {
        SegmentMetadata {
            interval: interval(interval_str),
            version: version.to_string(),
            dimensions: vec!["country".to_string()],
            metrics: vec!["added".to_string()],
            complete,
            shard_spec: PartitionIdentity::numbered(0, 1),
        }
    }

    #[test]
    fn coverage_from_segments() {
        let segments = [
            segment("2024-01-01/2024-01-02", "v1", true),
            segment("2024-01-02/2024-01-03", "v1", true),
            segment("2024-01-03/2024-01-04", "v1", false),
        ];
        let table = TableAvailability::from_segments(&segments);

        assert_eq!(
            table.coverage("added", &interval("2024-01-01/2024-01-03")),
            Coverage::Full
        );
        assert_eq!(
            table.coverage("added", &interval("2024-01-02/2024-01-04")),
            Coverage::Partial
        );
        assert_eq!(
            table.coverage("added", &interval("2024-01-03/2024-01-04")),
            Coverage::Partial
        );
        assert_eq!(
            table.coverage("added", &interval("2024-02-01/2024-02-02")),
            Coverage::None
        );
        assert_eq!(
            table.coverage("deleted", &interval("2024-01-01/2024-01-02")),
            Coverage::None
        );

        assert!(Coverage::Partial.is_usable(true));
        assert!(!Coverage::Partial.is_usable(false));
        assert!(!Coverage::None.is_usable(true));
    }

    #[test]
    fn equivalence_tracks_partitions() {
        let a = TableAvailability::from_segments(&[segment("2024-01-01/2024-01-02", "v1", true)]);
        let b = TableAvailability::from_segments(&[segment("2024-01-01/2024-01-02", "v1", true)]);
        let reprocessed =
            TableAvailability::from_segments(&[segment("2024-01-01/2024-01-02", "v2", true)]);

        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&reprocessed));
        assert_eq!(
            a.coverage("added", &interval("2024-01-01/2024-01-02")),
            reprocessed.coverage("added", &interval("2024-01-01/2024-01-02"))
        );
    }

    #[test]
    fn partitions_overlapping_interval() {
        let table = TableAvailability::from_segments(&[
            segment("2024-01-01/2024-01-02", "v1", true),
            segment("2024-01-05/2024-01-06", "v1", true),
        ]);
        let found: Vec<_> = table
            .partitions(&interval("2024-01-01/2024-01-03"))
            .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].interval, interval("2024-01-01/2024-01-02"));
    }

    #[test]
    fn unavailable_tables_have_no_coverage() {
        let available = TableAvailability::default()
            .with_complete("added", interval("2024-01-01/2024-01-02"));
        let snapshot = AvailabilitySnapshot::default()
            .with_table("t1", available.clone())
            .with_table("t2", available)
            .with_unavailable(AvailabilityUnavailable::Timeout {
                table: Arc::from("t2"),
                timeout: Duration::from_secs(1),
            });

        let i = interval("2024-01-01/2024-01-02");
        assert_eq!(snapshot.coverage("t1", "added", &i), Coverage::Full);
        assert_eq!(snapshot.coverage("t2", "added", &i), Coverage::None);
        assert_eq!(snapshot.coverage("t9", "added", &i), Coverage::None);
        assert!(snapshot.unavailable("t2").is_some());
        assert!(snapshot.unavailable("t1").is_none());
    }
}

//! Immutable catalog snapshots and the shared handle that swaps them.

use std::{collections::BTreeMap, sync::Arc};

use observability_deps::tracing::info;
use parking_lot::RwLock;

use crate::{
    Dimension, Error, Granularity, LogicalMetric, LogicalTable, MetricDictionary, MetricMaker,
    MetricMakerRegistry, PhysicalTable, Result, TableIdentifier,
};

/// A consistent, read-only view of every dimension, metric, and table.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    dimensions: BTreeMap<Arc<str>, Arc<Dimension>>,
    makers: MetricMakerRegistry,
    metrics: MetricDictionary,
    physical_tables: BTreeMap<Arc<str>, Arc<PhysicalTable>>,
    logical_tables: BTreeMap<TableIdentifier, Arc<LogicalTable>>,
}

impl CatalogSnapshot {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn dimension(&self, api_name: &str) -> Option<Arc<Dimension>> {
        self.dimensions.get(api_name).cloned()
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &Arc<Dimension>> {
        self.dimensions.values()
    }

    pub fn makers(&self) -> &MetricMakerRegistry {
        &self.makers
    }

    pub fn metrics(&self) -> &MetricDictionary {
        &self.metrics
    }

    pub fn physical_table(&self, name: &str) -> Option<Arc<PhysicalTable>> {
        self.physical_tables.get(name).cloned()
    }

    pub fn physical_tables(&self) -> impl Iterator<Item = &Arc<PhysicalTable>> {
        self.physical_tables.values()
    }

    pub fn logical_table(&self, name: &str, granularity: Granularity) -> Option<Arc<LogicalTable>> {
        self.logical_tables
            .get(&TableIdentifier::new(name, granularity))
            .cloned()
    }

    pub fn logical_tables(&self) -> impl Iterator<Item = &Arc<LogicalTable>> {
        self.logical_tables.values()
    }
}

/// Assembles a [`CatalogSnapshot`], checking references as it goes.
///
/// Dimensions and makers must be added before the metrics and tables that reference them.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    snapshot: CatalogSnapshot,
}

impl CatalogBuilder {
    pub fn dimension(mut self, dimension: Dimension) -> Result<Self> {
        let name = Arc::clone(dimension.api_name());
        if self.snapshot.dimensions.contains_key(&name) {
            return Err(Error::DuplicateDimension(name.to_string()));
        }
        self.snapshot.dimensions.insert(name, Arc::new(dimension));
        Ok(self)
    }

    /// Register a maker; a name that is already registered keeps its first definition.
    pub fn maker(mut self, maker: MetricMaker) -> Self {
        self.snapshot.makers.add(maker);
        self
    }

    /// Add a metric built by the named maker.
    pub fn metric(
        mut self,
        api_name: &str,
        maker: &str,
        build: impl FnOnce(LogicalMetric) -> LogicalMetric,
    ) -> Result<Self> {
        let maker = self
            .snapshot
            .makers
            .find_by_name(maker)
            .cloned()
            .ok_or_else(|| Error::UnknownMaker {
                metric: api_name.to_string(),
                maker: maker.to_string(),
            })?;
        self.snapshot
            .metrics
            .insert(build(LogicalMetric::new(api_name, maker)))?;
        Ok(self)
    }

    pub fn physical_table<'a>(
        mut self,
        name: &str,
        granularity: Granularity,
        dimensions: impl IntoIterator<Item = &'a str>,
        metric_columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        if self.snapshot.physical_tables.contains_key(name) {
            return Err(Error::DuplicatePhysicalTable(name.to_string()));
        }
        let dimensions = self.lookup_dimensions(dimensions, name)?;
        let table = PhysicalTable::new(name, granularity, dimensions, metric_columns);
        self.snapshot
            .physical_tables
            .insert(Arc::clone(table.name()), Arc::new(table));
        Ok(self)
    }

    pub fn logical_table<'a>(
        mut self,
        name: &str,
        granularity: Granularity,
        candidates: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let identifier = TableIdentifier::new(name, granularity);
        if self.snapshot.logical_tables.contains_key(&identifier) {
            return Err(Error::DuplicateLogicalTable(identifier));
        }
        let candidates = candidates
            .into_iter()
            .map(|table| {
                self.snapshot.physical_table(table).ok_or_else(|| {
                    Error::UnknownPhysicalTable {
                        logical_table: name.to_string(),
                        table: table.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if candidates.is_empty() {
            return Err(Error::EmptyLogicalTable(name.to_string()));
        }
        let table = LogicalTable::new(name, granularity, candidates);
        self.snapshot
            .logical_tables
            .insert(identifier, Arc::new(table));
        Ok(self)
    }

    pub(crate) fn lookup_dimensions<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        referenced_by: &str,
    ) -> Result<Vec<Arc<Dimension>>> {
        names
            .into_iter()
            .map(|d| {
                self.snapshot
                    .dimension(d)
                    .ok_or_else(|| Error::UnknownDimension {
                        dimension: d.to_string(),
                        referenced_by: referenced_by.to_string(),
                    })
            })
            .collect()
    }

    /// Validate metric dependencies and finish the snapshot.
    pub fn build(self) -> Result<CatalogSnapshot> {
        self.snapshot.metrics.validate()?;
        Ok(self.snapshot)
    }
}

/// Process-wide handle on the current [`CatalogSnapshot`].
///
/// Readers take an `Arc` of the snapshot once and use it for the rest of their work; replacing
/// the snapshot never disturbs a reader that already holds one.
#[derive(Debug)]
pub struct Catalog {
    inner: RwLock<Arc<CatalogSnapshot>>,
}

impl Catalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.inner.read())
    }

    /// Install a new snapshot, returning the one it replaced.
    pub fn replace(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        info!(
            dimensions = snapshot.dimensions.len(),
            metrics = snapshot.metrics.len(),
            physical_tables = snapshot.physical_tables.len(),
            logical_tables = snapshot.logical_tables.len(),
            "replacing catalog snapshot"
        );
        std::mem::replace(&mut *self.inner.write(), Arc::new(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::MakerKind;

    fn builder() -> CatalogBuilder {
        CatalogSnapshot::builder()
            .dimension(Dimension::new("country"))
            .unwrap()
            .dimension(Dimension::new("page"))
            .unwrap()
            .maker(MetricMaker::new("longSum", MakerKind::LongSum))
    }

    #[test]
    fn build_snapshot() {
        let snapshot = builder()
            .metric("added", "LONGSUM", |m| m)
            .unwrap()
            .physical_table("t1", Granularity::Hour, ["country", "page"], ["added"])
            .unwrap()
            .logical_table("wiki", Granularity::Day, ["t1"])
            .unwrap()
            .build()
            .unwrap();

        assert!(snapshot.logical_table("wiki", Granularity::Day).is_some());
        assert!(snapshot.logical_table("wiki", Granularity::Hour).is_none());
        assert_eq!(
            snapshot.physical_table("t1").unwrap().dimensions().len(),
            2
        );
        assert_eq!(snapshot.metrics().len(), 1);
    }

    #[test]
    fn reference_errors() {
        assert_matches!(
            builder().dimension(Dimension::new("page")),
            Err(Error::DuplicateDimension(_))
        );
        assert_matches!(
            builder().metric("added", "doubleSum", |m| m),
            Err(Error::UnknownMaker { .. })
        );
        assert_matches!(
            builder().physical_table("t1", Granularity::Hour, ["region"], ["added"]),
            Err(Error::UnknownDimension { dimension, .. }) if dimension == "region"
        );
        assert_matches!(
            builder().logical_table("wiki", Granularity::Day, ["t9"]),
            Err(Error::UnknownPhysicalTable { .. })
        );
        assert_matches!(
            builder().logical_table("wiki", Granularity::Day, Vec::<&str>::new()),
            Err(Error::EmptyLogicalTable(_))
        );
    }

    #[test]
    fn duplicate_logical_table() {
        let builder = builder()
            .physical_table("a", Granularity::Hour, ["country"], ["added"])
            .unwrap()
            .physical_table("b", Granularity::Hour, ["page"], ["added"])
            .unwrap()
            .logical_table("wiki", Granularity::Day, ["a"])
            .unwrap();

        assert_matches!(
            builder.logical_table("wiki", Granularity::Day, ["b"]),
            Err(Error::DuplicateLogicalTable(id))
                if id == TableIdentifier::new("wiki", Granularity::Day)
        );
    }

    #[test]
    fn replace_keeps_old_readers_consistent() {
        let catalog = Catalog::new(
            builder()
                .physical_table("t1", Granularity::Hour, ["country"], ["added"])
                .unwrap()
                .build()
                .unwrap(),
        );
        let before = catalog.snapshot();

        let old = catalog.replace(CatalogSnapshot::default());
        assert!(Arc::ptr_eq(&before, &old));
        assert!(before.physical_table("t1").is_some());
        assert!(catalog.snapshot().physical_table("t1").is_none());
    }
}

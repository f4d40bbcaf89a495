use std::{collections::BTreeSet, sync::Arc};

use strata_availability::Interval;
use strata_catalog::{ApiFilter, ApiFilters, CatalogSnapshot, Dimension, Granularity};
use strata_endpoint::RequestContext;
use strata_resolver::DataApiRequest;

use crate::Error;

/// A logical query against one logical table.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub table: Arc<str>,
    pub granularity: Granularity,
    pub interval: Interval,
    pub dimensions: BTreeSet<Arc<Dimension>>,
    pub filters: ApiFilters,
    /// Logical metric names.
    pub metrics: BTreeSet<Arc<str>>,
    pub context: RequestContext,
}

impl QueryRequest {
    pub fn new(table: impl Into<Arc<str>>, granularity: Granularity, interval: Interval) -> Self {
        Self {
            table: table.into(),
            granularity,
            interval,
            dimensions: BTreeSet::new(),
            filters: ApiFilters::new(),
            metrics: BTreeSet::new(),
            context: RequestContext::default(),
        }
    }

    /// Group by the named dimensions, looked up in `catalog`.
    pub fn with_dimensions<'a>(
        mut self,
        catalog: &CatalogSnapshot,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, Error> {
        for name in names {
            let dimension = catalog
                .dimension(name)
                .ok_or_else(|| Error::UnknownDimension(name.to_string()))?;
            self.dimensions.insert(dimension);
        }
        Ok(self)
    }

    /// Add filters written as `dimension|field-operation[values]`.
    pub fn with_filters<'a>(
        mut self,
        catalog: &CatalogSnapshot,
        filters: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, Error> {
        for text in filters {
            self.filters
                .insert(ApiFilter::parse(text, |name| catalog.dimension(name))?);
        }
        Ok(self)
    }

    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = impl Into<Arc<str>>>) -> Self {
        self.metrics.extend(metrics.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

impl DataApiRequest for QueryRequest {
    fn dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.dimensions
    }

    fn filters(&self) -> &ApiFilters {
        &self.filters
    }
}

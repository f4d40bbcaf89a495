//! The columns, filters and metrics a single request needs.

use std::{
    collections::BTreeSet,
    hash::{Hash, Hasher},
    sync::Arc,
};

use strata_catalog::{ApiFilters, Dimension, MetricQuery, PhysicalTable};

use crate::ValidationError;

/// The parsed data request, as far as table resolution is concerned.
pub trait DataApiRequest {
    /// Dimensions the request groups by.
    fn dimensions(&self) -> &BTreeSet<Arc<Dimension>>;

    fn filters(&self) -> &ApiFilters;

    fn filter_dimensions(&self) -> BTreeSet<Arc<Dimension>> {
        self.filters().dimensions().cloned().collect()
    }
}

/// The metric side of a request.
pub trait TemplateQuery {
    /// Dimensions required by the requested metrics' formulas.
    fn metric_dimensions(&self) -> &BTreeSet<Arc<Dimension>>;

    /// Metric columns the request reads, including transitive dependencies.
    fn dependent_field_names(&self) -> &BTreeSet<Arc<str>>;
}

impl TemplateQuery for MetricQuery {
    fn metric_dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        MetricQuery::metric_dimensions(self)
    }

    fn dependent_field_names(&self) -> &BTreeSet<Arc<str>> {
        self.dependent_fields()
    }
}

/// What a request needs from a physical table.
///
/// The derived sets are computed once when the constraint is built. Narrowing a constraint
/// produces a new value; equality and hashing consider only the direct fields.
#[derive(Debug, Clone)]
pub struct Constraint {
    request_dimensions: BTreeSet<Arc<Dimension>>,
    filter_dimensions: BTreeSet<Arc<Dimension>>,
    metric_dimensions: BTreeSet<Arc<Dimension>>,
    metric_names: BTreeSet<Arc<str>>,
    filters: ApiFilters,

    all_dimensions: BTreeSet<Arc<Dimension>>,
    all_dimension_names: BTreeSet<Arc<str>>,
    all_column_names: BTreeSet<Arc<str>>,
}

impl Constraint {
    pub fn builder() -> ConstraintBuilder {
        ConstraintBuilder::default()
    }

    pub fn from_request(request: &impl DataApiRequest, template: &impl TemplateQuery) -> Self {
        Self::new(
            request.dimensions().clone(),
            request.filter_dimensions(),
            template.metric_dimensions().clone(),
            template.dependent_field_names().clone(),
            request.filters().clone(),
        )
    }

    /// A constraint asking for everything `table` has and nothing else.
    pub fn unconstrained(table: &PhysicalTable) -> Self {
        Self::new(
            table.dimensions().clone(),
            BTreeSet::new(),
            BTreeSet::new(),
            table.metric_columns().clone(),
            ApiFilters::new(),
        )
    }

    fn new(
        request_dimensions: BTreeSet<Arc<Dimension>>,
        filter_dimensions: BTreeSet<Arc<Dimension>>,
        metric_dimensions: BTreeSet<Arc<Dimension>>,
        metric_names: BTreeSet<Arc<str>>,
        filters: ApiFilters,
    ) -> Self {
        let all_dimensions: BTreeSet<_> = request_dimensions
            .iter()
            .chain(&filter_dimensions)
            .chain(&metric_dimensions)
            .cloned()
            .collect();
        let all_dimension_names: BTreeSet<_> = all_dimensions
            .iter()
            .map(|d| Arc::clone(d.api_name()))
            .collect();
        let all_column_names = all_dimension_names
            .iter()
            .chain(&metric_names)
            .cloned()
            .collect();
        Self {
            request_dimensions,
            filter_dimensions,
            metric_dimensions,
            metric_names,
            filters,
            all_dimensions,
            all_dimension_names,
            all_column_names,
        }
    }

    /// The same request restricted to the metrics in `names`.
    pub fn with_metric_intersection(&self, names: &BTreeSet<Arc<str>>) -> Self {
        Self::new(
            self.request_dimensions.clone(),
            self.filter_dimensions.clone(),
            self.metric_dimensions.clone(),
            self.metric_names.intersection(names).cloned().collect(),
            self.filters.clone(),
        )
    }

    pub fn request_dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.request_dimensions
    }

    pub fn filter_dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.filter_dimensions
    }

    pub fn metric_dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.metric_dimensions
    }

    pub fn metric_names(&self) -> &BTreeSet<Arc<str>> {
        &self.metric_names
    }

    pub fn filters(&self) -> &ApiFilters {
        &self.filters
    }

    pub fn all_dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.all_dimensions
    }

    pub fn all_dimension_names(&self) -> &BTreeSet<Arc<str>> {
        &self.all_dimension_names
    }

    pub fn all_column_names(&self) -> &BTreeSet<Arc<str>> {
        &self.all_column_names
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.request_dimensions == other.request_dimensions
            && self.filter_dimensions == other.filter_dimensions
            && self.metric_dimensions == other.metric_dimensions
            && self.metric_names == other.metric_names
            && self.filters == other.filters
    }
}

impl Eq for Constraint {}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.request_dimensions.hash(state);
        self.filter_dimensions.hash(state);
        self.metric_dimensions.hash(state);
        self.metric_names.hash(state);
        self.filters.hash(state);
    }
}

/// Builds a [`Constraint`]; every collection must be supplied, even if empty.
#[derive(Debug, Default)]
pub struct ConstraintBuilder {
    request_dimensions: Option<BTreeSet<Arc<Dimension>>>,
    filter_dimensions: Option<BTreeSet<Arc<Dimension>>>,
    metric_dimensions: Option<BTreeSet<Arc<Dimension>>>,
    metric_names: Option<BTreeSet<Arc<str>>>,
    filters: Option<ApiFilters>,
}

impl ConstraintBuilder {
    pub fn request_dimensions(
        mut self,
        dimensions: impl IntoIterator<Item = Arc<Dimension>>,
    ) -> Self {
        self.request_dimensions = Some(dimensions.into_iter().collect());
        self
    }

    pub fn filter_dimensions(
        mut self,
        dimensions: impl IntoIterator<Item = Arc<Dimension>>,
    ) -> Self {
        self.filter_dimensions = Some(dimensions.into_iter().collect());
        self
    }

    pub fn metric_dimensions(
        mut self,
        dimensions: impl IntoIterator<Item = Arc<Dimension>>,
    ) -> Self {
        self.metric_dimensions = Some(dimensions.into_iter().collect());
        self
    }

    pub fn metric_names(mut self, names: impl IntoIterator<Item = impl Into<Arc<str>>>) -> Self {
        self.metric_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn filters(mut self, filters: ApiFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn build(self) -> Result<Constraint, ValidationError> {
        let missing = |field| ValidationError { field };
        Ok(Constraint::new(
            self.request_dimensions
                .ok_or_else(|| missing("request_dimensions"))?,
            self.filter_dimensions
                .ok_or_else(|| missing("filter_dimensions"))?,
            self.metric_dimensions
                .ok_or_else(|| missing("metric_dimensions"))?,
            self.metric_names.ok_or_else(|| missing("metric_names"))?,
            self.filters.ok_or_else(|| missing("filters"))?,
        ))
    }
}

//! Metric makers and logical metrics.
//!
//! A metric maker names a computation (`longSum`, `arithmetic`, ...) together with its fixed,
//! explicitly typed parameters. Makers are registered by name once, when the catalog is loaded,
//! and logical metrics refer to them by that name.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{Dimension, Error, Granularity, Result};

const DEFAULT_SKETCH_SIZE: u32 = 16384;

fn default_sketch_size() -> u32 {
    DEFAULT_SKETCH_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOperation {
    Plus,
    Minus,
    Multiply,
    Divide,
}

/// The kind of computation a maker builds, with the parameters that kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MakerKind {
    LongSum,
    DoubleSum,
    LongMin,
    LongMax,
    Count,
    Arithmetic {
        operation: ArithmeticOperation,
    },
    ThetaSketch {
        #[serde(default = "default_sketch_size")]
        size: u32,
    },
    #[serde(rename_all = "camelCase")]
    TimeAverage {
        inner_grain: Granularity,
    },
    Constant {
        value: f64,
    },
}

/// How many dependent metrics a maker accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

impl MakerKind {
    /// Aggregating makers read a physical metric column directly.
    pub fn reads_column(&self) -> bool {
        matches!(
            self,
            Self::LongSum
                | Self::DoubleSum
                | Self::LongMin
                | Self::LongMax
                | Self::Count
                | Self::ThetaSketch { .. }
        )
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Arithmetic { .. } => Arity::AtLeast(2),
            Self::TimeAverage { .. } => Arity::Exactly(1),
            _ => Arity::Exactly(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMaker {
    pub name: Arc<str>,
    #[serde(flatten)]
    pub kind: MakerKind,
}

impl MetricMaker {
    pub fn new(name: impl Into<Arc<str>>, kind: MakerKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Makers keyed by case-insensitive name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricMakerRegistry {
    makers: BTreeMap<String, Arc<MetricMaker>>,
}

impl MetricMakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `maker` under its name. Returns `false`, keeping the existing maker, if the name
    /// is already taken.
    pub fn add(&mut self, maker: MetricMaker) -> bool {
        let key = maker.name.to_lowercase();
        if self.makers.contains_key(&key) {
            return false;
        }
        self.makers.insert(key, Arc::new(maker));
        true
    }

    /// Register every maker, returning `true` if any was added.
    pub fn add_all(&mut self, makers: impl IntoIterator<Item = MetricMaker>) -> bool {
        makers
            .into_iter()
            .fold(false, |changed, maker| self.add(maker) || changed)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<MetricMaker>> {
        self.makers.get(&name.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MetricMaker>> {
        self.makers.values()
    }

    pub fn len(&self) -> usize {
        self.makers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.makers.is_empty()
    }
}

/// A metric exposed through the API.
///
/// Aggregating metrics read one physical column (their own API name unless `column` says
/// otherwise); derived metrics are computed from other logical metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalMetric {
    api_name: Arc<str>,
    maker: Arc<MetricMaker>,
    column: Option<Arc<str>>,
    dependencies: Vec<Arc<str>>,
    dimensions: BTreeSet<Arc<Dimension>>,
}

impl LogicalMetric {
    pub fn new(api_name: impl Into<Arc<str>>, maker: Arc<MetricMaker>) -> Self {
        Self {
            api_name: api_name.into(),
            maker,
            column: None,
            dependencies: Vec::new(),
            dimensions: BTreeSet::new(),
        }
    }

    pub fn with_column(mut self, column: impl Into<Arc<str>>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_dependencies(
        mut self,
        dependencies: impl IntoIterator<Item = impl Into<Arc<str>>>,
    ) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Dimensions the metric's formula needs, e.g. the dimension a distinct count runs over.
    pub fn with_dimensions(mut self, dimensions: impl IntoIterator<Item = Arc<Dimension>>) -> Self {
        self.dimensions = dimensions.into_iter().collect();
        self
    }

    pub fn api_name(&self) -> &Arc<str> {
        &self.api_name
    }

    pub fn maker(&self) -> &Arc<MetricMaker> {
        &self.maker
    }

    pub fn dependencies(&self) -> &[Arc<str>] {
        &self.dependencies
    }

    pub fn dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.dimensions
    }

    /// The physical column read by this metric, if its maker reads one.
    pub fn column(&self) -> Option<&Arc<str>> {
        self.maker
            .kind
            .reads_column()
            .then(|| self.column.as_ref().unwrap_or(&self.api_name))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricDictionary {
    metrics: BTreeMap<Arc<str>, Arc<LogicalMetric>>,
}

impl MetricDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric, checking its dependency count against its maker.
    ///
    /// Dependencies are checked by [`MetricDictionary::validate`] once every metric is present.
    pub fn insert(&mut self, metric: LogicalMetric) -> Result<()> {
        let arity = metric.maker.kind.arity();
        if !arity.accepts(metric.dependencies.len()) {
            return Err(Error::MakerArity {
                metric: metric.api_name.to_string(),
                maker: metric.maker.name.to_string(),
                expected: arity.to_string(),
                actual: metric.dependencies.len(),
            });
        }
        if self.metrics.contains_key(&metric.api_name) {
            return Err(Error::DuplicateMetric(metric.api_name.to_string()));
        }
        self.metrics
            .insert(Arc::clone(&metric.api_name), Arc::new(metric));
        Ok(())
    }

    /// Check that every dependency exists and that there are no dependency cycles.
    pub fn validate(&self) -> Result<()> {
        for metric in self.metrics.values() {
            for dependency in &metric.dependencies {
                if !self.metrics.contains_key(dependency) {
                    return Err(Error::UnknownMetricDependency {
                        metric: metric.api_name.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }
        self.dependencies_of(self.metrics.keys().map(AsRef::as_ref))
            .map(|_| ())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<LogicalMetric>> {
        self.metrics.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LogicalMetric>> {
        self.metrics.values()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Expand logical metrics into the physical columns and dimensions they need, following
    /// derived metrics transitively.
    pub fn dependencies_of<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(BTreeSet<Arc<str>>, BTreeSet<Arc<Dimension>>)> {
        let mut columns = BTreeSet::new();
        let mut dimensions = BTreeSet::new();
        let mut done = BTreeSet::new();
        for name in names {
            let mut path = Vec::new();
            self.visit(name, &mut path, &mut done, &mut columns, &mut dimensions)?;
        }
        Ok((columns, dimensions))
    }

    fn visit(
        &self,
        name: &str,
        path: &mut Vec<Arc<str>>,
        done: &mut BTreeSet<Arc<str>>,
        columns: &mut BTreeSet<Arc<str>>,
        dimensions: &mut BTreeSet<Arc<Dimension>>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if path.iter().any(|p| p.as_ref() == name) {
            return Err(Error::MetricCycle(name.to_string()));
        }
        let metric = self
            .metrics
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;

        path.push(Arc::clone(&metric.api_name));
        for dependency in &metric.dependencies {
            self.visit(dependency, path, done, columns, dimensions)?;
        }
        path.pop();

        if let Some(column) = metric.column() {
            columns.insert(Arc::clone(column));
        }
        dimensions.extend(metric.dimensions.iter().cloned());
        done.insert(Arc::clone(&metric.api_name));
        Ok(())
    }
}

/// The metric side of a request: requested logical metrics expanded into the physical columns
/// and dimensions they depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    metrics: BTreeSet<Arc<str>>,
    dependent_fields: BTreeSet<Arc<str>>,
    metric_dimensions: BTreeSet<Arc<Dimension>>,
}

impl MetricQuery {
    pub fn new<'a>(
        dictionary: &MetricDictionary,
        metrics: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let metrics: BTreeSet<Arc<str>> = metrics.into_iter().map(Into::into).collect();
        let (dependent_fields, metric_dimensions) =
            dictionary.dependencies_of(metrics.iter().map(AsRef::as_ref))?;
        Ok(Self {
            metrics,
            dependent_fields,
            metric_dimensions,
        })
    }

    /// The logical metrics as requested.
    pub fn metrics(&self) -> &BTreeSet<Arc<str>> {
        &self.metrics
    }

    /// Physical metric columns the request reads.
    pub fn dependent_fields(&self) -> &BTreeSet<Arc<str>> {
        &self.dependent_fields
    }

    pub fn metric_dimensions(&self) -> &BTreeSet<Arc<Dimension>> {
        &self.metric_dimensions
    }
}

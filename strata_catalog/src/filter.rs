//! API filters of the form `dimension|field-operation[value,value]`.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{Dimension, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperation {
    In,
    NotIn,
    Eq,
    StartsWith,
    Contains,
}

impl FilterOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Eq => "eq",
            Self::StartsWith => "startswith",
            Self::Contains => "contains",
        }
    }
}

impl FromStr for FilterOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" => Ok(Self::In),
            "notin" => Ok(Self::NotIn),
            "eq" => Ok(Self::Eq),
            "startswith" => Ok(Self::StartsWith),
            "contains" => Ok(Self::Contains),
            other => Err(format!("unknown filter operation '{other}'")),
        }
    }
}

impl Display for FilterOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single restriction on one field of one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApiFilter {
    dimension: Arc<Dimension>,
    field: Arc<str>,
    operation: FilterOperation,
    values: BTreeSet<Arc<str>>,
}

impl ApiFilter {
    pub fn new(
        dimension: Arc<Dimension>,
        field: impl Into<Arc<str>>,
        operation: FilterOperation,
        values: impl IntoIterator<Item = impl Into<Arc<str>>>,
    ) -> Self {
        Self {
            dimension,
            field: field.into(),
            operation,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `dimension|field-operation[v1,v2]`, looking the dimension up by API name.
    pub fn parse(
        text: &str,
        lookup: impl Fn(&str) -> Option<Arc<Dimension>>,
    ) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidFilter {
            filter: text.to_string(),
            reason: reason.to_string(),
        };

        let (dimension_name, rest) = text
            .split_once('|')
            .ok_or_else(|| invalid("missing '|' after dimension name"))?;
        let (head, values) = rest
            .strip_suffix(']')
            .and_then(|r| r.split_once('['))
            .ok_or_else(|| invalid("values must be enclosed in [ ]"))?;
        let (field, operation) = head
            .rsplit_once('-')
            .ok_or_else(|| invalid("expected field-operation"))?;

        let dimension = lookup(dimension_name.trim())
            .ok_or_else(|| invalid(&format!("unknown dimension {dimension_name}")))?;
        let field = field.trim();
        if !dimension.fields().is_empty() && !dimension.has_field(field) {
            return Err(invalid(&format!(
                "dimension {dimension} has no field {field}"
            )));
        }
        let operation = operation.trim().parse::<FilterOperation>().map_err(|e| invalid(&e))?;

        let values: BTreeSet<Arc<str>> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Into::into)
            .collect();
        if values.is_empty() {
            return Err(invalid("at least one value is required"));
        }

        Ok(Self {
            dimension,
            field: field.into(),
            operation,
            values,
        })
    }

    pub fn dimension(&self) -> &Arc<Dimension> {
        &self.dimension
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operation(&self) -> FilterOperation {
        self.operation
    }

    pub fn values(&self) -> &BTreeSet<Arc<str>> {
        &self.values
    }
}

impl Display for ApiFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self
            .values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join(",");
        write!(
            f,
            "{}|{}-{}[{}]",
            self.dimension, self.field, self.operation, values
        )
    }
}

/// A request's filters, grouped by the dimension they restrict.
///
/// Filters on the same dimension are alternatives (OR); filters on different dimensions must all
/// hold (AND).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ApiFilters(BTreeMap<Arc<Dimension>, BTreeSet<ApiFilter>>);

impl ApiFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: ApiFilter) -> Self {
        self.insert(filter);
        self
    }

    pub fn insert(&mut self, filter: ApiFilter) {
        self.0
            .entry(Arc::clone(&filter.dimension))
            .or_default()
            .insert(filter);
    }

    pub fn get(&self, dimension: &Dimension) -> Option<&BTreeSet<ApiFilter>> {
        self.0.get(dimension)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &Arc<Dimension>> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Dimension>, &BTreeSet<ApiFilter>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of filtered dimensions.
    pub fn len(&self) -> usize {
        self.0.len()
    }}

impl FromIterator<ApiFilter> for ApiFilters {
    fn from_iter<T: IntoIterator<Item = ApiFilter>>(iter: T) -> Self {
        let mut filters = Self::new();
        for filter in iter {
            filters.insert(filter);
        }
        filters
    }
}

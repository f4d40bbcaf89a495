use std::{
    cmp::Ordering,
    fmt::Display,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::Serialize;

/// A single field of a dimension's row, e.g. `id` or `desc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionField {
    pub name: Arc<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Arc<str>>,
}

impl DimensionField {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A groupable, filterable column exposed through the API.
///
/// Identity is the API name alone: two dimensions with the same API name are the same dimension
/// even if their descriptive attributes differ. Dimensions are owned by the catalog and shared by
/// `Arc` with tables and constraints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    api_name: Arc<str>,
    long_name: Arc<str>,
    description: Arc<str>,
    category: Arc<str>,
    fields: Vec<DimensionField>,
}

impl Dimension {
    pub const DEFAULT_CATEGORY: &'static str = "General";

    /// Create a dimension whose long name and description default to the API name.
    pub fn new(api_name: impl Into<Arc<str>>) -> Self {
        let api_name = api_name.into();
        Self {
            long_name: Arc::clone(&api_name),
            description: Arc::clone(&api_name),
            category: Self::DEFAULT_CATEGORY.into(),
            fields: Vec::new(),
            api_name,
        }
    }

    pub fn with_long_name(mut self, long_name: impl Into<Arc<str>>) -> Self {
        self.long_name = long_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<Arc<str>>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = DimensionField>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn api_name(&self) -> &Arc<str> {
        &self.api_name
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Ordered field list of this dimension.
    pub fn fields(&self) -> &[DimensionField] {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name.as_ref() == name)
    }
}

impl PartialEq for Dimension {
    fn eq(&self, other: &Self) -> bool {
        self.api_name == other.api_name
    }
}

impl Eq for Dimension {}

impl Hash for Dimension {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.api_name.hash(state)
    }
}

impl PartialOrd for Dimension {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dimension {
    fn cmp(&self, other: &Self) -> Ordering {
        self.api_name.cmp(&other.api_name)
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.api_name)
    }
}

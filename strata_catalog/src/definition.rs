//! Serde definitions of the JSON catalog file and their conversion into a [`CatalogSnapshot`].
//!
//! ```json
//! {
//!   "fieldSets": { "default": [{ "name": "id" }, { "name": "desc" }] },
//!   "dimensions": [{ "apiName": "country", "fields": "default" }],
//!   "makers": [{ "name": "longSum", "type": "longSum" }],
//!   "metrics": [{ "apiName": "added", "maker": "longSum" }],
//!   "physicalTables": [
//!     { "name": "wiki_hourly", "granularity": "hour", "dimensions": ["country"], "metrics": ["added"] }
//!   ],
//!   "logicalTables": [
//!     { "name": "wiki", "granularities": ["hour", "day"], "physicalTables": ["wiki_hourly"] }
//!   ]
//! }
//! ```

use std::{collections::HashMap, path::Path};

use observability_deps::tracing::debug;
use serde::Deserialize;

use crate::{
    CatalogSnapshot, Dimension, DimensionField, Error, Granularity, MetricMaker, Result,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogDefinition {
    pub field_sets: HashMap<String, Vec<FieldDefinition>>,
    pub dimensions: Vec<DimensionDefinition>,
    pub makers: Vec<MetricMaker>,
    pub metrics: Vec<MetricDefinition>,
    pub physical_tables: Vec<PhysicalTableDefinition>,
    pub logical_tables: Vec<LogicalTableDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionDefinition {
    pub api_name: String,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Name of a field set in [`CatalogDefinition::field_sets`].
    #[serde(default)]
    pub fields: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub api_name: String,
    pub maker: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalTableDefinition {
    pub name: String,
    pub granularity: Granularity,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalTableDefinition {
    pub name: String,
    pub granularities: Vec<Granularity>,
    pub physical_tables: Vec<String>,
}

impl CatalogDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Resolve every reference and produce the snapshot.
    pub fn build(self) -> Result<CatalogSnapshot> {
        let mut builder = CatalogSnapshot::builder();

        for def in self.dimensions {
            let mut dimension = Dimension::new(def.api_name.as_str());
            if let Some(long_name) = def.long_name {
                dimension = dimension.with_long_name(long_name);
            }
            if let Some(description) = def.description {
                dimension = dimension.with_description(description);
            }
            if let Some(category) = def.category {
                dimension = dimension.with_category(category);
            }
            if let Some(field_set) = def.fields {
                let fields = self.field_sets.get(&field_set).ok_or_else(|| {
                    Error::UnknownFieldSet {
                        dimension: def.api_name.clone(),
                        field_set: field_set.clone(),
                    }
                })?;
                dimension = dimension.with_fields(fields.iter().map(|f| {
                    let field = DimensionField::new(f.name.as_str());
                    match &f.description {
                        Some(d) => field.with_description(d.as_str()),
                        None => field,
                    }
                }));
            }
            builder = builder.dimension(dimension)?;
        }

        for maker in self.makers {
            builder = builder.maker(maker);
        }

        for def in self.metrics {
            let dimensions = builder.lookup_dimensions(
                def.dimensions.iter().map(String::as_str),
                &def.api_name,
            )?;
            builder = builder.metric(&def.api_name, &def.maker, |metric| {
                let metric = metric
                    .with_dependencies(def.dependencies.iter().map(String::as_str))
                    .with_dimensions(dimensions);
                match &def.column {
                    Some(column) => metric.with_column(column.as_str()),
                    None => metric,
                }
            })?;
        }

        for def in self.physical_tables {
            builder = builder.physical_table(
                &def.name,
                def.granularity,
                def.dimensions.iter().map(String::as_str),
                def.metrics.iter().map(String::as_str),
            )?;
        }

        for def in self.logical_tables {
            for granularity in def.granularities {
                builder = builder.logical_table(
                    &def.name,
                    granularity,
                    def.physical_tables.iter().map(String::as_str),
                )?;
            }
        }

        let snapshot = builder.build()?;
        debug!(
            dimensions = snapshot.dimensions().count(),
            metrics = snapshot.metrics().len(),
            "built catalog snapshot from definition"
        );
        Ok(snapshot)
    }
}

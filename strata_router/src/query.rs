//! Backend query text for one resolved table.
//!
//! The text is also what cache keys are computed from, so rendering is deterministic: every
//! collection is emitted in sorted order.

use serde_json::{Value, json};
use strata_availability::Interval;
use strata_catalog::{ApiFilters, Granularity, PhysicalTable};
use strata_resolver::Constraint;

use crate::Error;

fn filter_json(filters: &ApiFilters) -> Value {
    if filters.is_empty() {
        return Value::Null;
    }
    let fields: Vec<_> = filters
        .iter()
        .map(|(dimension, filters)| {
            let alternatives: Vec<_> = filters
                .iter()
                .map(|f| {
                    json!({
                        "dimension": dimension.api_name().as_ref(),
                        "field": f.field(),
                        "operation": f.operation().as_str(),
                        "values": f.values().iter().map(AsRef::as_ref).collect::<Vec<&str>>(),
                    })
                })
                .collect();
            json!({ "type": "or", "fields": alternatives })
        })
        .collect();
    json!({ "type": "and", "fields": fields })
}

/// Render the group-by query that answers `constraint` from `table`.
pub fn render(
    table: &PhysicalTable,
    granularity: Granularity,
    interval: &Interval,
    constraint: &Constraint,
) -> Result<String, Error> {
    let query = json!({
        "queryType": "groupBy",
        "dataSource": table.name().as_ref(),
        "granularity": granularity.as_str(),
        "intervals": [interval.to_string()],
        "dimensions": constraint
            .request_dimensions()
            .iter()
            .map(|d| d.api_name().as_ref())
            .collect::<Vec<&str>>(),
        "filter": filter_json(constraint.filters()),
        "aggregations": constraint
            .metric_names()
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>(),
    });
    Ok(serde_json::to_string(&query)?)
}

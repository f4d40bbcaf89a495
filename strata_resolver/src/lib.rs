//! Turning a request into the set of physical tables that can answer it.

use std::{collections::BTreeSet, sync::Arc};

use itertools::Itertools;
use strata_availability::AvailabilityUnavailable;
use strata_catalog::TableIdentifier;
use thiserror::Error;

pub mod constraint;
pub mod resolver;

pub use constraint::{Constraint, ConstraintBuilder, DataApiRequest, TemplateQuery};
pub use resolver::{Resolution, ResolvedTable, TableResolver};

/// A constraint was built without one of its collections.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid constraint: {field} is required")]
pub struct ValidationError {
    pub field: &'static str,
}

/// No set of physical tables can answer the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "no physical tables of {table} answer the request (missing dimensions: [{}], missing metrics: [{}]){}",
    .missing_dimensions.iter().join(", "),
    .missing_metrics.iter().join(", "),
    causes(.unavailable)
)]
pub struct TableResolutionError {
    pub table: TableIdentifier,
    pub missing_dimensions: BTreeSet<Arc<str>>,
    pub missing_metrics: BTreeSet<Arc<str>>,
    /// Candidates excluded because their availability could not be fetched.
    pub unavailable: Vec<AvailabilityUnavailable>,
}

fn causes(unavailable: &[AvailabilityUnavailable]) -> String {
    if unavailable.is_empty() {
        String::new()
    } else {
        format!("; {}", unavailable.iter().join("; "))
    }
}

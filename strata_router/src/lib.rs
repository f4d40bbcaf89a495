//! Turns a logical query into backend queries: resolve physical tables, render each query,
//! consult the response cache and pick an endpoint.

use std::sync::Arc;

use strata_catalog::TableIdentifier;
use thiserror::Error;

pub mod backend;
pub mod query;
pub mod request;
pub mod router;

pub use backend::{BackendExecutor, BackendResponse, DynError};
pub use request::QueryRequest;
pub use router::{PlannedQuery, QueryPlan, QueryResult, QueryRouter};

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown logical table {0}")]
    UnknownTable(TableIdentifier),

    #[error("unknown dimension {0}")]
    UnknownDimension(String),

    #[error(transparent)]
    Catalog(#[from] strata_catalog::Error),

    #[error(transparent)]
    Resolution(#[from] strata_resolver::TableResolutionError),

    #[error(transparent)]
    NoEndpoint(#[from] strata_endpoint::NoEndpointAvailable),

    #[error("failed to render backend query: {0}")]
    Render(#[from] serde_json::Error),

    #[error("backend {endpoint} failed: {source}")]
    Backend { endpoint: Arc<str>, source: DynError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

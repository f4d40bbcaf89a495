use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use iox_time::SystemProvider;
use strata_availability::{AvailabilityStore, FileMetadataSource, Interval};
use strata_cache::{MemoryResultStore, ResponseCache};
use strata_catalog::{Catalog, CatalogSnapshot, Granularity, definition::CatalogDefinition};
use strata_clap_blocks::{
    availability::AvailabilityConfig, cache::CacheConfig, endpoint::EndpointConfig,
    resolver::ResolverConfig,
};
use strata_endpoint::{Endpoint, EndpointRole, RequestContext};
use strata_router::{BackendExecutor, BackendResponse, DynError, QueryRequest, QueryRouter};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("failed to load catalog: {0}")]
    Catalog(#[from] strata_catalog::Error),

    #[error(transparent)]
    Router(#[from] strata_router::Error),

    #[error("logical table {table} has no granularity {granularity}")]
    UnknownTable {
        table: String,
        granularity: Granularity,
    },

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn load_catalog(path: &Path) -> Result<CatalogSnapshot> {
    Ok(CatalogDefinition::from_path(path)?.build()?)
}

/// Catalog and segment metadata inputs.
#[derive(Debug, clap::Parser)]
pub(crate) struct SourceConfig {
    /// Catalog definition file (JSON)
    #[clap(long = "catalog", env = "STRATA_CATALOG")]
    pub(crate) catalog: PathBuf,

    /// Segment metadata file (JSON object of physical table name to segment list)
    #[clap(long = "availability", env = "STRATA_AVAILABILITY")]
    pub(crate) availability: PathBuf,

    #[clap(flatten)]
    pub(crate) availability_config: AvailabilityConfig,
}

/// Everything needed to route one logical query.
#[derive(Debug, clap::Parser)]
pub(crate) struct RouterConfig {
    #[clap(flatten)]
    pub(crate) logging_config: trogging::cli::LoggingConfig,

    #[clap(flatten)]
    pub(crate) sources: SourceConfig,

    #[clap(flatten)]
    pub(crate) cache_config: CacheConfig,

    #[clap(flatten)]
    pub(crate) resolver_config: ResolverConfig,

    #[clap(flatten)]
    pub(crate) endpoint_config: EndpointConfig,

    /// Logical table to query
    #[clap(long = "table")]
    pub(crate) table: String,

    /// Granularity of the logical table
    #[clap(long = "granularity", default_value = "day")]
    pub(crate) granularity: Granularity,

    /// Query interval as `start/end`, each side a date or RFC 3339 timestamp
    #[clap(long = "interval")]
    pub(crate) interval: Interval,

    /// Dimension to group by; may be repeated
    #[clap(long = "dimension", short = 'd', action = clap::ArgAction::Append)]
    pub(crate) dimensions: Vec<String>,

    /// Logical metric to compute; may be repeated
    #[clap(long = "metric", short = 'm', action = clap::ArgAction::Append)]
    pub(crate) metrics: Vec<String>,

    /// Filter as `dimension|field-operation[value,...]`; may be repeated
    #[clap(long = "filter", action = clap::ArgAction::Append)]
    pub(crate) filters: Vec<String>,

    /// Endpoint role the query must be sent to
    #[clap(long = "role")]
    pub(crate) role: Option<EndpointRole>,

    /// Priority hint carried with the query
    #[clap(long = "priority", default_value = "0", allow_hyphen_values = true)]
    pub(crate) priority: i32,

    /// Tenant the query is made on behalf of
    #[clap(long = "tenant")]
    pub(crate) tenant: Option<String>,
}

impl RouterConfig {
    /// Load the catalog, fetch availability for the physical tables behind the requested logical
    /// table, and build the router and request.
    pub(crate) async fn build(
        &self,
        executor: Arc<dyn BackendExecutor>,
    ) -> Result<(QueryRouter, QueryRequest)> {
        let snapshot = load_catalog(&self.sources.catalog)?;
        let logical = snapshot
            .logical_table(&self.table, self.granularity)
            .ok_or_else(|| Error::UnknownTable {
                table: self.table.clone(),
                granularity: self.granularity,
            })?;

        let mut context = RequestContext::default().with_priority(self.priority);
        if let Some(role) = self.role {
            context = context.with_role(role);
        }
        if let Some(tenant) = &self.tenant {
            context = context.with_tenant(tenant.as_str());
        }
        let request = QueryRequest::new(self.table.as_str(), self.granularity, self.interval)
            .with_dimensions(&snapshot, self.dimensions.iter().map(String::as_str))?
            .with_filters(&snapshot, self.filters.iter().map(String::as_str))?
            .with_metrics(self.metrics.iter().map(String::as_str))
            .with_context(context);

        let availability = Arc::new(AvailabilityStore::new(
            self.sources.availability_config.refresh_config(),
        ));
        let source = FileMetadataSource::new(&self.sources.availability);
        availability.refresh(&source, logical.candidates()).await;

        let cache = ResponseCache::new(
            self.cache_config.strategy(),
            Arc::new(
                MemoryResultStore::new(Arc::new(SystemProvider::new()))
                    .with_capacity(self.cache_config.max_entries),
            ),
        );
        let router = QueryRouter::new(
            Arc::new(Catalog::new(snapshot)),
            availability,
            self.resolver_config.resolver(),
            cache,
            Arc::new(self.endpoint_config.selector()),
            executor,
        );
        Ok((router, request))
    }
}

/// Answers backend queries from `<dir>/<dataSource>.json`.
#[derive(Debug)]
pub(crate) struct ReplayExecutor {
    dir: PathBuf,
}

impl ReplayExecutor {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl BackendExecutor for ReplayExecutor {
    async fn execute(
        &self,
        endpoint: &Endpoint,
        query: &str,
    ) -> Result<BackendResponse, DynError> {
        let query: serde_json::Value = serde_json::from_str(query)?;
        let source = query["dataSource"]
            .as_str()
            .ok_or("query has no dataSource")?;
        let path = self.dir.join(format!("{source}.json"));
        let body = tokio::fs::read(&path).await.map_err(|e| {
            format!(
                "no recorded response for {} at {}: {e}",
                endpoint.name,
                path.display()
            )
        })?;
        Ok(BackendResponse {
            body: Bytes::from(body),
            etag: None,
        })
    }
}

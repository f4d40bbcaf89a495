//! Planning and executing a logical query.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use observability_deps::tracing::{debug, info, warn};
use serde::Serialize;
use strata_availability::{AvailabilityStore, Interval};
use strata_cache::{
    CacheKey, CacheLookup, CacheRequest, CacheStrategy, ResponseCache, TableSignature,
};
use strata_catalog::{Catalog, MetricQuery, PhysicalTable, TableIdentifier};
use strata_endpoint::{Endpoint, EndpointSelector};
use strata_resolver::{Constraint, TableResolver};

use crate::{BackendExecutor, Error, QueryRequest, query::render};

/// One backend query of a plan.
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub table: Arc<PhysicalTable>,
    pub constraint: Constraint,
    pub query: String,
    pub signatures: Vec<TableSignature>,
    /// Key for strategies that can compute one without asking the backend.
    pub cache_key: Option<CacheKey>,
    pub endpoint: Arc<Endpoint>,
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub table: TableIdentifier,
    pub interval: Interval,
    pub split: bool,
    pub queries: Vec<PlannedQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub table: Arc<str>,
    pub endpoint: Arc<str>,
    pub cached: bool,
    #[serde(skip)]
    pub body: Bytes,
}

/// Routes logical queries to backend endpoints.
///
/// Every call reads one catalog snapshot and one availability snapshot, so a concurrent refresh
/// never changes the tables a call is working with.
#[derive(Debug)]
pub struct QueryRouter {
    catalog: Arc<Catalog>,
    availability: Arc<AvailabilityStore>,
    resolver: TableResolver,
    cache: ResponseCache,
    selector: Arc<dyn EndpointSelector>,
    executor: Arc<dyn BackendExecutor>,
}

impl QueryRouter {
    pub fn new(
        catalog: Arc<Catalog>,
        availability: Arc<AvailabilityStore>,
        resolver: TableResolver,
        cache: ResponseCache,
        selector: Arc<dyn EndpointSelector>,
        executor: Arc<dyn BackendExecutor>,
    ) -> Self {
        Self {
            catalog,
            availability,
            resolver,
            cache,
            selector,
            executor,
        }
    }

    /// Resolve `request` and choose a cache key and endpoint for each backend query.
    pub async fn plan(&self, request: &QueryRequest) -> Result<QueryPlan, Error> {
        let catalog = self.catalog.snapshot();
        let availability = self.availability.snapshot();

        let logical = catalog
            .logical_table(&request.table, request.granularity)
            .ok_or_else(|| {
                Error::UnknownTable(TableIdentifier::new(
                    Arc::clone(&request.table),
                    request.granularity,
                ))
            })?;
        let metrics = MetricQuery::new(
            catalog.metrics(),
            request.metrics.iter().map(AsRef::as_ref),
        )?;
        let constraint = Constraint::from_request(request, &metrics);
        let resolution = self.resolver.resolve(
            &catalog,
            &availability,
            &logical,
            &constraint,
            &request.interval,
        )?;

        let mut queries = Vec::with_capacity(resolution.tables().len());
        for resolved in resolution.tables() {
            let query = render(
                &resolved.table,
                logical.granularity(),
                &request.interval,
                &resolved.constraint,
            )?;
            let signatures = vec![TableSignature::from_snapshot(
                &availability,
                resolved.table.name(),
                &request.interval,
            )];
            let cache_key = self.cache.key(&CacheRequest {
                query: &query,
                signatures: &signatures,
                etag: None,
            });
            let endpoint = self.selector.select(&request.context, &query).await?;
            queries.push(PlannedQuery {
                table: Arc::clone(&resolved.table),
                constraint: resolved.constraint.clone(),
                query,
                signatures,
                cache_key,
                endpoint,
            });
        }

        debug!(
            table = %logical.identifier(),
            queries = queries.len(),
            split = resolution.is_split(),
            "planned query"
        );
        Ok(QueryPlan {
            table: logical.identifier().clone(),
            interval: request.interval,
            split: resolution.is_split(),
            queries,
        })
    }

    /// Plan `request` and run every backend query, answering from the cache where allowed.
    ///
    /// Results of a split plan are returned side by side in plan order.
    pub async fn execute(&self, request: &QueryRequest) -> Result<Vec<QueryResult>, Error> {
        let plan = self.plan(request).await?;
        let results = try_join_all(plan.queries.iter().map(|q| self.run(q))).await?;
        info!(
            table = %plan.table,
            queries = results.len(),
            cached = results.iter().filter(|r| r.cached).count(),
            "executed query"
        );
        Ok(results)
    }

    async fn run(&self, planned: &PlannedQuery) -> Result<QueryResult, Error> {
        let etag = match self.cache.strategy() {
            CacheStrategy::ETag => self.version_token(planned).await,
            _ => None,
        };
        let lookup = self
            .cache
            .lookup(&CacheRequest {
                query: &planned.query,
                signatures: &planned.signatures,
                etag: etag.as_deref(),
            })
            .await;

        let result = |body, cached| QueryResult {
            table: Arc::clone(planned.table.name()),
            endpoint: Arc::clone(&planned.endpoint.name),
            cached,
            body,
        };
        let key = match lookup {
            CacheLookup::Hit(body) => return Ok(result(body, true)),
            CacheLookup::Miss { key } => key,
        };

        let response = self
            .executor
            .execute(&planned.endpoint, &planned.query)
            .await
            .map_err(|source| Error::Backend {
                endpoint: Arc::clone(&planned.endpoint.name),
                source,
            })?;

        // A token-keyed result is stored under the token the response carries.
        let key = match (self.cache.strategy(), &response.etag) {
            (CacheStrategy::ETag, Some(token)) => self.cache.key(&CacheRequest {
                query: &planned.query,
                signatures: &planned.signatures,
                etag: Some(token.as_str()),
            }),
            _ => key,
        };
        if let Some(key) = key {
            // detached
            drop(self.cache.populate(key, response.body.clone()));
        }
        Ok(result(response.body, false))
    }

    async fn version_token(&self, planned: &PlannedQuery) -> Option<String> {
        match self
            .executor
            .version_token(&planned.endpoint, &planned.query)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    endpoint = %planned.endpoint.name,
                    error = %e,
                    "version token unavailable, bypassing cache"
                );
                None
            }
        }
    }
}

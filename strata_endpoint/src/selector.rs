//! Picking the endpoint that receives a query.

use std::{
    fmt::Debug,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use observability_deps::tracing::{debug, warn};

use crate::{DynError, Endpoint, Error, NoEndpointAvailable, RequestContext};

#[async_trait]
pub trait EndpointSelector: Debug + Send + Sync + 'static {
    /// Choose exactly one endpoint for `query`.
    async fn select(
        &self,
        context: &RequestContext,
        query: &str,
    ) -> Result<Arc<Endpoint>, NoEndpointAvailable>;
}

/// A liveness probe for an endpoint.
#[async_trait]
pub trait HealthCheck: Debug + Send + Sync + 'static {
    async fn check(&self, endpoint: &Endpoint) -> Result<(), DynError>;
}

/// The order in which endpoints are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Always the configured order.
    #[default]
    Static,
    /// Start from the next endpoint on every selection.
    RoundRobin,
}

impl FromStr for SelectionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "round-robin" => Ok(Self::RoundRobin),
            _ => Err(Error::InvalidPolicy(s.to_string())),
        }
    }
}

/// An [`EndpointSelector`] over a fixed endpoint list.
///
/// Candidates are the endpoints with the role the request requires, ordered by the policy. With
/// a health check configured, each candidate is probed in turn and the first to answer within
/// the timeout is chosen.
#[derive(Debug)]
pub struct PolicySelector {
    endpoints: Vec<Arc<Endpoint>>,
    policy: SelectionPolicy,
    next: AtomicUsize,
    health: Option<(Arc<dyn HealthCheck>, Duration)>,
}

impl PolicySelector {
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>, policy: SelectionPolicy) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(Arc::new).collect(),
            policy,
            next: AtomicUsize::new(0),
            health: None,
        }
    }

    pub fn with_health_check(mut self, check: Arc<dyn HealthCheck>, timeout: Duration) -> Self {
        self.health = Some((check, timeout));
        self
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    fn candidates(&self, context: &RequestContext) -> Vec<&Arc<Endpoint>> {
        let mut candidates: Vec<_> = self
            .endpoints
            .iter()
            .filter(|e| context.role.is_none_or(|role| e.role == role))
            .collect();
        if self.policy == SelectionPolicy::RoundRobin && !candidates.is_empty() {
            let start = self.next.fetch_add(1, Ordering::Relaxed) % candidates.len();
            candidates.rotate_left(start);
        }
        candidates
    }

    async fn is_healthy(&self, endpoint: &Endpoint) -> bool {
        let Some((check, timeout)) = &self.health else {
            return true;
        };
        match tokio::time::timeout(*timeout, check.check(endpoint)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(endpoint = %endpoint.name, error = %e, "endpoint health check failed");
                false
            }
            Err(_) => {
                warn!(endpoint = %endpoint.name, ?timeout, "endpoint health check timed out");
                false
            }
        }
    }
}

#[async_trait]
impl EndpointSelector for PolicySelector {
    async fn select(
        &self,
        context: &RequestContext,
        _query: &str,
    ) -> Result<Arc<Endpoint>, NoEndpointAvailable> {
        let candidates = self.candidates(context);
        if candidates.is_empty() {
            return Err(NoEndpointAvailable::NoneConfigured { role: context.role });
        }
        for endpoint in &candidates {
            if self.is_healthy(endpoint).await {
                debug!(
                    endpoint = %endpoint.name,
                    priority = context.priority,
                    tenant = context.tenant.as_deref(),
                    "selected endpoint"
                );
                return Ok(Arc::clone(endpoint));
            }
        }
        Err(NoEndpointAvailable::AllUnhealthy {
            role: context.role,
            tried: candidates.len(),
        })
    }
}

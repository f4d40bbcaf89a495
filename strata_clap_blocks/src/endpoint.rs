use std::{sync::Arc, time::Duration};

use strata_endpoint::{Endpoint, PolicySelector, SelectionPolicy, TcpHealthCheck};

/// The backend endpoints queries are sent to.
#[derive(Debug, Clone, clap::Parser)]
pub struct EndpointConfig {
    /// A backend endpoint as `name=url[@role]`, where role is `broker` (the default) or
    /// `coordinator`. May be given more than once.
    #[clap(
        long = "backend-endpoint",
        env = "STRATA_BACKEND_ENDPOINTS",
        value_delimiter = ',',
        action = clap::ArgAction::Append
    )]
    pub endpoints: Vec<Endpoint>,

    /// Order in which endpoints are tried: `static` or `round-robin`.
    #[clap(
        long = "endpoint-policy",
        env = "STRATA_ENDPOINT_POLICY",
        default_value = "static",
        action
    )]
    pub policy: SelectionPolicy,

    /// Probe each endpoint with a TCP connect before selecting it, waiting at most this long.
    #[clap(
        long = "health-check-timeout",
        env = "STRATA_HEALTH_CHECK_TIMEOUT",
        value_parser = humantime::parse_duration,
        action
    )]
    pub health_check_timeout: Option<Duration>,
}

impl EndpointConfig {
    pub fn selector(&self) -> PolicySelector {
        let selector = PolicySelector::new(self.endpoints.iter().cloned(), self.policy);
        match self.health_check_timeout {
            Some(timeout) => selector.with_health_check(Arc::new(TcpHealthCheck), timeout),
            None => selector,
        }
    }
}

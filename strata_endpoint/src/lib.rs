//! Routing backend queries to one of the configured endpoints.

use thiserror::Error;

pub mod endpoint;
pub mod health;
pub mod selector;

pub use endpoint::{Endpoint, EndpointRole, RequestContext};
pub use health::TcpHealthCheck;
pub use selector::{EndpointSelector, HealthCheck, PolicySelector, SelectionPolicy};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid endpoint role '{0}', expected broker or coordinator")]
    InvalidRole(String),

    #[error("invalid selection policy '{0}', expected static or round-robin")]
    InvalidPolicy(String),
}

/// No configured endpoint can take the query.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum NoEndpointAvailable {
    #[error("no backend endpoint configured{}", role_suffix(.role))]
    NoneConfigured { role: Option<EndpointRole> },

    #[error("all {tried} backend endpoints{} are unhealthy", role_suffix(.role))]
    AllUnhealthy {
        role: Option<EndpointRole>,
        tried: usize,
    },
}

fn role_suffix(role: &Option<EndpointRole>) -> String {
    role.map(|r| format!(" with role {r}")).unwrap_or_default()
}

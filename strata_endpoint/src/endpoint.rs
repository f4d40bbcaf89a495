use std::{fmt::Display, str::FromStr, sync::Arc};

use serde::Serialize;
use url::Url;

use crate::Error;

/// What a backend endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    /// Answers queries.
    #[default]
    Broker,
    /// Answers queries and segment metadata.
    Coordinator,
}

impl FromStr for EndpointRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "broker" => Ok(Self::Broker),
            "coordinator" => Ok(Self::Coordinator),
            _ => Err(Error::InvalidRole(s.to_string())),
        }
    }
}

impl Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Broker => "broker",
            Self::Coordinator => "coordinator",
        })
    }
}

/// A configured backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub name: Arc<str>,
    pub url: Url,
    pub role: EndpointRole,
}

impl Endpoint {
    pub fn new(name: impl Into<Arc<str>>, url: Url, role: EndpointRole) -> Self {
        Self {
            name: name.into(),
            url,
            role,
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Parses `name=url[@role]`; the role defaults to broker.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| Error::InvalidEndpoint {
                endpoint: s.to_string(),
                reason: "expected name=url[@role]".to_string(),
            })?;

        // A URL may carry userinfo, so only a trailing `@<role>` is taken as the role.
        let (url, role) = match rest.rsplit_once('@') {
            Some((url, role)) => match role.parse() {
                Ok(role) => (url, role),
                Err(_) => (rest, EndpointRole::default()),
            },
            None => (rest, EndpointRole::default()),
        };
        let url = Url::parse(url).map_err(|e| Error::InvalidEndpoint {
            endpoint: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(name, url, role))
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}@{}", self.name, self.url, self.role)
    }
}

/// Hints about the request being routed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Only endpoints with this role may serve the request.
    pub role: Option<EndpointRole>,
    pub priority: i32,
    pub tenant: Option<Arc<str>>,
}

impl RequestContext {
    pub fn with_role(mut self, role: EndpointRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<Arc<str>>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }
}

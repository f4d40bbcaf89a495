use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::{DynError, Endpoint, HealthCheck};

/// Considers an endpoint healthy when a TCP connection to its host and port succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpHealthCheck;

#[async_trait]
impl HealthCheck for TcpHealthCheck {
    async fn check(&self, endpoint: &Endpoint) -> Result<(), DynError> {
        let host = endpoint
            .url
            .host_str()
            .ok_or_else(|| format!("endpoint {} has no host", endpoint.name))?;
        let port = endpoint
            .url
            .port_or_known_default()
            .ok_or_else(|| format!("endpoint {} has no port", endpoint.name))?;
        TcpStream::connect((host, port)).await?;
        Ok(())
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use strata_endpoint::Endpoint;

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub body: Bytes,
    /// Opaque version token for the result, if the backend supplies one.
    pub etag: Option<String>,
}

/// Sends rendered queries to a backend endpoint.
#[async_trait]
pub trait BackendExecutor: std::fmt::Debug + Send + Sync + 'static {
    async fn execute(&self, endpoint: &Endpoint, query: &str) -> Result<BackendResponse, DynError>;

    /// The backend's current version token for `query`, used to look up results cached by
    /// token. Backends without tokens return `None`.
    async fn version_token(
        &self,
        _endpoint: &Endpoint,
        _query: &str,
    ) -> Result<Option<String>, DynError> {
        Ok(None)
    }
}

//! Cache key policies.

use std::time::Duration;

use crate::{
    CacheKey, TableSignature,
    key::{etag_key, signature_key, ttl_key},
};

/// Everything a strategy may use to compute a key.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheRequest<'a> {
    /// The backend query text.
    pub query: &'a str,
    /// Partitions of every physical table the query reads.
    pub signatures: &'a [TableSignature],
    /// Version token supplied by the backend.
    pub etag: Option<&'a str>,
}

/// Exactly one strategy is active for a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    NoCache,
    /// Keyed on the query text; entries expire after the duration even if the data was
    /// reprocessed in the meantime.
    Ttl(Duration),
    /// Keyed on the query text and the partitions it reads, so reprocessing yields a new key.
    /// Entries under the old key are never read again but are not evicted either.
    LocalSignature,
    /// Keyed on the query text and the backend's version token.
    ETag,
}

impl CacheStrategy {
    /// The key for `request`, or `None` when the result must not be cached.
    ///
    /// Computing a key never contacts the backend.
    pub fn key(&self, request: &CacheRequest<'_>) -> Option<CacheKey> {
        match self {
            Self::NoCache => None,
            Self::Ttl(_) => Some(ttl_key(request.query)),
            Self::LocalSignature => Some(signature_key(request.query, request.signatures)),
            Self::ETag => request.etag.map(|token| etag_key(request.query, token)),
        }
    }

    /// How long stored entries stay valid; `None` for no expiry.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Ttl(ttl) => Some(*ttl),
            Self::NoCache | Self::LocalSignature | Self::ETag => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoCache)
    }
}

use std::sync::Arc;

use bytes::Bytes;
use observability_deps::tracing::{debug, warn};
use tokio::task::JoinHandle;

use crate::{CacheKey, CacheRequest, CacheStrategy, ResultStore};

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The stored result, unchanged.
    Hit(Bytes),
    /// Execute the query; on success store the result under `key`, if there is one.
    Miss { key: Option<CacheKey> },
}

/// A [`CacheStrategy`] in front of a [`ResultStore`].
///
/// The store is never needed for correctness: any store failure is logged and treated as a miss.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    strategy: CacheStrategy,
    store: Arc<dyn ResultStore>,
}

impl ResponseCache {
    pub fn new(strategy: CacheStrategy, store: Arc<dyn ResultStore>) -> Self {
        Self { strategy, store }
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    pub fn key(&self, request: &CacheRequest<'_>) -> Option<CacheKey> {
        self.strategy.key(request)
    }

    pub async fn lookup(&self, request: &CacheRequest<'_>) -> CacheLookup {
        let Some(key) = self.strategy.key(request) else {
            return CacheLookup::Miss { key: None };
        };
        match self.store.get(&key).await {
            Ok(Some(value)) => {
                debug!(%key, bytes = value.len(), "cache hit");
                CacheLookup::Hit(value)
            }
            Ok(None) => {
                debug!(%key, "cache miss");
                CacheLookup::Miss { key: Some(key) }
            }
            Err(e) => {
                warn!(%key, error = %e, "cache read failed, executing query");
                CacheLookup::Miss { key: Some(key) }
            }
        }
    }

    /// Store `value` in the background.
    ///
    /// The write completes even if the caller goes away; failures are logged.
    pub fn populate(&self, key: CacheKey, value: Bytes) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let ttl = self.strategy.ttl();
        tokio::spawn(async move {
            if let Err(e) = store.put(key.clone(), value, ttl).await {
                warn!(%key, error = %e, "cache write failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use iox_time::{MockProvider, Time};

    use super::*;
    use crate::{Error, MemoryResultStore};

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl ResultStore for BrokenStore {
        async fn get(&self, _key: &CacheKey) -> Result<Option<Bytes>, Error> {
            Err(Error::Unavailable("connection reset".to_string()))
        }

        async fn put(&self, _: CacheKey, _: Bytes, _: Option<Duration>) -> Result<(), Error> {
            Err(Error::Unavailable("connection reset".to_string()))
        }
    }

    fn request(query: &str) -> CacheRequest<'_> {
        CacheRequest {
            query,
            ..Default::default()
        }
    }

    #[test_log::test(tokio::test)]
    async fn miss_then_hit() {
        let time = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let cache = ResponseCache::new(
            CacheStrategy::Ttl(Duration::from_secs(60)),
            Arc::new(MemoryResultStore::new(Arc::clone(&time) as _)),
        );

        let key = assert_matches!(
            cache.lookup(&request("q")).await,
            CacheLookup::Miss { key: Some(key) } => key
        );
        cache
            .populate(key, Bytes::from_static(b"result"))
            .await
            .unwrap();
        assert_eq!(
            cache.lookup(&request("q")).await,
            CacheLookup::Hit(Bytes::from_static(b"result"))
        );

        time.inc(Duration::from_secs(61));
        assert_matches!(cache.lookup(&request("q")).await, CacheLookup::Miss { key: Some(_) });
    }

    #[tokio::test]
    async fn no_cache_never_stores() {
        let time = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let cache = ResponseCache::new(
            CacheStrategy::NoCache,
            Arc::new(MemoryResultStore::new(time)),
        );
        assert_eq!(cache.lookup(&request("q")).await, CacheLookup::Miss { key: None });
    }

    #[test_log::test(tokio::test)]
    async fn store_failures_are_misses() {
        let cache = ResponseCache::new(CacheStrategy::LocalSignature, Arc::new(BrokenStore));

        let key = assert_matches!(
            cache.lookup(&request("q")).await,
            CacheLookup::Miss { key: Some(key) } => key
        );
        // The write failure is swallowed.
        cache
            .populate(key, Bytes::from_static(b"result"))
            .await
            .unwrap();
    }
}

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use iox_time::{Time, TimeProvider};
use observability_deps::tracing::debug;
use parking_lot::Mutex;

use crate::{CacheKey, Error};

/// Where cached results live.
#[async_trait]
pub trait ResultStore: std::fmt::Debug + Send + Sync + 'static {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, Error>;

    /// Store `value`, expiring it after `ttl` if one is given.
    async fn put(&self, key: CacheKey, value: Bytes, ttl: Option<Duration>) -> Result<(), Error>;
}

#[derive(Debug)]
struct Entry {
    value: Bytes,
    expires_at: Option<Time>,
    /// Insertion sequence number; the lowest is evicted first.
    inserted: u64,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<CacheKey, Entry>,
    next: u64,
}

impl Entries {
    fn prune(&mut self, now: Time) -> usize {
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at.is_none_or(|t| t > now));
        before - self.map.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .map
            .iter()
            .min_by_key(|(_, e)| e.inserted)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.map.remove(&key);
        }
    }
}

/// An in-process [`ResultStore`].
///
/// Without a capacity the store is unbounded. Keys made unreachable by reprocessing (under
/// [`CacheStrategy::LocalSignature`](crate::CacheStrategy::LocalSignature) or
/// [`CacheStrategy::ETag`](crate::CacheStrategy::ETag)) never expire, so long running processes
/// should set one with [`MemoryResultStore::with_capacity`].
#[derive(Debug)]
pub struct MemoryResultStore {
    entries: Mutex<Entries>,
    capacity: Option<NonZeroUsize>,
    time_provider: Arc<dyn TimeProvider>,
}

impl MemoryResultStore {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            entries: Default::default(),
            capacity: None,
            time_provider,
        }
    }

    /// Hold at most `capacity` entries. When full, expired entries are dropped first, then the
    /// oldest insertion.
    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry.
    pub fn prune(&self) -> usize {
        self.entries.lock().prune(self.time_provider.now())
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, Error> {
        let now = self.time_provider.now();
        let mut entries = self.entries.lock();
        match entries.map.get(key) {
            Some(entry) if entry.expires_at.is_some_and(|t| t <= now) => {
                entries.map.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheKey, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        let now = self.time_provider.now();
        let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));
        let mut entries = self.entries.lock();
        let full = self
            .capacity
            .is_some_and(|c| entries.map.len() >= c.get() && !entries.map.contains_key(&key));
        if full {
            let pruned = entries.prune(now);
            if pruned == 0 {
                entries.evict_oldest();
            }
            debug!(pruned, "result store full");
        }
        let inserted = entries.next;
        entries.next += 1;
        entries.map.insert(
            key,
            Entry {
                value,
                expires_at,
                inserted,
            },
        );
        Ok(())
    }
}

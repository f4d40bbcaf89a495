//! The process-wide availability snapshot and its background refresh.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use observability_deps::tracing::{debug, info, warn};
use parking_lot::RwLock;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    AvailabilitySnapshot, AvailabilityUnavailable, MetadataSource, SegmentMetadata,
    TableAvailability,
};

/// Bounds on a single table's metadata fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Limit on each attempt.
    pub timeout: Duration,
    /// Attempts after the first.
    pub retries: usize,
    /// Delay before the first retry; doubles on every further retry.
    pub initial_backoff: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshSummary {
    pub available: usize,
    pub unavailable: usize,
    /// Whether the new snapshot differs from the one it replaced.
    pub changed: bool,
}

#[derive(Debug)]
pub struct AvailabilityStore {
    inner: RwLock<Arc<AvailabilitySnapshot>>,
    config: RefreshConfig,
}

impl AvailabilityStore {
    pub fn new(config: RefreshConfig) -> Self {
        Self::with_snapshot(config, AvailabilitySnapshot::default())
    }

    pub fn with_snapshot(config: RefreshConfig, snapshot: AvailabilitySnapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
            config,
        }
    }

    pub fn snapshot(&self) -> Arc<AvailabilitySnapshot> {
        Arc::clone(&self.inner.read())
    }

    pub fn replace(&self, snapshot: AvailabilitySnapshot) -> Arc<AvailabilitySnapshot> {
        std::mem::replace(&mut *self.inner.write(), Arc::new(snapshot))
    }

    /// Fetch metadata for `tables` and install a new snapshot built from it.
    ///
    /// A table whose metadata cannot be fetched is recorded as unavailable and has no coverage in
    /// the new snapshot.
    pub async fn refresh(
        &self,
        source: &dyn MetadataSource,
        tables: &[Arc<str>],
    ) -> RefreshSummary {
        let results = join_all(tables.iter().map(|table| self.fetch(source, table))).await;

        let mut snapshot = AvailabilitySnapshot::default();
        let mut summary = RefreshSummary::default();
        for (table, result) in tables.iter().zip(results) {
            match result {
                Ok(segments) => {
                    summary.available += 1;
                    snapshot = snapshot
                        .with_table(Arc::clone(table), TableAvailability::from_segments(&segments));
                }
                Err(e) => {
                    warn!(%table, error = %e, "availability unavailable, table has no coverage");
                    summary.unavailable += 1;
                    snapshot = snapshot.with_unavailable(e);
                }
            }
        }

        summary.changed = !self.snapshot().is_equivalent(&snapshot);
        self.replace(snapshot);
        info!(
            available = summary.available,
            unavailable = summary.unavailable,
            changed = summary.changed,
            "refreshed availability"
        );
        summary
    }

    async fn fetch(
        &self,
        source: &dyn MetadataSource,
        table: &Arc<str>,
    ) -> Result<Vec<SegmentMetadata>, AvailabilityUnavailable> {
        let mut delay = self.config.initial_backoff;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match tokio::time::timeout(self.config.timeout, source.segments(table)).await
            {
                Ok(Ok(segments)) => return Ok(segments),
                Ok(Err(e)) => AvailabilityUnavailable::Fetch {
                    table: Arc::clone(table),
                    attempts,
                    reason: e.to_string(),
                },
                Err(_) => AvailabilityUnavailable::Timeout {
                    table: Arc::clone(table),
                    timeout: self.config.timeout,
                },
            };
            if attempts > self.config.retries {
                return Err(err);
            }
            debug!(%table, attempts, error = %err, ?delay, "retrying metadata fetch");
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    /// Refresh every `interval` until `shutdown` is cancelled.
    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        source: Arc<dyn MetadataSource>,
        tables: Vec<Arc<str>>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("availability refresh stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        store.refresh(source.as_ref(), &tables).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::{Coverage, DynError, Interval, PartitionIdentity};

    #[derive(Debug, Default)]
    struct TestSource {
        segments: Mutex<HashMap<String, Vec<SegmentMetadata>>>,
        /// Number of calls that fail before calls start succeeding.
        failures: AtomicUsize,
        hang: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl TestSource {
        fn set(&self, table: &str, version: &str) {
            self.segments.lock().insert(
                table.to_string(),
                vec![SegmentMetadata {
                    interval: "2024-01-01/2024-01-02".parse().unwrap(),
                    version: version.to_string(),
                    dimensions: vec!["country".to_string()],
                    metrics: vec!["added".to_string()],
                    complete: true,
                    shard_spec: PartitionIdentity::numbered(0, 1),
                }],
            );
        }
    }

    #[async_trait]
    impl MetadataSource for TestSource {
        async fn segments(&self, table: &str) -> Result<Vec<SegmentMetadata>, DynError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hang = self.hang.lock().iter().any(|t| t == table);
            if hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err("connection refused".into());
            }
            self.segments
                .lock()
                .get(table)
                .cloned()
                .ok_or_else(|| format!("no table {table}").into())
        }
    }

    fn config() -> RefreshConfig {
        RefreshConfig {
            timeout: Duration::from_millis(50),
            retries: 2,
            initial_backoff: Duration::from_millis(1),
        }
    }

    fn tables(names: &[&str]) -> Vec<Arc<str>> {
        names.iter().map(|&n| Arc::from(n)).collect()
    }

    fn day() -> Interval {
        "2024-01-01/2024-01-02".parse().unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn refresh_swaps_snapshot() {
        let source = TestSource::default();
        source.set("t1", "v1");
        let store = AvailabilityStore::new(config());
        let tables = tables(&["t1"]);

        let before = store.snapshot();
        let summary = store.refresh(&source, &tables).await;
        assert_eq!(
            summary,
            RefreshSummary {
                available: 1,
                unavailable: 0,
                changed: true
            }
        );
        assert_eq!(before.coverage("t1", "added", &day()), Coverage::None);
        assert_eq!(store.snapshot().coverage("t1", "added", &day()), Coverage::Full);

        assert!(!store.refresh(&source, &tables).await.changed);

        source.set("t1", "v2");
        assert!(store.refresh(&source, &tables).await.changed);
    }

    #[test_log::test(tokio::test)]
    async fn retries_transient_failures() {
        let source = TestSource::default();
        source.set("t1", "v1");
        source.failures.store(2, Ordering::SeqCst);
        let store = AvailabilityStore::new(config());

        let summary = store.refresh(&source, &tables(&["t1"])).await;
        assert_eq!(summary.available, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test_log::test(tokio::test)]
    async fn exhausted_retries_degrade_table() {
        let source = TestSource::default();
        source.set("t1", "v1");
        source.set("t2", "v1");
        source.failures.store(10, Ordering::SeqCst);
        source.hang.lock().push("t2".to_string());
        let store = AvailabilityStore::new(RefreshConfig {
            retries: 0,
            ..config()
        });

        let summary = store.refresh(&source, &tables(&["t1", "t2"])).await;
        assert_eq!(summary.unavailable, 2);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.coverage("t1", "added", &day()), Coverage::None);
        assert_matches!(
            snapshot.unavailable("t1"),
            Some(AvailabilityUnavailable::Fetch { attempts: 1, .. })
        );
        assert_matches!(
            snapshot.unavailable("t2"),
            Some(AvailabilityUnavailable::Timeout { .. })
        );
    }

    #[test_log::test(tokio::test)]
    async fn refresh_loop_stops_on_cancel() {
        let source = Arc::new(TestSource::default());
        source.set("t1", "v1");
        let store = Arc::new(AvailabilityStore::new(config()));
        let shutdown = CancellationToken::new();

        let handle = store.spawn_refresh_loop(
            Arc::clone(&source) as _,
            tables(&["t1"]),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        while store.snapshot().table("t1").is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();
    }
}

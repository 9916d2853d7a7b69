use crate::interfaces::MembershipSource;
use nash_protocol::WorkerHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct CacheEntry {
    workers: Vec<WorkerHandle>,
    fetched_at: Instant,
}

/// TTL cache in front of a [`MembershipSource`].
///
/// Reads never wait on a refresh: the membership call runs without holding
/// the cache lock, and only one caller refreshes at a time while others keep
/// serving the previous list. A failed refresh keeps the last good list.
pub struct WorkerDirectory {
    source: Arc<dyn MembershipSource>,
    ttl: Duration,
    cache: RwLock<Option<CacheEntry>>,
    refresh: Mutex<()>,
}

impl WorkerDirectory {
    pub fn new(source: Arc<dyn MembershipSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current worker list, refreshed from the membership source when the
    /// cache has expired. Empty only if no fetch has ever succeeded.
    pub async fn get(&self) -> Vec<WorkerHandle> {
        if let Some(workers) = self.fresh().await {
            return workers;
        }

        let Ok(_refresh) = self.refresh.try_lock() else {
            debug!("Worker refresh already in flight, serving cached list");
            return self.cached().await;
        };

        // Another caller may have refreshed while we waited for the guard.
        if let Some(workers) = self.fresh().await {
            return workers;
        }

        match self.source.list_workers().await {
            Ok(workers) => {
                info!(workers = workers.len(), "🔄 Worker directory refreshed");
                *self.cache.write().await = Some(CacheEntry {
                    workers: workers.clone(),
                    fetched_at: Instant::now(),
                });
                workers
            }
            Err(e) => {
                let stale = self.cached().await;
                warn!(
                    error = %e,
                    cached = stale.len(),
                    "⚠️ Membership refresh failed, serving stale worker list"
                );
                stale
            }
        }
    }

    async fn fresh(&self) -> Option<Vec<WorkerHandle>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.workers.clone())
    }

    async fn cached(&self) -> Vec<WorkerHandle> {
        self.cache
            .read()
            .await
            .as_ref()
            .map(|entry| entry.workers.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ValidatorError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl MembershipSource for CountingSource {
        async fn list_workers(&self) -> Result<Vec<WorkerHandle>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u32;
            if self.failing.load(Ordering::SeqCst) {
                return Err(ValidatorError::Membership("metagraph unavailable".to_string()));
            }
            Ok(vec![WorkerHandle::new(call, format!("worker-{}", call))])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_is_served_within_ttl() {
        let source = Arc::new(CountingSource::default());
        let directory = WorkerDirectory::new(source.clone(), Duration::from_secs(60));

        let first = directory.get().await;
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = directory.get().await;

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_after_expiry() {
        let source = Arc::new(CountingSource::default());
        let directory = WorkerDirectory::new(source.clone(), Duration::from_secs(60));

        directory.get().await;
        tokio::time::advance(Duration::from_secs(61)).await;
        let refreshed = directory.get().await;

        assert_eq!(refreshed[0].uid, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_serves_stale_list() {
        let source = Arc::new(CountingSource::default());
        let directory = WorkerDirectory::new(source.clone(), Duration::from_secs(60));

        let good = directory.get().await;
        source.failing.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(directory.get().await, good);
    }

    #[tokio::test]
    async fn test_cold_start_failure_is_empty() {
        let source = Arc::new(CountingSource::default());
        source.failing.store(true, Ordering::SeqCst);
        let directory = WorkerDirectory::new(source, Duration::from_secs(60));

        assert!(directory.get().await.is_empty());
    }
}

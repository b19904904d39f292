//! TTL cache slots for the raw fetch and the processed report.
//!
//! Each slot has its own async mutex, held across "check age, recompute if
//! stale, store". A caller that waits on a refresh in progress sees the
//! fresh value instead of recomputing it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use evscan_core::types::FeedSnapshot;
use evscan_core::CacheConfig;

use crate::opportunity::OpportunityReport;

// =============================================================================
// Cache Slot
// =============================================================================

struct CacheEntry<T> {
    payload: Arc<T>,
    stored_at: Instant,
}

/// A single value with a time-to-live.
pub struct CacheSlot<T> {
    name: &'static str,
    ttl: Duration,
    entry: Mutex<Option<CacheEntry<T>>>,
}

impl<T> CacheSlot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entry: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh(&self, entry: &CacheEntry<T>) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }

    /// Returns the cached value if fresh, otherwise stores and returns the
    /// result of `refresh`.
    ///
    /// The slot stays locked while `refresh` runs. A failed refresh leaves
    /// the previous entry in place.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `refresh`.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut guard = self.entry.lock().await;

        if let Some(entry) = guard.as_ref() {
            if self.fresh(entry) {
                debug!(slot = self.name, "Cache hit");
                return Ok(Arc::clone(&entry.payload));
            }
        }

        debug!(slot = self.name, "Cache miss, refreshing");
        let payload = Arc::new(refresh().await?);
        *guard = Some(CacheEntry {
            payload: Arc::clone(&payload),
            stored_at: Instant::now(),
        });
        Ok(payload)
    }

    /// Recomputes under the lock regardless of age.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `refresh`.
    pub async fn force_refresh<F, Fut, E>(&self, refresh: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut guard = self.entry.lock().await;
        let payload = Arc::new(refresh().await?);
        *guard = Some(CacheEntry {
            payload: Arc::clone(&payload),
            stored_at: Instant::now(),
        });
        Ok(payload)
    }

    /// Returns the value if present and fresh, without refreshing.
    pub async fn peek(&self) -> Option<Arc<T>> {
        let guard = self.entry.lock().await;
        guard
            .as_ref()
            .filter(|entry| self.fresh(entry))
            .map(|entry| Arc::clone(&entry.payload))
    }

    /// Age of the stored value, fresh or not.
    pub async fn age(&self) -> Option<Duration> {
        self.entry
            .lock()
            .await
            .as_ref()
            .map(|entry| entry.stored_at.elapsed())
    }

    /// Drops the stored value.
    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
        debug!(slot = self.name, "Cache invalidated");
    }
}

// =============================================================================
// Cache Manager
// =============================================================================

/// The raw-fetch and processed-report slots.
pub struct CacheManager {
    raw: CacheSlot<FeedSnapshot>,
    processed: CacheSlot<OpportunityReport>,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl CacheManager {
    /// Creates empty slots with the configured TTLs.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            raw: CacheSlot::new("raw", config.raw_ttl()),
            processed: CacheSlot::new("processed", config.processed_ttl()),
        }
    }

    /// Cached feed snapshot, fetching if stale.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `fetch`.
    pub async fn get_or_refresh_raw<F, Fut, E>(&self, fetch: F) -> Result<Arc<FeedSnapshot>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FeedSnapshot, E>>,
    {
        self.raw.get_or_refresh(fetch).await
    }

    /// Cached report, recomputing if stale.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `compute`.
    pub async fn get_or_refresh_processed<F, Fut, E>(
        &self,
        compute: F,
    ) -> Result<Arc<OpportunityReport>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<OpportunityReport, E>>,
    {
        self.processed.get_or_refresh(compute).await
    }

    /// Recomputes the report regardless of age.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `compute`.
    pub async fn force_refresh_processed<F, Fut, E>(
        &self,
        compute: F,
    ) -> Result<Arc<OpportunityReport>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<OpportunityReport, E>>,
    {
        self.processed.force_refresh(compute).await
    }

    pub async fn peek_raw(&self) -> Option<Arc<FeedSnapshot>> {
        self.raw.peek().await
    }

    pub async fn peek_processed(&self) -> Option<Arc<OpportunityReport>> {
        self.processed.peek().await
    }

    pub async fn invalidate_raw(&self) {
        self.raw.invalidate().await;
    }

    pub async fn invalidate_processed(&self) {
        self.processed.invalidate().await;
    }

    /// Clears both slots.
    pub async fn invalidate_all(&self) {
        self.invalidate_raw().await;
        self.invalidate_processed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn counted(counter: &AtomicUsize, value: u32) -> Result<u32, String> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    // ==================== Slot Tests ====================

    #[tokio::test]
    async fn test_fresh_value_is_reused() {
        let slot = CacheSlot::new("test", Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let first = slot.get_or_refresh(|| counted(&calls, 1)).await.unwrap();
        let second = slot.get_or_refresh(|| counted(&calls, 2)).await.unwrap();

        assert_eq!(*first, 1);
        assert_eq!(*second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_value_is_recomputed() {
        let slot = CacheSlot::new("test", Duration::from_millis(10));
        let calls = AtomicUsize::new(0);

        slot.get_or_refresh(|| counted(&calls, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let value = slot.get_or_refresh(|| counted(&calls, 2)).await.unwrap();

        assert_eq!(*value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_serialize() {
        let slot = CacheSlot::new("test", Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let (a, b) = tokio::join!(
            slot.get_or_refresh(|| counted(&calls, 1)),
            slot.get_or_refresh(|| counted(&calls, 2)),
        );

        assert_eq!(*a.unwrap(), *b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_value() {
        let slot = CacheSlot::new("test", Duration::from_millis(10));
        slot.get_or_refresh(|| async { Ok::<_, String>(7) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = slot
            .get_or_refresh(|| async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert!(result.is_err());
        assert!(slot.age().await.is_some());
        assert!(slot.peek().await.is_none());

        // The lock was released on the error path.
        let value = slot.get_or_refresh(|| async { Ok::<_, String>(8) }).await;
        assert_eq!(*value.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_force_refresh_and_invalidate() {
        let slot = CacheSlot::new("test", Duration::from_secs(60));
        slot.get_or_refresh(|| async { Ok::<_, String>(1) })
            .await
            .unwrap();

        let forced = slot.force_refresh(|| async { Ok::<_, String>(2) }).await.unwrap();
        assert_eq!(*forced, 2);
        assert_eq!(slot.peek().await.map(|v| *v), Some(2));

        slot.invalidate().await;
        assert!(slot.peek().await.is_none());
        assert!(slot.age().await.is_none());
    }

    // ==================== Manager Tests ====================

    #[tokio::test]
    async fn test_manager_slots_are_independent() {
        let cache = CacheManager::default();
        let snapshot = FeedSnapshot::failed("timeout", chrono::Utc::now());

        cache
            .get_or_refresh_raw(|| async { Ok::<_, String>(snapshot) })
            .await
            .unwrap();

        assert!(cache.peek_raw().await.is_some());
        assert!(cache.peek_processed().await.is_none());

        cache.invalidate_all().await;
        assert!(cache.peek_raw().await.is_none());
    }
}

//! Conditional polling on top of the cache.

use crate::cache::{QueryCache, QuerySnapshot};
use crate::error::QueryError;
use crate::key::QueryKey;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Decides, after each response, when the next poll runs.
pub enum RefetchInterval<T> {
    Never,
    Fixed(Duration),
    /// Called with the latest data (`None` if nothing loaded yet);
    /// `None` stops polling.
    Conditional(Arc<dyn Fn(Option<&T>) -> Option<Duration> + Send + Sync>),
}

impl<T> Clone for RefetchInterval<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Never => Self::Never,
            Self::Fixed(interval) => Self::Fixed(*interval),
            Self::Conditional(f) => Self::Conditional(f.clone()),
        }
    }
}

impl<T> RefetchInterval<T> {
    pub fn conditional<F>(f: F) -> Self
    where
        F: Fn(Option<&T>) -> Option<Duration> + Send + Sync + 'static,
    {
        Self::Conditional(Arc::new(f))
    }

    /// Delay before the next poll, or `None` to stop.
    pub fn next(&self, latest: Option<&T>) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::Fixed(interval) => Some(*interval),
            Self::Conditional(f) => f(latest),
        }
    }
}

/// Data that reports whether a background job is still running.
pub trait ActivityFlag {
    fn is_active(&self) -> bool;
}

impl<T: ActivityFlag + 'static> RefetchInterval<T> {
    /// Poll every `interval` while the last response says the job is active.
    pub fn while_active(interval: Duration) -> Self {
        Self::conditional(move |latest: Option<&T>| {
            latest.filter(|data| data.is_active()).map(|_| interval)
        })
    }
}

/// Raw status payloads: `is_running`/`is_active` at the top level or under
/// a `status` envelope.
impl ActivityFlag for serde_json::Value {
    fn is_active(&self) -> bool {
        fn flagged(value: &serde_json::Value) -> bool {
            ["is_running", "is_active"]
                .iter()
                .any(|flag| value.get(flag).and_then(serde_json::Value::as_bool).unwrap_or(false))
        }

        flagged(self) || self.get("status").map(flagged).unwrap_or(false)
    }
}

/// Running poller. Dropping it stops polling.
pub struct PollHandle<T> {
    task: JoinHandle<()>,
    updates: watch::Receiver<Option<QuerySnapshot<T>>>,
}

impl<T: Clone> PollHandle<T> {
    /// Latest snapshot, if any response arrived yet.
    pub fn latest(&self) -> Option<QuerySnapshot<T>> {
        self.updates.borrow().clone()
    }

    /// Wait for the next snapshot. `None` once polling has stopped.
    pub async fn changed(&mut self) -> Option<QuerySnapshot<T>> {
        self.updates.changed().await.ok()?;
        self.updates.borrow_and_update().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the interval function stops the poller.
    pub async fn finished(&mut self) {
        let _ = (&mut self.task).await;
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl QueryCache {
    /// Fetch `key` now, then again after each delay `interval` yields.
    ///
    /// Every response re-evaluates the interval, so polling resumes only
    /// through a new `poll` call once it has stopped.
    pub fn poll<T, F, Fut>(&self, key: QueryKey, interval: RefetchInterval<T>, fetcher: F) -> PollHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let (sender, updates) = watch::channel(None);
        let cache = self.clone();

        let task = tokio::spawn(async move {
            loop {
                let snapshot = cache.refetch(&key, || fetcher()).await;
                let next = interval.next(snapshot.data.as_ref());
                if sender.send(Some(snapshot)).is_err() {
                    break;
                }

                match next {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => {
                        debug!(key = %key, "Polling stopped");
                        break;
                    }
                }
            }
        });

        PollHandle { task, updates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_while_active_rearms_and_stops() {
        let interval = RefetchInterval::<serde_json::Value>::while_active(Duration::from_secs(2));

        assert_eq!(interval.next(None), None);
        assert_eq!(
            interval.next(Some(&json!({ "status": { "is_running": true } }))),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            interval.next(Some(&json!({ "is_active": true, "progress": 10 }))),
            Some(Duration::from_secs(2))
        );
        assert_eq!(interval.next(Some(&json!({ "status": { "is_running": false } }))), None);
        assert_eq!(interval.next(Some(&json!({}))), None);
    }

    #[test]
    fn test_fixed_and_never() {
        let fixed = RefetchInterval::<u8>::Fixed(Duration::from_millis(5));
        assert_eq!(fixed.next(None), Some(Duration::from_millis(5)));
        assert_eq!(RefetchInterval::<u8>::Never.next(Some(&1)), None);
    }

    #[tokio::test]
    async fn test_poll_stops_when_job_finishes() {
        let cache = QueryCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let fetcher = {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<_, QueryError>(json!({ "status": { "is_running": n < 3, "progress": n * 30 } })) }
            }
        };

        let mut handle = cache.poll(
            QueryKey::new("scan_status"),
            RefetchInterval::while_active(Duration::from_millis(5)),
            fetcher,
        );

        tokio::time::timeout(Duration::from_secs(2), handle.finished())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let latest = handle.latest().unwrap().data.unwrap();
        assert!(!latest.is_active());
        assert_eq!(latest["status"]["progress"], 90);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_polling() {
        let cache = QueryCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let fetcher = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, QueryError>(1u8) }
            }
        };

        let mut handle = cache.poll(
            QueryKey::new("gpu"),
            RefetchInterval::Fixed(Duration::from_millis(5)),
            fetcher,
        );
        handle.changed().await.unwrap();
        drop(handle);

        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(calls.load(Ordering::SeqCst) <= seen + 1);
    }
}

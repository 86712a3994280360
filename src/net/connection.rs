//! Per-connection identity and the live-connection count.
//!
//! The count is what shutdown drains on; it is released by a drop guard so a
//! panicking connection task still gives its place back.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::observability::metrics;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number, shown in logs as `conn-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        // Uniqueness only; no ordering with other memory is needed.
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counter {
    live: AtomicU64,
    drained: Notify,
}

/// Shared count of open connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counter: Arc<Counter>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new connection and give it an ID. The count drops again
    /// when the returned guard does.
    pub fn track(&self) -> ConnectionGuard {
        let live = self.counter.live.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(live);
        ConnectionGuard {
            counter: Arc::clone(&self.counter),
            id: ConnectionId::next(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.counter.live.load(Ordering::SeqCst)
    }

    /// Wait for the count to reach zero, giving up after `timeout`.
    ///
    /// Returns `true` if it drained.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.counter.drained.notified();
                tokio::pin!(notified);
                // Register before re-checking so a drop in between isn't missed.
                notified.as_mut().enable();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Keeps one connection counted while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    counter: Arc<Counter>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let live = self.counter.live.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_connections(live);
        if live == 0 {
            self.counter.drained.notify_waiters();
        }
        tracing::trace!(connection = %self.id, "Connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_display() {
        let tracker = ConnectionTracker::new();
        let first = tracker.track().id();
        let second = tracker.track().id();
        assert!(second > first);
        assert_eq!(first.to_string(), format!("conn-{}", first.get()));
    }

    #[test]
    fn guards_drive_the_count() {
        let tracker = ConnectionTracker::new();
        let a = tracker.track();
        let b = tracker.clone().track();
        assert_eq!(tracker.active_count(), 2);

        drop(a);
        assert_eq!(tracker.active_count(), 1);
        drop(b);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_once_drained() {
        let tracker = ConnectionTracker::new();
        assert!(tracker.wait_idle(Duration::from_millis(10)).await);

        let guard = tracker.track();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });
        assert!(tracker.wait_idle(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn wait_idle_gives_up_after_timeout() {
        let tracker = ConnectionTracker::new();
        let _guard = tracker.track();
        assert!(!tracker.wait_idle(Duration::from_millis(50)).await);
    }
}

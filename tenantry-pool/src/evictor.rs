//! Deferred eviction timers, one per tenant key.
//!
//! Arming a key schedules a callback to run after the eviction delay.
//! Re-arming replaces the pending timer, so each access pushes the
//! eviction further out and at most one timer exists per key.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

use crate::key::TenantKey;

/// Schedules idle-pool eviction callbacks.
pub struct IdleEvictor {
    delay: Duration,
    timers: Mutex<HashMap<TenantKey, JoinHandle<()>>>,
}

impl IdleEvictor {
    /// Create an evictor that fires callbacks `delay` after arming.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Arm the timer for `key`, replacing any timer already pending.
    ///
    /// The new timer goes into the map before the displaced one is
    /// aborted, so the key is never left without a timer in between.
    pub fn arm<F, Fut>(&self, key: &TenantKey, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let task = tokio::spawn(async move {
            sleep(delay).await;
            callback().await;
        });

        trace!(tenant = %key, delay_ms = %delay.as_millis(), "armed eviction timer");
        let displaced = self.timers.lock().insert(key.clone(), task);
        if let Some(displaced) = displaced {
            displaced.abort();
        }
    }

    /// Cancel the pending timer for `key`, if any.
    pub fn cancel(&self, key: &TenantKey) -> bool {
        match self.timers.lock().remove(key) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer, returning how many were tracked.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<JoinHandle<()>> = {
            let mut timers = self.timers.lock();
            timers.drain().map(|(_, task)| task).collect()
        };

        let count = drained.len();
        for task in drained {
            task.abort();
        }
        count
    }

    /// Timers armed and not yet fired.
    ///
    /// Fired timers stay in the map until re-armed or cancelled; they are
    /// filtered out here.
    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// The delay applied to every armed timer.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    fn counting_callback(fired: Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> {
        move || {
            fired.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_fires_after_delay() {
        let evictor = IdleEvictor::new(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));

        evictor.arm(&TenantKey::new("t1"), counting_callback(Arc::clone(&fired)));
        assert_eq!(evictor.pending(), 1);

        sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(evictor.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_timer() {
        let evictor = IdleEvictor::new(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));
        let key = TenantKey::new("t1");

        evictor.arm(&key, counting_callback(Arc::clone(&fired)));
        sleep(Duration::from_millis(30)).await;
        evictor.arm(&key, counting_callback(Arc::clone(&fired)));

        // The first timer would have fired by now; it was replaced
        sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_callback() {
        let evictor = IdleEvictor::new(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));
        let key = TenantKey::new("t1");

        evictor.arm(&key, counting_callback(Arc::clone(&fired)));
        assert!(evictor.cancel(&key));
        assert!(!evictor.cancel(&key));

        sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_clears_every_timer() {
        let evictor = IdleEvictor::new(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));

        for name in ["t1", "t2", "t3"] {
            evictor.arm(&TenantKey::new(name), counting_callback(Arc::clone(&fired)));
        }

        assert_eq!(evictor.cancel_all(), 3);
        assert_eq!(evictor.pending(), 0);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}

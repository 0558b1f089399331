//! Cancellable background timers
//!
//! Every component that ticks or polls owns its timers through these handles,
//! so stopping a component has exactly one cancellation point per timer.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A repeating timer running on its own tokio task
///
/// Cancellation is cooperative: once [`PeriodicTask::cancel`] returns, no new
/// invocation of the callback will start, while an invocation already in
/// flight is allowed to finish. This lets a callback cancel its own timer.
pub struct PeriodicTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn a timer whose first invocation happens one `period` from now
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        callback().await;
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }

            tracing::debug!(task = name, "Periodic task stopped");
        });

        tracing::debug!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");

        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    /// Stop the timer
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the underlying task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// A one-shot delayed action that can be aborted before it fires
pub struct DelayedTask {
    handle: JoinHandle<()>,
}

impl DelayedTask {
    /// Run `action` after `delay`
    pub fn spawn<Fut>(delay: Duration, action: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });

        Self { handle }
    }

    /// Abort the action if it has not completed yet
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the action has run (or been aborted)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_ticks_and_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = PeriodicTask::spawn("test", Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_task_cancel() {
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = fired.clone();

        let task = DelayedTask::spawn(Duration::from_secs(30), async move {
            flag.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        task.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_task_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = fired.clone();

        let _task = DelayedTask::spawn(Duration::from_secs(30), async move {
            flag.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

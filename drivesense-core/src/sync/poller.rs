//! Fixed-interval polling
//!
//! A [`Poller`] runs the first load, then fires a tick every `period`. Ticks do
//! not wait for each other, so a slow fetch can overlap the next one.
//! Dropping (or [`stop`](PollHandle::stop)ping) the [`PollHandle`] releases
//! the lease, so any response still in flight is discarded, and then aborts
//! the loop together with its in-flight ticks.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Something a [`Poller`] can refresh.
pub trait Pollable: Clone + Send + Sync + 'static {
    /// Runs once, before the first tick.
    fn initial(&self, lease: &PollLease) -> impl Future<Output = ()> + Send;

    /// Runs on every tick. Must not apply results once `lease` is released.
    fn tick(&self, lease: &PollLease) -> impl Future<Output = ()> + Send;
}

/// Shared liveness flag between a poller and its in-flight fetches.
#[derive(Debug, Clone)]
pub struct PollLease {
    active: Arc<AtomicBool>,
}

impl PollLease {
    /// A lease nobody will release; used for one-off fetches.
    pub fn detached() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn release(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Owner of a running poller. The poller stops when this is dropped.
#[derive(Debug)]
pub struct PollHandle {
    lease: PollLease,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop polling. Responses still in flight are discarded.
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool {
        self.lease.is_active() && !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.lease.release();
        self.task.abort();
    }
}

/// Fixed-interval poll loop settings.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    name: &'static str,
    period: Duration,
}

impl Poller {
    /// `name` tags log lines.
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start polling `target` on the current tokio runtime.
    pub fn spawn<P: Pollable>(self, target: P) -> PollHandle {
        let Poller { name, period } = self;
        let lease = PollLease::detached();
        let task_lease = lease.clone();

        let task = tokio::spawn(async move {
            target.initial(&task_lease).await;
            tracing::debug!(poller = name, period_ms = period.as_millis() as u64, "Polling started");

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let target = target.clone();
                        let lease = task_lease.clone();
                        ticks.spawn(async move { target.tick(&lease).await });
                    }
                    Some(joined) = ticks.join_next(), if !ticks.is_empty() => {
                        if let Err(e) = joined {
                            if e.is_panic() {
                                tracing::error!(poller = name, error = %e, "Poll tick panicked");
                            }
                        }
                    }
                }
            }
        });

        PollHandle { lease, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct Counter {
        initial: Arc<AtomicUsize>,
        ticks: Arc<AtomicUsize>,
    }

    impl Pollable for Counter {
        async fn initial(&self, _lease: &PollLease) {
            self.initial.fetch_add(1, Ordering::SeqCst);
        }

        async fn tick(&self, lease: &PollLease) {
            if lease.is_active() {
                self.ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval() {
        let counter = Counter::default();
        let handle = Poller::new("test", Duration::from_secs(3)).spawn(counter.clone());

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(counter.initial.load(Ordering::SeqCst), 1);
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 3);
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let counter = Counter::default();
        let handle = Poller::new("test", Duration::from_secs(1)).spawn(counter.clone());

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.stop();
        let seen = counter.ticks.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_lease_release() {
        let lease = PollLease::detached();
        let other = lease.clone();
        assert!(other.is_active());
        lease.release();
        assert!(!other.is_active());
    }
}

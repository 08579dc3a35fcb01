//! Background tasks: named, individually cancellable scheduled jobs.
//!
//! [`Scheduler`] owns every timer the prefetch runtime starts: the periodic
//! cache sweep, the idle timer and the hover/touch debounce. Each task is
//! registered under a name:
//!
//! - scheduling a name that is already taken aborts the previous task first,
//!   which is how debouncing works (re-arm on every event);
//! - [`cancel`](Scheduler::cancel) stops one task;
//! - [`shutdown`](Scheduler::shutdown), or dropping the scheduler, stops them all.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Registry of running background tasks keyed by name.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Spawns `task` under `name`, aborting any task already registered there.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(task);
        if let Some(previous) = self.tasks().insert(name.clone(), handle) {
            previous.abort();
            trace!(task = %name, "replaced scheduled task");
        }
    }

    /// Runs `job` once after `delay`. Re-arming the same name restarts the
    /// countdown.
    pub fn after<F>(&self, name: impl Into<String>, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(name, async move {
            time::sleep(delay).await;
            job.await;
        });
    }

    /// Calls `tick` every `period`, starting one period from now.
    pub fn every<F>(&self, name: impl Into<String>, period: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.spawn(name, async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick();
            }
        });
    }

    /// Aborts the task registered under `name`. Returns `false` if there was none.
    pub fn cancel(&self, name: &str) -> bool {
        match self.tasks().remove(name) {
            Some(handle) => {
                handle.abort();
                trace!(task = %name, "cancelled scheduled task");
                true
            }
            None => false,
        }
    }

    /// Returns `true` while a task registered under `name` is still running.
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.tasks()
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of registered tasks that have not finished yet.
    pub fn active(&self) -> usize {
        let mut tasks = self.tasks();
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.len()
    }

    /// Aborts every task.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks();
        let count = tasks.len();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
        if count > 0 {
            debug!(tasks = count, "scheduler shut down");
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn every_ticks_on_period() {
        let scheduler = Scheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        scheduler.every("sweep", Duration::from_secs(120), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(119)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(240)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn after_fires_once() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        scheduler.after("idle", Duration::from_secs(2), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_scheduled("idle"));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_countdown() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = fired.clone();
            scheduler.after("idle", Duration::from_secs(2), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_single_task() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let a = fired.clone();
        let b = fired.clone();
        scheduler.after("a", Duration::from_secs(1), async move {
            a.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.after("b", Duration::from_secs(1), async move {
            b.fetch_add(10, Ordering::SeqCst);
        });

        assert!(scheduler.cancel("a"));
        assert!(!scheduler.cancel("missing"));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_everything() {
        let scheduler = Scheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        scheduler.every("sweep", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_scheduled("sweep"));
        assert_eq!(scheduler.active(), 1);

        scheduler.shutdown();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.active(), 0);
    }
}

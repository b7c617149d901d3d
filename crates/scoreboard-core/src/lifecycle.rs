//! Owned, cancellable periodic tasks.
//!
//! Each task gets the generation number current at spawn time. Results sent
//! back to the owner carry it, and `shutdown` bumps the generation so results
//! that arrive late can be recognised and dropped.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

pub const REFRESH_TASK: &str = "refresh";
pub const POLL_TASK: &str = "notifications";

#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: BTreeMap<&'static str, JoinHandle<()>>,
    generation: Arc<AtomicU64>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation()
    }

    /// Run `job` every `period`, first after one full period. Replaces a
    /// task already registered under `name`. A zero period is raised to 1 ms.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let generation = self.generation();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                job(generation).await;
            }
        });

        debug!(task = name, period_ms = period.as_millis() as u64, generation, "Started periodic task");
        if let Some(previous) = self.tasks.insert(name, handle) {
            previous.abort();
        }
    }

    /// Names of tasks still running.
    pub fn active(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Abort every task and invalidate results tagged with the old generation.
    pub fn shutdown(&mut self) {
        for (name, handle) in std::mem::take(&mut self.tasks) {
            handle.abort();
            debug!(task = name, "Stopped periodic task");
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}

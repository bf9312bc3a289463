// Tick Scheduler - busy-guarded periodic job loop

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::AutomationError;

#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> Result<(), AutomationError>;
}

/// Drives one [`PeriodicJob`] on a fixed millisecond interval.
///
/// The scheduler owns its lifecycle (`start`/`stop`) and a single busy
/// flag: while a tick is in flight, further firings are dropped
/// entirely. The flag is released through a drop guard, so it comes
/// back down on every exit path, including an error or panic inside the
/// job. In-flight ticks are never cancelled or timed out; a slow tick
/// simply delays the next opportunity to fire.
pub struct TickScheduler {
    interval: Duration,
    busy: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TickScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms.max(1)),
            busy: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the tick loop. The first firing happens one interval after
    /// start, not immediately.
    pub fn start(&self, job: Arc<dyn PeriodicJob>) {
        let busy = self.busy.clone();
        let interval = self.interval;

        info!(
            job = job.name(),
            interval_ms = interval.as_millis() as u64,
            "starting periodic job"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                Self::fire_guarded(busy.clone(), job.as_ref()).await;
            }
        });

        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }

    /// Run one guarded tick. Returns false if the previous tick was
    /// still in flight and this firing was dropped.
    pub async fn fire(&self, job: &dyn PeriodicJob) -> bool {
        Self::fire_guarded(self.busy.clone(), job).await
    }

    async fn fire_guarded(busy: Arc<AtomicBool>, job: &dyn PeriodicJob) -> bool {
        if busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(job = job.name(), "previous tick still in flight, skipping");
            return false;
        }

        let _guard = BusyGuard(busy);
        if let Err(err) = job.run_once().await {
            error!(job = job.name(), error = %err, "periodic job tick failed");
        }

        true
    }
}

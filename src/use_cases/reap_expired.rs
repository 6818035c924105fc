use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::errors::GuestError;
use crate::domain::ports::{Clock, IdentityBackend};

// Lets the host finish its own startup before the first sweep.
pub const INITIAL_DELAY: Duration = Duration::from_secs(5);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// Timing of the reaper loop.
#[derive(Clone, Copy, Debug)]
pub struct ReaperSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for ReaperSchedule {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_DELAY,
            interval: SWEEP_INTERVAL,
        }
    }
}

// What a single sweep did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub deactivated: usize,
    pub failed: usize,
}

// Finds guests past their expiration and deactivates them.
pub struct ExpiryReaper<C> {
    pub backend: Arc<dyn IdentityBackend>,
    pub clock: C,
    pub user_expiration: Duration,
}

impl<C> ExpiryReaper<C>
where
    C: Clock,
{
    // One pass over the expired guests. Per-account failures are logged and
    // counted; only failures that affect the whole sweep are returned.
    pub async fn sweep(&self) -> Result<SweepReport, GuestError> {
        let cutoff = self
            .clock
            .now_epoch_seconds()
            .saturating_sub(self.user_expiration.as_secs());
        let expired = self.backend.find_expired(cutoff).await?;

        let mut report = SweepReport {
            expired: expired.len(),
            ..SweepReport::default()
        };
        if expired.is_empty() {
            return Ok(report);
        }

        info!(backend = self.backend.name(), count = expired.len(), "deactivating expired guest users");
        // One credential per sweep.
        let credential = self.backend.admin_credential().await?;

        for guest in &expired {
            debug!(user_id = %guest.user_id, "deactivating guest user");
            if let Err(err) = self.backend.deactivate(guest, &credential).await {
                error!(user_id = %guest.user_id, error = %err, "failed to deactivate guest user");
                report.failed += 1;
                continue;
            }
            report.deactivated += 1;

            // Deactivation already happened; a failed release means the guest
            // shows up again next sweep and is deactivated a second time.
            if let Err(err) = self.backend.release(guest).await {
                warn!(user_id = %guest.user_id, error = %err, "failed to release deactivated guest user");
            }
        }

        Ok(report)
    }

    // Sleep, sweep, repeat until `shutdown` is notified. Never exits on a
    // failed sweep.
    pub async fn run(self, schedule: ReaperSchedule, shutdown: Arc<Notify>) {
        info!(
            initial_delay_secs = schedule.initial_delay.as_secs(),
            interval_secs = schedule.interval.as_secs(),
            "guest reaper started"
        );

        let mut delay = schedule.initial_delay;
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            debug!("running guest deactivation sweep");
            match self.sweep().await {
                Ok(report) if report.expired > 0 => {
                    info!(
                        expired = report.expired,
                        deactivated = report.deactivated,
                        failed = report.failed,
                        "guest deactivation sweep finished"
                    );
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "guest deactivation sweep failed"),
            }

            delay = schedule.interval;
        }

        info!("guest reaper stopped");
    }
}

// Running reaper task plus the means to stop it.
pub struct ReaperHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    // Takes effect at the next sleep point; an in-flight sweep finishes first.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.task.await {
            error!(error = %err, "guest reaper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub fn spawn_reaper<C>(reaper: ExpiryReaper<C>, schedule: ReaperSchedule) -> ReaperHandle
where
    C: Clock + 'static,
{
    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(reaper.run(schedule, shutdown.clone()));
    ReaperHandle { shutdown, task }
}

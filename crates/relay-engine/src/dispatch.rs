//! The dispatch loops. One interval scans due jobs per message type and fans
//! them out to workers under a concurrency cap; a second, slower interval
//! runs the dead-letter migration pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_core::config::{SchedulerConfig, DISPATCH_FORWARD_GUARD_SECS};
use relay_lock::LockFactory;
use relay_store::{JobStore, MessageType};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info};

use crate::dlq;
use crate::error::Result;
use crate::worker::JobWorker;

pub struct DispatchEngine {
    jobs: Arc<dyn JobStore>,
    locks: Arc<dyn LockFactory>,
    worker: Arc<JobWorker>,
    cfg: SchedulerConfig,
    lock_base: String,
    in_flight: Arc<Semaphore>,
}

impl DispatchEngine {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        locks: Arc<dyn LockFactory>,
        worker: Arc<JobWorker>,
        cfg: SchedulerConfig,
        lock_base: String,
    ) -> Self {
        let in_flight = Arc::new(Semaphore::new(cfg.max_in_flight));
        Self {
            jobs,
            locks,
            worker,
            cfg,
            lock_base,
            in_flight,
        }
    }

    /// Main event loop. Runs until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            scan_ms = self.cfg.scan_interval_ms,
            dlq_ms = self.cfg.dlq_interval_ms,
            "dispatch engine started"
        );
        let mut scan = tokio::time::interval(Duration::from_millis(self.cfg.scan_interval_ms));
        let mut dlq_tick = tokio::time::interval(Duration::from_millis(self.cfg.dlq_interval_ms));
        loop {
            tokio::select! {
                _ = scan.tick() => {
                    if let Err(e) = self.scan_pass().await {
                        error!("dispatch scan error: {e}");
                    }
                }
                _ = dlq_tick.tick() => {
                    if let Err(e) = dlq::run_pass(
                        self.jobs.as_ref(),
                        self.locks.as_ref(),
                        &self.lock_base,
                        self.cfg.dlq_retry_limit,
                    ).await {
                        error!("dead letter scan error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dispatch engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One scan over all three message types, spawning a worker task per due
    /// job. The semaphore caps concurrent deliveries across types.
    pub async fn scan_pass(&self) -> Result<()> {
        // Slight forward look so jobs due within the next tick are not
        // delayed by a full interval.
        let due_before = Utc::now().timestamp() + DISPATCH_FORWARD_GUARD_SECS;
        for message_type in [
            MessageType::Scheduled,
            MessageType::Cron,
            MessageType::Conditional,
        ] {
            let due = self
                .jobs
                .due_jobs(
                    message_type,
                    self.cfg.dlq_retry_limit,
                    due_before,
                    self.cfg.page_size,
                )
                .await?;
            for job in due {
                let Ok(permit) = self.in_flight.clone().acquire_owned().await else {
                    return Ok(());
                };
                let worker = self.worker.clone();
                tokio::spawn(async move {
                    if let Err(err) = worker.process(job).await {
                        error!("dispatch worker error: {err}");
                    }
                    drop(permit);
                });
            }
        }
        Ok(())
    }
}

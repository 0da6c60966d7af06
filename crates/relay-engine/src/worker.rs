//! Per-job dispatch: lock, re-check, admit, claim, deliver, reschedule.

use std::sync::Arc;

use chrono::Utc;
use relay_lock::{keys, LockFactory};
use relay_store::{Job, JobStatus, JobStore, MessageType, StoreError, ThresholdStore};
use tracing::{debug, error, info, warn};

use crate::admission::{self, AdmissionVerdict};
use crate::callback::{CallbackClient, CallbackOutcome};
use crate::error::Result;
use crate::schedule;

/// Everything one dispatch attempt needs. Shared across spawned tasks.
pub struct JobWorker {
    jobs: Arc<dyn JobStore>,
    thresholds: Arc<dyn ThresholdStore>,
    locks: Arc<dyn LockFactory>,
    callback: Arc<dyn CallbackClient>,
    lock_base: String,
    dlq_retry_limit: i32,
}

impl JobWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        thresholds: Arc<dyn ThresholdStore>,
        locks: Arc<dyn LockFactory>,
        callback: Arc<dyn CallbackClient>,
        lock_base: String,
        dlq_retry_limit: i32,
    ) -> Self {
        Self {
            jobs,
            thresholds,
            locks,
            callback,
            lock_base,
            dlq_retry_limit,
        }
    }

    /// Dispatch one job picked up by the scan. Contention (lock held, claim
    /// lost, no longer PENDING) is a silent skip; the next scan retries.
    pub async fn process(&self, job: Job) -> Result<()> {
        let now = Utc::now().timestamp();

        // Conditional jobs are gated by their cron expression before any
        // lock is taken: no fire since the last re-arm means not due.
        if job.message_type == MessageType::Conditional {
            match schedule::conditional_due(job.frequency.as_deref(), job.next_retry_at, now) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(reason) => {
                    error!(job_id = job.id, %reason, "conditional job skipped");
                    return Ok(());
                }
            }
        }

        let lock_name = keys::job_lock(&self.lock_base, job.id);
        let Some(guard) = self.locks.try_acquire(&lock_name).await? else {
            debug!(job_id = job.id, "dispatch lock held elsewhere");
            return Ok(());
        };
        let result = self.process_locked(job.id, now).await;
        // The job outcome is already persisted; a failed release only delays
        // the next attempt until the lease expires.
        if let Err(err) = guard.release().await {
            warn!(job_id = job.id, error = %err, "dispatch lock release failed");
        }
        result
    }

    async fn process_locked(&self, job_id: i64, now: i64) -> Result<()> {
        // Fresh read: the scan snapshot may be stale by the time we hold
        // the lock.
        let mut job = match self.jobs.find(job_id).await {
            Ok(job) => job,
            Err(StoreError::NotFound { .. }) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if job.status != JobStatus::Pending {
            return Ok(());
        }

        // A scheduled job at the retry ceiling is done retrying; the DLQ
        // scan handles its audit record.
        if job.message_type == MessageType::Scheduled && job.retry_count >= self.dlq_retry_limit {
            job.status = JobStatus::Completed;
            self.jobs.save(&job).await?;
            info!(job_id = job.id, retries = job.retry_count, "retry budget exhausted, giving up");
            return Ok(());
        }

        // Thresholds govern SCHEDULED deliveries only. The check runs under
        // the job lock, always ahead of the claim, so two instances never
        // race to park the same job.
        let threshold = if job.message_type == MessageType::Scheduled {
            match admission::admit(self.thresholds.as_ref(), &job.service_name, now).await {
                AdmissionVerdict::Unrestricted => None,
                AdmissionVerdict::Admitted(threshold) => Some(threshold),
                AdmissionVerdict::Rejected | AdmissionVerdict::Unavailable => {
                    job.status = JobStatus::Dead;
                    self.jobs.save(&job).await?;
                    warn!(job_id = job.id, service = %job.service_name, "job parked by admission control");
                    return Ok(());
                }
            }
        } else {
            None
        };

        match self.jobs.claim(job.id).await {
            Ok(()) => job.status = JobStatus::InProgress,
            Err(StoreError::StatusConflict { .. }) => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        // A cron job past its execution budget completes without a callback.
        if job.message_type == MessageType::Cron
            && job.count != -1
            && i64::from(job.retry_count) >= job.count
        {
            job.status = JobStatus::Completed;
            self.jobs.save(&job).await?;
            info!(job_id = job.id, runs = job.retry_count, "cron budget exhausted");
            return Ok(());
        }

        let outcome = match self.callback.invoke(&job).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(job_id = job.id, error = %err, "callback delivery failed");
                CallbackOutcome::Failure { interval: 0 }
            }
        };

        let now = Utc::now().timestamp();
        self.reschedule(&mut job, outcome, now);
        self.jobs.save(&job).await?;

        if matches!(outcome, CallbackOutcome::Success) {
            if let Some(threshold) = threshold {
                if let Err(err) = self.thresholds.increment_usage(threshold.id).await {
                    error!(job_id = job.id, error = %err, "threshold usage not recorded");
                }
            }
        }
        Ok(())
    }

    /// Apply the per-type rescheduling policy to a claimed job.
    fn reschedule(&self, job: &mut Job, outcome: CallbackOutcome, now: i64) {
        match (job.message_type, outcome) {
            (MessageType::Scheduled, CallbackOutcome::Success) => {
                job.status = JobStatus::Completed;
                info!(job_id = job.id, "job delivered");
            }
            (MessageType::Scheduled, CallbackOutcome::Failure { .. }) => {
                // Linear backoff: the Nth retry waits N seconds.
                job.retry_count += 1;
                job.next_retry_at = now + i64::from(job.retry_count);
                job.status = JobStatus::Pending;
                debug!(job_id = job.id, retry = job.retry_count, "delivery failed, backing off");
            }
            (MessageType::Cron, CallbackOutcome::Success) => {
                job.status = JobStatus::Completed;
                info!(job_id = job.id, "cron job finished");
            }
            (MessageType::Cron, CallbackOutcome::Failure { interval }) => {
                // The receiver may name its own retry delay; otherwise the
                // job's configured interval applies.
                job.retry_count += 1;
                let step = if interval != 0 { interval } else { job.time_duration };
                job.next_retry_at = now + step;
                job.status = JobStatus::Pending;
            }
            (MessageType::Conditional, CallbackOutcome::Success) => {
                // Re-arm: the cron gate measures from this moment.
                job.retry_count = 0;
                job.next_retry_at = now;
                job.status = JobStatus::Pending;
            }
            (MessageType::Conditional, CallbackOutcome::Failure { .. }) => {
                job.retry_count += 1;
                job.status = JobStatus::Pending;
            }
        }
    }
}

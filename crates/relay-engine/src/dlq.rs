//! Dead-letter migration. A separate, slower scan copies scheduled jobs that
//! have exactly exhausted their retry budget into the dead-letter table and
//! flags them, once each, under a migration-specific lock.

use relay_lock::{keys, LockFactory};
use relay_store::{JobStatus, JobStore};
use tracing::{debug, info, warn};

use crate::error::Result;

pub async fn run_pass(
    jobs: &dyn JobStore,
    locks: &dyn LockFactory,
    lock_base: &str,
    dlq_retry_limit: i32,
) -> Result<()> {
    let candidates = jobs.dlq_candidates(dlq_retry_limit).await?;
    for candidate in candidates {
        let lock_name = keys::dlq_lock(lock_base, candidate.id);
        let Some(guard) = locks.try_acquire(&lock_name).await? else {
            debug!(job_id = candidate.id, "migration lock held elsewhere");
            continue;
        };
        // Another instance may have migrated, or the worker may have closed
        // the job out, between scan and lock.
        let migrated = match jobs.find(candidate.id).await {
            Ok(fresh) if fresh.is_dlq || fresh.status != JobStatus::Pending => Ok(false),
            Ok(_) => jobs.migrate_to_dlq(candidate.id).await.map(|()| true),
            Err(err) => Err(err),
        };
        if let Err(err) = guard.release().await {
            warn!(job_id = candidate.id, error = %err, "migration lock release failed");
        }
        if migrated? {
            info!(job_id = candidate.id, "job moved to dead letter queue");
        }
    }
    Ok(())
}

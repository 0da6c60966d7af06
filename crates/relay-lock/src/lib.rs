//! Distributed try-locks over job ids.
//!
//! Every dispatch attempt takes a short-lived, instance-scoped marker named
//! after the job (plus a "DLQ" suffix for dead-letter migration, so the two
//! flows never contend with each other). The etcd backend attaches markers to
//! a session lease, so a crashed instance's markers vanish when its lease
//! expires. The `none` backend is process-local, for single-instance runs and
//! tests.

pub mod error;
pub mod etcd;
pub mod none;

use async_trait::async_trait;

pub use error::{LockError, Result};
pub use etcd::EtcdLockFactory;
pub use none::NoneLockFactory;

/// Holding one of these means this instance owns the named lock. Dropping it
/// without `release` leaves cleanup to lease expiry (etcd) or is a leak
/// (none), so callers release explicitly on every exit path.
#[async_trait]
pub trait LockGuard: Send + Sync {
    async fn release(self: Box<Self>) -> Result<()>;
}

/// Backend-agnostic lock acquisition. `try_acquire` never blocks on a held
/// lock: contention returns `Ok(None)` and the caller skips the job for the
/// current tick.
#[async_trait]
pub trait LockFactory: Send + Sync {
    async fn try_acquire(&self, name: &str) -> Result<Option<Box<dyn LockGuard>>>;
}

/// Helpers to build lock key paths.
pub mod keys {
    /// Dispatch lock for one job.
    pub fn job_lock(base: &str, job_id: i64) -> String {
        format!("{base}/{job_id}")
    }

    /// DLQ-migration lock for one job. Distinct from the dispatch lock so
    /// migration and dispatch never exclude each other.
    pub fn dlq_lock(base: &str, job_id: i64) -> String {
        format!("{base}/{job_id}DLQ")
    }
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn dispatch_and_dlq_locks_are_disjoint() {
        let base = "/relay/locks";
        assert_eq!(keys::job_lock(base, 7), "/relay/locks/7");
        assert_eq!(keys::dlq_lock(base, 7), "/relay/locks/7DLQ");
        assert_ne!(keys::job_lock(base, 7), keys::dlq_lock(base, 7));
    }
}

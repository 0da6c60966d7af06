//! Store traits the dispatch engine is written against. The Postgres
//! implementation lives in [`crate::postgres`]; tests substitute in-memory
//! doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Job, MessageType, NewJob, ServiceThreshold};

/// Job persistence operations.
///
/// `claim` is the linearization point of the whole scheduler: it must be
/// transactional so that of N instances racing on the same PENDING job,
/// exactly one wins and the rest observe `StatusConflict`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new PENDING job and return its store-assigned id.
    async fn insert(&self, job: NewJob) -> Result<i64>;

    /// Fetch one job by id, `NotFound` if absent.
    async fn find(&self, id: i64) -> Result<Job>;

    /// Jobs of `message_type` eligible for dispatch: PENDING, not in the
    /// DLQ, retry budget remaining, and `next_retry_at <= due_before`.
    /// Ordered by `next_retry_at`, at most `limit` rows.
    async fn due_jobs(
        &self,
        message_type: MessageType,
        dlq_retry_limit: i32,
        due_before: i64,
        limit: i64,
    ) -> Result<Vec<Job>>;

    /// SCHEDULED jobs that have exactly exhausted their retry budget and are
    /// not yet in the DLQ.
    async fn dlq_candidates(&self, dlq_retry_limit: i32) -> Result<Vec<Job>>;

    /// Atomically move the job from PENDING to IN_PROGRESS. Returns
    /// `StatusConflict` if the job is no longer PENDING by the time the
    /// transaction re-reads it.
    async fn claim(&self, id: i64) -> Result<()>;

    /// Persist the outcome of a dispatch: status, retry_count and
    /// next_retry_at. Other columns are immutable after insert.
    async fn save(&self, job: &Job) -> Result<()>;

    /// Record the job in the dead-letter table and set its `is_dlq` flag in
    /// one transaction. Status is left untouched.
    async fn migrate_to_dlq(&self, id: i64) -> Result<()>;

    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Fields accepted by the threshold upsert API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub service_name: String,
    pub limit: i64,
    pub start_time: i64,
    pub end_time: i64,
}

/// Admission-control persistence.
#[async_trait]
pub trait ThresholdStore: Send + Sync {
    /// The threshold for `service_name` whose window covers `now`, if any.
    /// Services with no threshold row are unrestricted.
    async fn find_active(&self, service_name: &str, now: i64) -> Result<Option<ServiceThreshold>>;

    /// Count one successful completion against the threshold row.
    async fn increment_usage(&self, id: i64) -> Result<()>;

    /// Create or replace the threshold for a service and, in the same
    /// transaction, reactivate that service's DEAD jobs (back to PENDING
    /// with a reset retry count). Returns the threshold row id.
    async fn upsert(&self, update: ThresholdUpdate) -> Result<i64>;
}

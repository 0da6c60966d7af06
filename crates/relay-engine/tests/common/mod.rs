//! In-memory store and callback doubles for engine tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use relay_engine::{CallbackClient, CallbackError, CallbackOutcome, JobWorker};
use relay_lock::NoneLockFactory;
use relay_store::{
    DeadLetter, Job, JobStatus, JobStore, MessageType, NewJob, Result, ServiceThreshold,
    StoreError, ThresholdStore, ThresholdUpdate,
};

pub const LOCK_BASE: &str = "/relay/locks";
pub const DLQ_RETRY_LIMIT: i32 = 20;

/// In-memory stand-in for the Postgres store, honoring the same trait
/// contracts (claim conflicts, single DLQ record, upsert reactivation).
#[derive(Default)]
pub struct MemStore {
    jobs: Mutex<HashMap<i64, Job>>,
    next_job_id: AtomicI64,
    pub dead_letters: Mutex<Vec<DeadLetter>>,
    thresholds: Mutex<HashMap<String, ServiceThreshold>>,
    next_threshold_id: AtomicI64,
    /// When set, threshold lookups fail, as if the table were unreachable.
    pub fail_threshold_lookup: AtomicBool,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn job(&self, id: i64) -> Job {
        self.jobs.lock().unwrap().get(&id).cloned().expect("job exists")
    }

    pub fn threshold(&self, service_name: &str) -> ServiceThreshold {
        self.thresholds
            .lock()
            .unwrap()
            .get(service_name)
            .cloned()
            .expect("threshold exists")
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters.lock().unwrap().len()
    }
}

#[async_trait]
impl JobStore for MemStore {
    async fn insert(&self, new: NewJob) -> Result<i64> {
        let id = self.next_job_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let job = Job {
            id,
            payload: new.payload,
            callback_url: new.callback_url,
            status: JobStatus::Pending,
            is_dlq: false,
            retry_count: new.retry_count,
            next_retry_at: new.next_retry_at,
            service_name: new.service_name,
            user_id: new.user_id,
            message_type: new.message_type,
            frequency: new.frequency,
            count: new.count,
            time_duration: new.time_duration,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().unwrap().insert(id, job);
        Ok(id)
    }

    async fn find(&self, id: i64) -> Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    async fn due_jobs(
        &self,
        message_type: MessageType,
        dlq_retry_limit: i32,
        due_before: i64,
        limit: i64,
    ) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut due: Vec<Job> = jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Pending
                    && j.message_type == message_type
                    && !j.is_dlq
                    && j.retry_count < dlq_retry_limit
                    && j.next_retry_at <= due_before
            })
            .cloned()
            .collect();
        due.sort_by_key(|j| j.next_retry_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn dlq_candidates(&self, dlq_retry_limit: i32) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Pending
                    && j.message_type == MessageType::Scheduled
                    && !j.is_dlq
                    && j.retry_count == dlq_retry_limit
            })
            .cloned()
            .collect())
    }

    async fn claim(&self, id: i64) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        if job.status != JobStatus::Pending {
            return Err(StoreError::StatusConflict { id });
        }
        job.status = JobStatus::InProgress;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn save(&self, updated: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&updated.id)
            .ok_or(StoreError::NotFound { id: updated.id })?;
        job.status = updated.status;
        job.retry_count = updated.retry_count;
        job.next_retry_at = updated.next_retry_at;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn migrate_to_dlq(&self, id: i64) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        let now = Utc::now();
        self.dead_letters.lock().unwrap().push(DeadLetter {
            id: uuid::Uuid::new_v4(),
            job_id: id,
            is_processed: false,
            created_at: now,
            updated_at: now,
        });
        job.is_dlq = true;
        job.updated_at = now;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ThresholdStore for MemStore {
    async fn find_active(&self, service_name: &str, now: i64) -> Result<Option<ServiceThreshold>> {
        if self.fail_threshold_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidRow("threshold lookup failure injected".into()));
        }
        Ok(self
            .thresholds
            .lock()
            .unwrap()
            .get(service_name)
            .filter(|t| t.is_active_at(now))
            .cloned())
    }

    async fn increment_usage(&self, id: i64) -> Result<()> {
        let mut thresholds = self.thresholds.lock().unwrap();
        let threshold = thresholds
            .values_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound { id })?;
        threshold.count += 1;
        threshold.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert(&self, update: ThresholdUpdate) -> Result<i64> {
        let now = Utc::now();
        let id = {
            let mut thresholds = self.thresholds.lock().unwrap();
            let id = thresholds
                .get(&update.service_name)
                .map(|t| t.id)
                .unwrap_or_else(|| self.next_threshold_id.fetch_add(1, Ordering::SeqCst) + 1);
            thresholds.insert(
                update.service_name.clone(),
                ServiceThreshold {
                    id,
                    service_name: update.service_name.clone(),
                    limit: update.limit,
                    count: 0,
                    start_time: update.start_time,
                    end_time: update.end_time,
                    created_at: now,
                    updated_at: now,
                },
            );
            id
        };
        let mut jobs = self.jobs.lock().unwrap();
        for job in jobs.values_mut() {
            if job.service_name == update.service_name && job.status == JobStatus::Dead {
                job.status = JobStatus::Pending;
                job.retry_count = 0;
                job.updated_at = now;
            }
        }
        Ok(id)
    }
}

/// Callback double replaying a scripted sequence of outcomes.
pub struct ScriptedCallback {
    script: Mutex<VecDeque<std::result::Result<CallbackOutcome, CallbackError>>>,
    calls: Mutex<Vec<i64>>,
}

impl ScriptedCallback {
    pub fn new<I>(outcomes: I) -> Arc<Self>
    where
        I: IntoIterator<Item = CallbackOutcome>,
    {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().map(Ok).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn erroring() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::from([Err(CallbackError::Timeout)])),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CallbackClient for ScriptedCallback {
    async fn invoke(&self, job: &Job) -> std::result::Result<CallbackOutcome, CallbackError> {
        self.calls.lock().unwrap().push(job.id);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("callback invoked more times than scripted")
    }
}

/// A due SCHEDULED job ready for dispatch.
pub fn scheduled_job() -> NewJob {
    NewJob {
        payload: serde_json::json!({"event": "invoice.created"}),
        callback_url: "http://receiver.internal/hooks/invoice".into(),
        next_retry_at: Utc::now().timestamp(),
        retry_count: 0,
        service_name: "billing".into(),
        user_id: "user-1".into(),
        message_type: MessageType::Scheduled,
        frequency: None,
        count: -1,
        time_duration: 0,
    }
}

pub fn cron_job(count: i64, time_duration: i64) -> NewJob {
    NewJob {
        message_type: MessageType::Cron,
        frequency: Some("*/5 * * * *".into()),
        count,
        time_duration,
        ..scheduled_job()
    }
}

pub fn conditional_job(frequency: &str, anchor: i64) -> NewJob {
    NewJob {
        message_type: MessageType::Conditional,
        frequency: Some(frequency.into()),
        next_retry_at: anchor,
        ..scheduled_job()
    }
}

pub fn worker(
    store: &Arc<MemStore>,
    callback: &Arc<ScriptedCallback>,
    locks: &NoneLockFactory,
) -> JobWorker {
    JobWorker::new(
        store.clone(),
        store.clone(),
        Arc::new(locks.clone()),
        callback.clone(),
        LOCK_BASE.to_string(),
        DLQ_RETRY_LIMIT,
    )
}

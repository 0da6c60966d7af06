//! Dead-letter migration pass behavior.

mod common;

use relay_engine::dlq;
use relay_lock::{keys, LockFactory, NoneLockFactory};
use relay_store::{JobStatus, JobStore};

use common::{scheduled_job, MemStore, DLQ_RETRY_LIMIT, LOCK_BASE};

#[tokio::test]
async fn exhausted_job_is_migrated_exactly_once() {
    let store = MemStore::new();
    let locks = NoneLockFactory::new();

    let mut new = scheduled_job();
    new.retry_count = DLQ_RETRY_LIMIT;
    let id = store.insert(new).await.unwrap();

    dlq::run_pass(store.as_ref(), &locks, LOCK_BASE, DLQ_RETRY_LIMIT)
        .await
        .unwrap();
    dlq::run_pass(store.as_ref(), &locks, LOCK_BASE, DLQ_RETRY_LIMIT)
        .await
        .unwrap();

    assert_eq!(store.dead_letter_count(), 1);
    let job = store.job(id);
    assert!(job.is_dlq);
    // Migration is an audit copy; the lifecycle state is untouched.
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn jobs_below_the_limit_are_left_alone() {
    let store = MemStore::new();
    let locks = NoneLockFactory::new();

    let mut new = scheduled_job();
    new.retry_count = DLQ_RETRY_LIMIT - 1;
    let id = store.insert(new).await.unwrap();

    dlq::run_pass(store.as_ref(), &locks, LOCK_BASE, DLQ_RETRY_LIMIT)
        .await
        .unwrap();

    assert_eq!(store.dead_letter_count(), 0);
    assert!(!store.job(id).is_dlq);
}

#[tokio::test]
async fn completed_job_at_the_limit_is_not_dead_lettered() {
    let store = MemStore::new();
    let locks = NoneLockFactory::new();

    // The worker gave up on this job and closed it out.
    let mut new = scheduled_job();
    new.retry_count = DLQ_RETRY_LIMIT;
    let id = store.insert(new).await.unwrap();
    let mut job = store.job(id);
    job.status = JobStatus::Completed;
    store.save(&job).await.unwrap();

    dlq::run_pass(store.as_ref(), &locks, LOCK_BASE, DLQ_RETRY_LIMIT)
        .await
        .unwrap();

    assert_eq!(store.dead_letter_count(), 0);
    assert!(!store.job(id).is_dlq);
}

#[tokio::test]
async fn held_migration_lock_defers_to_the_holder() {
    let store = MemStore::new();
    let locks = NoneLockFactory::new();

    let mut new = scheduled_job();
    new.retry_count = DLQ_RETRY_LIMIT;
    let id = store.insert(new).await.unwrap();

    let _guard = locks
        .try_acquire(&keys::dlq_lock(LOCK_BASE, id))
        .await
        .unwrap()
        .unwrap();

    dlq::run_pass(store.as_ref(), &locks, LOCK_BASE, DLQ_RETRY_LIMIT)
        .await
        .unwrap();

    assert_eq!(store.dead_letter_count(), 0);
}

#[tokio::test]
async fn dispatch_lock_does_not_block_migration() {
    let store = MemStore::new();
    let locks = NoneLockFactory::new();

    let mut new = scheduled_job();
    new.retry_count = DLQ_RETRY_LIMIT;
    let id = store.insert(new).await.unwrap();

    // The dispatch lock for the same job id is a different name.
    let _guard = locks
        .try_acquire(&keys::job_lock(LOCK_BASE, id))
        .await
        .unwrap()
        .unwrap();

    dlq::run_pass(store.as_ref(), &locks, LOCK_BASE, DLQ_RETRY_LIMIT)
        .await
        .unwrap();

    assert_eq!(store.dead_letter_count(), 1);
}

//! Idempotent schema bootstrap, applied on startup by every instance.

/// Statements are individually idempotent so concurrent instances can race
/// on startup without failing.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id            BIGSERIAL PRIMARY KEY,
        payload       JSONB NOT NULL,
        callback_url  TEXT NOT NULL,
        status        TEXT NOT NULL,
        is_dlq        BOOLEAN NOT NULL DEFAULT FALSE,
        retry_count   INTEGER NOT NULL DEFAULT 0,
        next_retry_at BIGINT NOT NULL,
        service_name  TEXT NOT NULL,
        user_id       TEXT NOT NULL,
        message_type  TEXT NOT NULL,
        frequency     TEXT,
        count         BIGINT NOT NULL DEFAULT -1,
        time_duration BIGINT NOT NULL DEFAULT 0,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // Covers both the due scan and the DLQ scan.
    r#"
    CREATE INDEX IF NOT EXISTS idx_jobs_scan
        ON jobs (status, message_type, is_dlq, next_retry_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_jobs_service_status
        ON jobs (service_name, status)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dead_letters (
        id           UUID PRIMARY KEY,
        job_id       BIGINT NOT NULL REFERENCES jobs (id),
        is_processed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // One dead-letter record per job, ever.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_dead_letters_job
        ON dead_letters (job_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_thresholds (
        id           BIGSERIAL PRIMARY KEY,
        service_name TEXT NOT NULL UNIQUE,
        "limit"      BIGINT NOT NULL,
        count        BIGINT NOT NULL DEFAULT 0,
        start_time   BIGINT NOT NULL,
        end_time     BIGINT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

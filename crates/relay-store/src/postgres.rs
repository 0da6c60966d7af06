//! Postgres-backed store shared by all scheduler instances.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::schema::SCHEMA;
use crate::store::{JobStore, ThresholdStore, ThresholdUpdate};
use crate::types::{Job, JobStatus, MessageType, NewJob, ServiceThreshold};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply the idempotent schema. Safe to run from every instance.
    pub async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("store schema ready");
        Ok(())
    }
}

fn job_from_row(row: &PgRow) -> Result<Job> {
    let status: String = row.try_get("status")?;
    let message_type: String = row.try_get("message_type")?;
    Ok(Job {
        id: row.try_get("id")?,
        payload: row.try_get("payload")?,
        callback_url: row.try_get("callback_url")?,
        status: status.parse::<JobStatus>().map_err(StoreError::InvalidRow)?,
        is_dlq: row.try_get("is_dlq")?,
        retry_count: row.try_get("retry_count")?,
        next_retry_at: row.try_get("next_retry_at")?,
        service_name: row.try_get("service_name")?,
        user_id: row.try_get("user_id")?,
        message_type: message_type
            .parse::<MessageType>()
            .map_err(StoreError::InvalidRow)?,
        frequency: row.try_get("frequency")?,
        count: row.try_get("count")?,
        time_duration: row.try_get("time_duration")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn threshold_from_row(row: &PgRow) -> Result<ServiceThreshold> {
    Ok(ServiceThreshold {
        id: row.try_get("id")?,
        service_name: row.try_get("service_name")?,
        limit: row.try_get("limit")?,
        count: row.try_get("count")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert(&self, job: NewJob) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO jobs
                (payload, callback_url, status, retry_count, next_retry_at,
                 service_name, user_id, message_type, frequency, count, time_duration)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&job.payload)
        .bind(&job.callback_url)
        .bind(JobStatus::Pending.to_string())
        .bind(job.retry_count)
        .bind(job.next_retry_at)
        .bind(&job.service_name)
        .bind(&job.user_id)
        .bind(job.message_type.to_string())
        .bind(&job.frequency)
        .bind(job.count)
        .bind(job.time_duration)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    async fn find(&self, id: i64) -> Result<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { id })?;
        job_from_row(&row)
    }

    async fn due_jobs(
        &self,
        message_type: MessageType,
        dlq_retry_limit: i32,
        due_before: i64,
        limit: i64,
    ) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE status = $1
              AND message_type = $2
              AND is_dlq = FALSE
              AND retry_count < $3
              AND next_retry_at <= $4
            ORDER BY next_retry_at
            LIMIT $5
            "#,
        )
        .bind(JobStatus::Pending.to_string())
        .bind(message_type.to_string())
        .bind(dlq_retry_limit)
        .bind(due_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn dlq_candidates(&self, dlq_retry_limit: i32) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE status = $1
              AND message_type = $2
              AND is_dlq = FALSE
              AND retry_count = $3
            ORDER BY next_retry_at
            "#,
        )
        .bind(JobStatus::Pending.to_string())
        .bind(MessageType::Scheduled.to_string())
        .bind(dlq_retry_limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn claim(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT status FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound { id })?;
        let status: String = row.try_get("status")?;
        let status = status.parse::<JobStatus>().map_err(StoreError::InvalidRow)?;
        if status != JobStatus::Pending {
            return Err(StoreError::StatusConflict { id });
        }
        sqlx::query("UPDATE jobs SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(JobStatus::InProgress.to_string())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, job: &Job) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, retry_count = $2, next_retry_at = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(job.status.to_string())
        .bind(job.retry_count)
        .bind(job.next_retry_at)
        .bind(job.id)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: job.id });
        }
        Ok(())
    }

    async fn migrate_to_dlq(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO dead_letters (id, job_id, is_processed, created_at, updated_at)
            VALUES ($1, $2, FALSE, $3, $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        let done = sqlx::query("UPDATE jobs SET is_dlq = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ThresholdStore for PgStore {
    async fn find_active(&self, service_name: &str, now: i64) -> Result<Option<ServiceThreshold>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM service_thresholds
            WHERE service_name = $1 AND start_time <= $2 AND end_time >= $2
            "#,
        )
        .bind(service_name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(threshold_from_row).transpose()
    }

    async fn increment_usage(&self, id: i64) -> Result<()> {
        let done =
            sqlx::query("UPDATE service_thresholds SET count = count + 1, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    async fn upsert(&self, update: ThresholdUpdate) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        // Replacing a threshold resets usage for the new window.
        let row = sqlx::query(
            r#"
            INSERT INTO service_thresholds (service_name, "limit", count, start_time, end_time)
            VALUES ($1, $2, 0, $3, $4)
            ON CONFLICT (service_name) DO UPDATE
            SET "limit" = EXCLUDED."limit",
                count = 0,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(&update.service_name)
        .bind(update.limit)
        .bind(update.start_time)
        .bind(update.end_time)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = row.try_get("id")?;

        // A fresh quota revives what admission control killed.
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, retry_count = 0, updated_at = NOW()
            WHERE service_name = $2 AND status = $3
            "#,
        )
        .bind(JobStatus::Pending.to_string())
        .bind(&update.service_name)
        .bind(JobStatus::Dead.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }
}

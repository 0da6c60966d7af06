use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Dispatchable — waiting for its next_retry_at time.
    Pending,
    /// Exclusively claimed by one worker.
    InProgress,
    /// Terminal: delivered, or the retry budget was exhausted (give-up).
    Completed,
    /// Terminal: rejected by admission control. Reversible only through a
    /// threshold upsert, which reactivates the service's DEAD jobs.
    Dead,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Dead => "DEAD",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "COMPLETED" => Ok(JobStatus::Completed),
            "DEAD" => Ok(JobStatus::Dead),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Selects which scanning and rescheduling policy applies to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// One-shot deferred delivery with linear retry backoff.
    Scheduled,
    /// Recurring delivery driven by time_duration / server-supplied interval,
    /// capped by `count`.
    Cron,
    /// Recurring delivery gated by a cron expression; re-arms itself on
    /// success.
    Conditional,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageType::Scheduled => "SCHEDULED",
            MessageType::Cron => "CRON",
            MessageType::Conditional => "CONDITIONAL",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(MessageType::Scheduled),
            "CRON" => Ok(MessageType::Cron),
            "CONDITIONAL" => Ok(MessageType::Conditional),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// A persisted job record — the schedulable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Store-assigned primary key.
    pub id: i64,
    /// Opaque JSON object forwarded verbatim to the callback.
    pub payload: serde_json::Value,
    /// Absolute delivery target URL.
    pub callback_url: String,
    pub status: JobStatus,
    /// Audit flag: set exactly once when the job is shadow-copied into the
    /// dead-letter table. Orthogonal to `status`, never reset.
    pub is_dlq: bool,
    pub retry_count: i32,
    /// Epoch seconds; the job is eligible once `now >= next_retry_at`.
    pub next_retry_at: i64,
    /// Owning tenant — drives admission control and callback auth claims.
    pub service_name: String,
    pub user_id: String,
    pub message_type: MessageType,
    /// Standard cron expression (CRON/CONDITIONAL only).
    pub frequency: Option<String>,
    /// Maximum CRON executions; -1 means unbounded.
    pub count: i64,
    /// Fallback backoff interval in seconds when the callback supplies none.
    pub time_duration: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied at enqueue time; everything else is store-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub payload: serde_json::Value,
    pub callback_url: String,
    pub next_retry_at: i64,
    pub retry_count: i32,
    pub service_name: String,
    pub user_id: String,
    pub message_type: MessageType,
    pub frequency: Option<String>,
    pub count: i64,
    pub time_duration: i64,
}

/// Bookkeeping record for a job that overflowed its retry budget.
/// `is_processed` is reserved for a future reprocessing workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: uuid::Uuid,
    pub job_id: i64,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-service admission window bounding successful completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceThreshold {
    pub id: i64,
    pub service_name: String,
    /// Maximum successful completions within the window.
    pub limit: i64,
    /// Current usage within the window.
    pub count: i64,
    /// Epoch-seconds window bounds, inclusive.
    pub start_time: i64,
    pub end_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceThreshold {
    /// Whether another completion is admissible.
    pub fn is_within_limit(&self) -> bool {
        self.count < self.limit
    }

    pub fn is_active_at(&self, now: i64) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

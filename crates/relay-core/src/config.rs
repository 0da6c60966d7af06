use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Engine timing constants — shared by the dispatcher and its tests.
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 1_000; // due-scan cadence
pub const DEFAULT_DLQ_INTERVAL_MS: u64 = 2_300; // dead-letter scan cadence
pub const DEFAULT_DLQ_RETRY_LIMIT: i32 = 20; // retries before dead-lettering
pub const DEFAULT_PAGE_SIZE: i64 = 100; // max rows per due-scan query
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64; // bounded per-tick fan-out
pub const DISPATCH_FORWARD_GUARD_SECS: i64 = 1; // due-scan looks this far ahead

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string shared by every scheduler instance.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Settings for the coordination service backing the distributed lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default = "default_etcd_endpoints")]
    pub endpoints: Vec<String>,
    /// Session lease TTL — stranded locks expire this many seconds after the
    /// owning process dies.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: i64,
    #[serde(default = "default_lock_base_path")]
    pub lock_base_path: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            endpoints: default_etcd_endpoints(),
            lease_ttl_secs: default_lease_ttl_secs(),
            lock_base_path: default_lock_base_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    #[serde(default = "default_dlq_interval_ms")]
    pub dlq_interval_ms: u64,
    /// Page limit for each due-scan query.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Retry count at which a job is migrated to the dead-letter table.
    #[serde(default = "default_dlq_retry_limit")]
    pub dlq_retry_limit: i32,
    /// Maximum concurrent per-job units across all scan categories.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            dlq_interval_ms: default_dlq_interval_ms(),
            page_size: default_page_size(),
            dlq_retry_limit: default_dlq_retry_limit(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base64-encoded HS512 signing secret for internal API tokens.
    pub secret: String,
    #[serde(default = "default_token_ttl_ms")]
    pub token_ttl_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_max_connections() -> u32 {
    8
}
fn default_etcd_endpoints() -> Vec<String> {
    vec!["http://127.0.0.1:2379".to_string()]
}
fn default_lease_ttl_secs() -> i64 {
    10
}
fn default_lock_base_path() -> String {
    "/relay/locks".to_string()
}
fn default_scan_interval_ms() -> u64 {
    DEFAULT_SCAN_INTERVAL_MS
}
fn default_dlq_interval_ms() -> u64 {
    DEFAULT_DLQ_INTERVAL_MS
}
fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}
fn default_dlq_retry_limit() -> i32 {
    DEFAULT_DLQ_RETRY_LIMIT
}
fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}
fn default_token_ttl_ms() -> u64 {
    30_000
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ./relay.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("relay.toml");

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("RELAY_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configs that cannot possibly run. Called once at startup;
    /// failures here terminate the process.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.database.url.is_empty() {
            return Err(crate::error::CoreError::Config(
                "database.url must be set".into(),
            ));
        }
        if self.auth.secret.is_empty() {
            return Err(crate::error::CoreError::Config(
                "auth.secret must be set".into(),
            ));
        }
        if self.scheduler.max_in_flight == 0 {
            return Err(crate::error::CoreError::Config(
                "scheduler.max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

use thiserror::Error;

/// Errors that can occur while delivering one callback.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Token error: {0}")]
    Token(#[from] relay_core::CoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The 60s delivery deadline elapsed before a response arrived.
    #[error("Callback deadline exceeded")]
    Timeout,
}

/// Errors that can occur within the dispatch engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] relay_store::StoreError),

    #[error("Lock error: {0}")]
    Lock(#[from] relay_lock::LockError),

    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),

    /// A recurring job carries a missing or unparseable cron expression.
    #[error("Invalid schedule: {0}")]
    Schedule(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

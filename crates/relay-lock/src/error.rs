use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Coordination backend unavailable: {0}")]
    Backend(#[from] etcd_client::Error),
}

pub type Result<T> = std::result::Result<T, LockError>;

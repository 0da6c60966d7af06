use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A required setting is missing or malformed. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing or verification of an internal API token failed.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

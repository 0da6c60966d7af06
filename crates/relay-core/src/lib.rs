pub mod config;
pub mod error;
pub mod token;

pub use config::RelayConfig;
pub use error::{CoreError, Result};
pub use token::{TokenClaims, TokenIssuer, TOKEN_HEADER};

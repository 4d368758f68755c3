use thiserror::Error;

/// Errors raised by the account pool and its collaborators.
///
/// Only `PoolLoad` is fatal. Everything else is logged at the point where
/// it happens and the surrounding batch carries on.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to load account pool: {0}")]
    PoolLoad(String),

    #[error("funding {account} failed: {reason}")]
    Funding { account: String, reason: String },

    #[error("network query failed: {0}")]
    NetworkQuery(String),

    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl PoolError {
    pub fn funding(account: &str, reason: impl ToString) -> Self {
        PoolError::Funding {
            account: account.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that must stop initialization
    pub fn is_fatal(&self) -> bool {
        matches!(self, PoolError::PoolLoad(_))
    }
}

impl From<reqwest::Error> for PoolError {
    fn from(err: reqwest::Error) -> Self {
        PoolError::NetworkQuery(err.to_string())
    }
}

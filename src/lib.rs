// Core modules
pub mod config;
pub mod error;
pub mod funding;
pub mod ledger;
pub mod models;
pub mod pool;
pub mod random;
pub mod risk;
pub mod store;

// Re-export commonly used types
pub use crate::config::{BreakerConfig, PoolConfig};
pub use error::PoolError;
pub use models::*;
pub use pool::PoolManager;
pub use risk::{BreakerVerdict, CircuitBreaker};

// Error handling
pub type Result<T, E = PoolError> = std::result::Result<T, E>;

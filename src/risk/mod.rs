// Risk management module
pub mod circuit_breaker;

pub use circuit_breaker::{BreakerState, BreakerVerdict, CircuitBreaker};

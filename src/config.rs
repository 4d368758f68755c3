use crate::Result;
use config::{Config, Environment};
use serde::{Deserialize, Serialize};

/// Circuit breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub enabled: bool,
    pub max_consecutive_failures: u32,
    pub failure_rate_window: usize,
    pub max_failure_rate: f64,
    pub emergency_stop_loss: f64,
    pub balance_check_interval: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_consecutive_failures: 5, // 5 failures in a row
            failure_rate_window: 20,
            max_failure_rate: 0.5,       // >50% of the window failing
            emergency_stop_loss: 0.2,    // -20% on the sink
            balance_check_interval: 10,  // query the sink every 10th evaluation
        }
    }
}

/// Pool, funding and scheduling options
///
/// Amounts are in the ledger's smallest unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub target_pool_size: usize,
    pub funding_target: u64,
    pub min_buffer: u64,
    pub priority_fee: u64,
    pub funding_batch_size: usize,
    pub transfers_per_second: u32,
    pub generation_batch_size: usize,
    pub cooldown_min_ms: u64,
    pub cooldown_max_ms: u64,
    pub max_cooldown_age_ms: u64,
    pub shuffle_on_select: bool,
    pub batch_size: usize,
    pub concurrency: usize,
    pub auto_scale: bool,
    pub treasury_keys: Vec<String>,
    pub sink_account: Option<String>,
    pub rpc_url: Option<String>,
    pub store_path: String,
    pub redis_url: Option<String>,
    pub breaker: BreakerConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_pool_size: 100,
            funding_target: 50_000_000,
            min_buffer: 1_000_000,
            priority_fee: 5_000,
            funding_batch_size: 50,
            transfers_per_second: 5,
            generation_batch_size: 1000,
            cooldown_min_ms: 30_000,
            cooldown_max_ms: 90_000,
            max_cooldown_age_ms: 3_600_000, // 1 hour
            shuffle_on_select: true,
            batch_size: 5,
            concurrency: 3,
            auto_scale: true,
            treasury_keys: Vec::new(),
            sink_account: None,
            rpc_url: None,
            store_path: "wallets.json".to_string(),
            redis_url: None,
            breaker: BreakerConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Load from `POOL_*` environment variables layered over the defaults
    ///
    /// Nested breaker options use a double underscore, e.g.
    /// `POOL_BREAKER__MAX_CONSECUTIVE_FAILURES=3`. `POOL_TREASURY_KEYS` is a
    /// comma separated list.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let env = env
            .prefix("POOL")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("treasury_keys")
            .try_parsing(true);

        let settings = Config::builder()
            .add_source(Config::try_from(&PoolConfig::default())?)
            .add_source(env)
            .build()?;

        let cfg: PoolConfig = settings.try_deserialize()?;
        tracing::debug!(
            "Loaded config: target_pool_size={}, funding_target={}, breaker.enabled={}",
            cfg.target_pool_size,
            cfg.funding_target,
            cfg.breaker.enabled
        );
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_with(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults_without_env() {
        let cfg = PoolConfig::from_environment(env_with(&[])).unwrap();
        assert_eq!(cfg.target_pool_size, 100);
        assert_eq!(cfg.funding_batch_size, 50);
        assert!(cfg.treasury_keys.is_empty());
        assert!(cfg.sink_account.is_none());
        assert_eq!(cfg.breaker.max_consecutive_failures, 5);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = PoolConfig::from_environment(env_with(&[
            ("POOL_TARGET_POOL_SIZE", "2500"),
            ("POOL_SHUFFLE_ON_SELECT", "false"),
            ("POOL_TREASURY_KEYS", "key-a,key-b"),
            ("POOL_SINK_ACCOUNT", "SinkPubkey111"),
            ("POOL_BREAKER__MAX_CONSECUTIVE_FAILURES", "3"),
        ]))
        .unwrap();

        assert_eq!(cfg.target_pool_size, 2500);
        assert!(!cfg.shuffle_on_select);
        assert_eq!(cfg.treasury_keys, vec!["key-a".to_string(), "key-b".to_string()]);
        assert_eq!(cfg.sink_account.as_deref(), Some("SinkPubkey111"));
        assert_eq!(cfg.breaker.max_consecutive_failures, 3);
        // Untouched nested values keep their defaults
        assert_eq!(cfg.breaker.failure_rate_window, 20);
    }
}

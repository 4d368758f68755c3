use crate::models::AccountRecord;
use crate::store::AccountStore;
use crate::Result;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

const DEFAULT_KEY: &str = "walletpool:records";

/// Redis persistence for the account list
///
/// The whole pool is one JSON array under a single key, replaced on save.
pub struct RedisAccountStore {
    conn: ConnectionManager,
    key: String,
}

impl RedisAccountStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                crate::PoolError::PoolLoad("Redis connection timeout after 5 seconds".to_string())
            })??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            key: DEFAULT_KEY.to_string(),
        })
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

impl AccountStore for RedisAccountStore {
    async fn load_records(&self) -> Result<Vec<AccountRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&self.key).await?;

        let records = match raw {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };

        tracing::info!("Loaded {} records from Redis key {}", records.len(), self.key);
        Ok(records)
    }

    async fn save_records(&self, records: &[AccountRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&self.key, json).await?;

        tracing::debug!("Saved {} records to Redis key {}", records.len(), self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyMaterial;

    // These tests require Redis running locally
    // Run with: cargo test --lib store::redis_store -- --ignored

    #[tokio::test]
    #[ignore]
    async fn test_redis_round_trip() {
        let store = RedisAccountStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Redis not available")
            .with_key(format!("walletpool:test:{}", uuid::Uuid::new_v4()));

        let records = vec![AccountRecord::new("A1", KeyMaterial::new("k1"), "wallet-0")];
        store.save_records(&records).await.unwrap();

        assert_eq!(store.load_records().await.unwrap(), records);
    }
}

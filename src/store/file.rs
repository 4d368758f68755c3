use crate::models::AccountRecord;
use crate::store::AccountStore;
use crate::Result;
use std::path::PathBuf;

/// Account records as a JSON array on disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AccountStore for JsonFileStore {
    async fn load_records(&self) -> Result<Vec<AccountRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No wallet file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<AccountRecord> = serde_json::from_str(&raw)?;
        tracing::info!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }

    async fn save_records(&self, records: &[AccountRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;

        // Write then rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyMaterial;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("walletpool-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let store = JsonFileStore::new(temp_path());
        let records = tokio_test::block_on(store.load_records()).unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let path = temp_path();
        let store = JsonFileStore::new(&path);
        let records = vec![
            AccountRecord::new("A1", KeyMaterial::new("k1"), "wallet-0"),
            AccountRecord::new("A2", KeyMaterial::new("k2"), "wallet-1"),
        ];

        store.save_records(&records).await.unwrap();
        let loaded = store.load_records().await.unwrap();

        assert_eq!(loaded, records);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = temp_path();
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load_records().await.is_err());
        let _ = tokio::fs::remove_file(&path).await;
    }
}

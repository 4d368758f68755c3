// Account record persistence
pub mod file;
pub mod redis_store;

pub use self::file::JsonFileStore;
pub use self::redis_store::RedisAccountStore;

use crate::models::AccountRecord;
use crate::Result;
use std::future::Future;
use std::sync::Mutex;

/// Load/save collaborator for the full account list
pub trait AccountStore: Send + Sync {
    fn load_records(&self) -> impl Future<Output = Result<Vec<AccountRecord>>> + Send;

    fn save_records(&self, records: &[AccountRecord]) -> impl Future<Output = Result<()>> + Send;
}

/// Store that keeps records in memory
///
/// `failing()` builds a store whose load always errors.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AccountRecord>>,
    fail_load: bool,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(records: Vec<AccountRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Vec<AccountRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| *s).unwrap_or(0)
    }
}

impl AccountStore for MemoryStore {
    async fn load_records(&self) -> Result<Vec<AccountRecord>> {
        if self.fail_load {
            return Err(crate::PoolError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store configured to fail",
            )));
        }
        Ok(self.snapshot())
    }

    async fn save_records(&self, records: &[AccountRecord]) -> Result<()> {
        if let Ok(mut stored) = self.records.lock() {
            *stored = records.to_vec();
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

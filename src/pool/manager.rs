use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::funding::{FundingDistributor, FundingReport};
use crate::ledger::LedgerClient;
use crate::models::{AccountRecord, SinkAccount, TreasurySource};
use crate::pool::tracker::{CooldownTracker, MaintenanceSchedule};
use crate::random::{RandomSource, ThreadRandom};
use crate::store::AccountStore;
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// What `load_or_generate` did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub duplicates_dropped: usize,
    pub generated: usize,
    pub funding: FundingReport,
}

/// Owns the account pool and decides which accounts act each cycle
pub struct PoolManager<L: LedgerClient, S: AccountStore> {
    config: PoolConfig,
    ledger: Arc<L>,
    store: S,
    records: Vec<AccountRecord>,
    treasury: Vec<TreasurySource>,
    sink: Option<SinkAccount>,
    tracker: CooldownTracker,
    distributor: FundingDistributor<L>,
    rng: Box<dyn RandomSource>,
    active: Vec<String>,
    batch_size: usize,
    concurrency: usize,
}

impl<L: LedgerClient, S: AccountStore> PoolManager<L, S> {
    pub fn new(config: PoolConfig, ledger: Arc<L>, store: S) -> Self {
        Self::with_random(config, ledger, store, Box::new(ThreadRandom::new()))
    }

    pub fn with_random(config: PoolConfig, ledger: Arc<L>, store: S, rng: Box<dyn RandomSource>) -> Self {
        let tracker = CooldownTracker::new(
            config.cooldown_min_ms,
            config.cooldown_max_ms,
            config.max_cooldown_age_ms,
        );
        let distributor = FundingDistributor::new(ledger.clone(), &config);

        Self {
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
            config,
            ledger,
            store,
            records: Vec::new(),
            treasury: Vec::new(),
            sink: None,
            tracker,
            distributor,
            rng,
            active: Vec::new(),
        }
    }

    pub fn with_maintenance(mut self, schedule: MaintenanceSchedule) -> Self {
        self.tracker = self.tracker.with_schedule(schedule);
        self
    }

    /// Load, normalize, top up to the target size, then fund the pool
    ///
    /// Only a store failure is an error. Missing treasury or sink config
    /// is logged and the dependent feature stays off.
    pub async fn load_or_generate(&mut self) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();

        let loaded = self
            .store
            .load_records()
            .await
            .map_err(|e| PoolError::PoolLoad(e.to_string()))?;
        summary.loaded = loaded.len();

        let mut seen = HashSet::with_capacity(loaded.len().max(self.config.target_pool_size));
        let mut records = Vec::with_capacity(self.config.target_pool_size);

        for (i, record) in loaded.into_iter().enumerate() {
            let record = match self.normalize(record, i) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Dropping unreadable record #{}: {}", i, e);
                    continue;
                }
            };
            if seen.insert(record.public_id.clone()) {
                records.push(record);
            } else {
                summary.duplicates_dropped += 1;
            }
        }

        if summary.duplicates_dropped > 0 {
            tracing::warn!("Dropped {} duplicate accounts", summary.duplicates_dropped);
        }

        if records.len() < self.config.target_pool_size {
            summary.generated = self.generate_missing(&mut records, &mut seen).await;
            self.store
                .save_records(&records)
                .await
                .map_err(|e| PoolError::PoolLoad(format!("saving generated accounts: {}", e)))?;
        }

        self.records = records;
        tracing::info!(
            "📒 Pool ready: {} accounts ({} loaded, {} generated)",
            self.records.len(),
            summary.loaded,
            summary.generated
        );

        self.load_funding_accounts();

        if self.config.auto_scale {
            self.auto_scale();
        }

        summary.funding = self.distributor.fund_all(&self.records, &self.treasury).await;

        Ok(summary)
    }

    /// Accounts that may act this cycle, possibly none
    pub fn select_active_batch(&mut self, now: DateTime<Utc>) -> Vec<AccountRecord> {
        self.tracker.cleanup(now);

        let mut eligible: Vec<&AccountRecord> = Vec::new();
        for record in &self.records {
            if self.tracker.is_ready(&record.public_id, now, self.rng.as_mut()) {
                eligible.push(record);
            }
        }

        if self.config.shuffle_on_select {
            // Fisher-Yates
            for i in (1..eligible.len()).rev() {
                let j = self.rng.index(i + 1);
                eligible.swap(i, j);
            }
        }

        eligible.truncate(self.batch_size);
        let batch: Vec<AccountRecord> = eligible.into_iter().cloned().collect();

        self.active = batch.iter().map(|r| r.public_id.clone()).collect();
        if batch.is_empty() {
            tracing::debug!("No eligible accounts this cycle");
        }

        batch
    }

    pub fn mark_used(&mut self, id: &str) {
        self.mark_used_at(id, Utc::now());
    }

    pub fn mark_used_at(&mut self, id: &str, now: DateTime<Utc>) {
        self.tracker.mark_used(id, now);
    }

    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    pub fn active_ids(&self) -> &[String] {
        &self.active
    }

    pub fn treasury(&self) -> &[TreasurySource] {
        &self.treasury
    }

    pub fn sink(&self) -> Option<&SinkAccount> {
        self.sink.as_ref()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Suggested number of concurrent trade tasks for the orchestrator
    pub fn trade_concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tracker(&self) -> &CooldownTracker {
        &self.tracker
    }

    pub fn distributor(&self) -> &FundingDistributor<L> {
        &self.distributor
    }

    fn normalize(&self, mut record: AccountRecord, index: usize) -> Result<AccountRecord> {
        if record.public_id.is_empty() {
            record.public_id = self.ledger.derive_public_id(&record.key_material)?;
        }
        if record.display_name.is_empty() {
            record.display_name = format!("wallet-{}", index);
        }
        Ok(record)
    }

    async fn generate_missing(&self, records: &mut Vec<AccountRecord>, seen: &mut HashSet<String>) -> usize {
        let target = self.config.target_pool_size;
        let batch = self.config.generation_batch_size.max(1);
        let start = records.len();

        tracing::info!("Generating {} accounts (batches of {})", target - start, batch);

        while records.len() < target {
            let end = (records.len() + batch).min(target);
            while records.len() < end {
                let (public_id, key_material) = self.ledger.generate_keypair();
                if !seen.insert(public_id.clone()) {
                    continue;
                }
                let name = format!("wallet-{}", records.len());
                records.push(AccountRecord::new(public_id, key_material, name));
            }

            tracing::debug!("Generated {}/{}", records.len(), target);
            tokio::task::yield_now().await;
        }

        records.len() - start
    }

    fn load_funding_accounts(&mut self) {
        self.treasury = self
            .config
            .treasury_keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let key_material = crate::models::KeyMaterial::new(key.clone());
                match self.ledger.derive_public_id(&key_material) {
                    Ok(public_id) => Some(TreasurySource {
                        public_id,
                        key_material,
                    }),
                    Err(e) => {
                        tracing::warn!("Ignoring treasury key #{}: {}", i, e);
                        None
                    }
                }
            })
            .collect();

        if self.treasury.is_empty() {
            let err = PoolError::ConfigMissing("treasury_keys".to_string());
            tracing::warn!("⚠️  {}: funding disabled, pool remains usable", err);
        } else {
            tracing::info!("Loaded {} treasury sources", self.treasury.len());
        }

        self.sink = self
            .config
            .sink_account
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(|id| SinkAccount {
                public_id: id.clone(),
            });

        if self.sink.is_none() {
            let err = PoolError::ConfigMissing("sink_account".to_string());
            tracing::warn!("⚠️  {}: emergency stop-loss disabled", err);
        }
    }

    fn auto_scale(&mut self) {
        let (concurrency, batch_size) = scaled_parameters(self.records.len());
        self.concurrency = concurrency;
        self.batch_size = batch_size;
        tracing::info!(
            "Auto-scaled for {} accounts: concurrency={}, batch_size={}",
            self.records.len(),
            concurrency,
            batch_size
        );
    }
}

/// (concurrency, batch size) for a pool of `pool_size` accounts
pub fn scaled_parameters(pool_size: usize) -> (usize, usize) {
    let concurrency = (pool_size / 200 + 3).clamp(3, 50);
    let batch_size = (pool_size / 300 + 2).clamp(2, 20);
    (concurrency, batch_size)
}

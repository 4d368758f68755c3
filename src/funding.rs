use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::ledger::LedgerClient;
use crate::models::{AccountRecord, TreasurySource};
use crate::Result;
use futures_util::future::join_all;
use governor::{Quota, RateLimiter};
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Type alias for the rate limiter to simplify signatures
type TransferRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Result of a single funding attempt that did not error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingOutcome {
    /// A transfer covering the shortfall was confirmed
    Funded { amount: u64, signature: String },
    /// Balance already within 80% of target, or shortfall below the buffer
    AlreadyFunded { balance: u64 },
    /// Another attempt claimed this account earlier in the run
    AlreadyClaimed,
}

/// Tally for one `fund_all` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FundingReport {
    pub funded: usize,
    pub already_funded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_transferred: u64,
}

/// Tops up pool accounts from treasury sources
///
/// Every account is claimed in the funded set before any network call and
/// the claim is never released, so an account gets at most one attempt per
/// run, even if that attempt fails.
pub struct FundingDistributor<L: LedgerClient> {
    ledger: Arc<L>,
    funded: Mutex<HashSet<String>>,
    next_treasury: AtomicUsize,
    rate_limiter: Arc<TransferRateLimiter>,
    funding_target: u64,
    min_buffer: u64,
    priority_fee: u64,
    batch_size: usize,
}

impl<L: LedgerClient> FundingDistributor<L> {
    pub fn new(ledger: Arc<L>, config: &PoolConfig) -> Self {
        let per_second = NonZeroU32::new(config.transfers_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Self {
            ledger,
            funded: Mutex::new(HashSet::new()),
            next_treasury: AtomicUsize::new(0),
            rate_limiter,
            funding_target: config.funding_target,
            min_buffer: config.min_buffer,
            priority_fee: config.priority_fee,
            batch_size: config.funding_batch_size.max(1),
        }
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.lock_funded().contains(id)
    }

    pub fn claimed_count(&self) -> usize {
        self.lock_funded().len()
    }

    /// Fund every record in sequential batches
    ///
    /// Records within a batch run concurrently, and a batch fully settles
    /// before the next one starts. Per-account failures are logged and
    /// counted, never propagated.
    pub async fn fund_all(&self, records: &[AccountRecord], treasury: &[TreasurySource]) -> FundingReport {
        let mut report = FundingReport::default();

        if treasury.is_empty() {
            tracing::warn!(
                "No treasury sources configured, skipping funding for {} accounts",
                records.len()
            );
            return report;
        }

        let batches = records.len().div_ceil(self.batch_size);
        for (i, batch) in records.chunks(self.batch_size).enumerate() {
            let results = join_all(batch.iter().map(|r| self.fund_one(r, treasury))).await;

            for (record, result) in batch.iter().zip(results) {
                match result {
                    Ok(FundingOutcome::Funded { amount, .. }) => {
                        report.funded += 1;
                        report.total_transferred += amount;
                    }
                    Ok(FundingOutcome::AlreadyFunded { .. }) => report.already_funded += 1,
                    Ok(FundingOutcome::AlreadyClaimed) => report.skipped += 1,
                    Err(e) => {
                        tracing::error!("❌ {} ({}): {}", record.display_name, record.public_id, e);
                        report.failed += 1;
                    }
                }
            }

            tracing::debug!("Funding batch {}/{} settled", i + 1, batches);
        }

        tracing::info!(
            "💰 Funding pass done: funded={}, already_funded={}, skipped={}, failed={}, transferred={}",
            report.funded,
            report.already_funded,
            report.skipped,
            report.failed,
            report.total_transferred
        );

        report
    }

    /// Fund one account up to the target
    pub async fn fund_one(&self, record: &AccountRecord, treasury: &[TreasurySource]) -> Result<FundingOutcome> {
        let id = record.public_id.as_str();

        // Claim before any await so concurrent duplicates see it
        if !self.claim(id) {
            return Ok(FundingOutcome::AlreadyClaimed);
        }

        let balance = self
            .ledger
            .get_balance(id)
            .await
            .map_err(|e| PoolError::funding(&record.display_name, e))?;

        // balance >= 80% of target
        if u128::from(balance) * 5 >= u128::from(self.funding_target) * 4 {
            tracing::debug!("{} already funded ({} lamports)", record.display_name, balance);
            return Ok(FundingOutcome::AlreadyFunded { balance });
        }

        let shortfall = self.funding_target - balance;
        if shortfall < self.min_buffer {
            return Ok(FundingOutcome::AlreadyFunded { balance });
        }

        let source = self
            .pick_treasury(treasury)
            .ok_or_else(|| PoolError::funding(&record.display_name, "no treasury sources"))?;

        self.rate_limiter.until_ready().await;

        let confirmation = self
            .ledger
            .submit_transfer(source, id, shortfall, self.priority_fee)
            .await
            .map_err(|e| PoolError::funding(&record.display_name, e))?;

        tracing::info!(
            "Funded {} with {} from {} ({})",
            record.display_name,
            shortfall,
            source.public_id,
            confirmation.signature
        );

        Ok(FundingOutcome::Funded {
            amount: shortfall,
            signature: confirmation.signature,
        })
    }

    /// Insert `id` into the funded set, false if it was already there
    fn claim(&self, id: &str) -> bool {
        self.lock_funded().insert(id.to_string())
    }

    /// Round-robin over the treasury list
    fn pick_treasury<'a>(&self, treasury: &'a [TreasurySource]) -> Option<&'a TreasurySource> {
        if treasury.is_empty() {
            return None;
        }
        let i = self.next_treasury.fetch_add(1, Ordering::Relaxed) % treasury.len();
        treasury.get(i)
    }

    fn lock_funded(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.funded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// Ledger network collaborators
pub mod rpc;
pub mod simulated;

pub use rpc::RpcBalanceClient;
pub use simulated::SimulatedLedger;

use crate::models::{Confirmation, KeyMaterial, TreasurySource};
use crate::Result;
use std::future::Future;

/// Read-only balance lookups
pub trait BalanceQuery: Send + Sync {
    /// Balance of `account` in the smallest currency unit
    fn get_balance(&self, account: &str) -> impl Future<Output = Result<u64>> + Send;
}

/// Full client used for pool generation and funding
///
/// Timeouts and retries are the implementation's business.
pub trait LedgerClient: BalanceQuery {
    /// Submit a transfer and wait until the network confirms it
    fn submit_transfer(
        &self,
        from: &TreasurySource,
        to: &str,
        amount: u64,
        priority_fee: u64,
    ) -> impl Future<Output = Result<Confirmation>> + Send;

    fn generate_keypair(&self) -> (String, KeyMaterial);

    fn derive_public_id(&self, key: &KeyMaterial) -> Result<String>;
}

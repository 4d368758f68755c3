use crate::error::PoolError;
use crate::ledger::{BalanceQuery, LedgerClient};
use crate::models::{Confirmation, KeyMaterial, TreasurySource};
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const SIM_ID_PREFIX: &str = "Sim";

/// A transfer accepted by the simulated ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimTransfer {
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub priority_fee: u64,
}

#[derive(Default)]
struct SimState {
    balances: HashMap<String, u64>,
    balance_queries: HashMap<String, usize>,
    transfers: Vec<SimTransfer>,
    failing_balance: HashSet<String>,
    failing_transfers: HashSet<String>,
}

/// In-memory ledger for dry runs and tests
///
/// Treasury accounts without a balance entry are treated as unlimited.
/// Records every balance query and transfer for inspection.
#[derive(Default)]
pub struct SimulatedLedger {
    state: Mutex<SimState>,
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, account: &str, amount: u64) {
        self.lock().balances.insert(account.to_string(), amount);
    }

    /// Make every balance query for `account` fail
    pub fn fail_balance_for(&self, account: &str) {
        self.lock().failing_balance.insert(account.to_string());
    }

    /// Make every transfer into `account` fail
    pub fn fail_transfers_to(&self, account: &str) {
        self.lock().failing_transfers.insert(account.to_string());
    }

    pub fn balance_queries(&self, account: &str) -> usize {
        self.lock().balance_queries.get(account).copied().unwrap_or(0)
    }

    pub fn transfers(&self) -> Vec<SimTransfer> {
        self.lock().transfers.clone()
    }

    pub fn transfers_to(&self, account: &str) -> Vec<SimTransfer> {
        self.lock()
            .transfers
            .iter()
            .filter(|t| t.to == account)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // A poisoned lock only means a test panicked mid-update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BalanceQuery for SimulatedLedger {
    async fn get_balance(&self, account: &str) -> Result<u64> {
        let mut state = self.lock();
        *state.balance_queries.entry(account.to_string()).or_insert(0) += 1;

        if state.failing_balance.contains(account) {
            return Err(PoolError::NetworkQuery(format!(
                "simulated getBalance failure for {}",
                account
            )));
        }

        Ok(state.balances.get(account).copied().unwrap_or(0))
    }
}

impl LedgerClient for SimulatedLedger {
    async fn submit_transfer(
        &self,
        from: &TreasurySource,
        to: &str,
        amount: u64,
        priority_fee: u64,
    ) -> Result<Confirmation> {
        let mut state = self.lock();

        if state.failing_transfers.contains(to) {
            return Err(PoolError::NetworkQuery(format!(
                "simulated transfer failure to {}",
                to
            )));
        }

        if let Some(available) = state.balances.get(&from.public_id).copied() {
            let cost = amount + priority_fee;
            if available < cost {
                return Err(PoolError::NetworkQuery(format!(
                    "treasury {} has {} but transfer needs {}",
                    from.public_id, available, cost
                )));
            }
            state.balances.insert(from.public_id.clone(), available - cost);
        }

        *state.balances.entry(to.to_string()).or_insert(0) += amount;
        state.transfers.push(SimTransfer {
            from: from.public_id.clone(),
            to: to.to_string(),
            amount,
            priority_fee,
        });

        Ok(Confirmation {
            signature: format!("simsig-{}", state.transfers.len()),
        })
    }

    fn generate_keypair(&self) -> (String, KeyMaterial) {
        let key = KeyMaterial::new(uuid::Uuid::new_v4().simple().to_string());
        let public_id = sim_public_id(&key);
        (public_id, key)
    }

    fn derive_public_id(&self, key: &KeyMaterial) -> Result<String> {
        if key.expose().is_empty() {
            return Err(PoolError::PoolLoad("empty key material".to_string()));
        }
        Ok(sim_public_id(key))
    }
}

fn sim_public_id(key: &KeyMaterial) -> String {
    let reversed: String = key.expose().chars().rev().collect();
    format!("{}{}", SIM_ID_PREFIX, reversed)
}

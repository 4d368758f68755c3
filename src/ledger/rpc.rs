use crate::error::PoolError;
use crate::ledger::BalanceQuery;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// JSON-RPC balance client (Solana `getBalance` shape)
#[derive(Clone)]
pub struct RpcBalanceClient {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<BalanceResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcBalanceClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

impl BalanceQuery for RpcBalanceClient {
    async fn get_balance(&self, account: &str) -> Result<u64> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getBalance",
            "params": [account],
        });

        let response = self.client.post(&self.url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(PoolError::NetworkQuery(format!(
                "getBalance({}) returned HTTP {}",
                account,
                response.status()
            )));
        }

        let parsed: RpcResponse = response.json().await?;

        if let Some(err) = parsed.error {
            return Err(PoolError::NetworkQuery(format!(
                "getBalance({}) rpc error {}: {}",
                account, err.code, err.message
            )));
        }

        parsed
            .result
            .map(|r| r.value)
            .ok_or_else(|| PoolError::NetworkQuery(format!("getBalance({}) empty result", account)))
    }
}

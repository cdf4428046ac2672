//! Insight REST client: UTXO listing, raw transaction broadcast, and
//! transaction status, plus the bounded deposit-watch loop. The loop lives
//! behind the [`CoreChainApi`] trait so the bridge can run against a mock
//! chain in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::clients::{ClientError, error_for_status};
use crate::model::utxo::Utxo;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TxStatus {
    pub txid: String,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub txlock: bool,
}

#[async_trait]
pub trait CoreChainApi: Send + Sync {
    async fn utxos_for_address(&self, address: &str) -> Result<Vec<Utxo>, ClientError>;
    /// Broadcasts a raw transaction, returning the txid Insight reports.
    async fn broadcast_transaction(&self, raw_hex: &str) -> Result<String, ClientError>;
    async fn transaction_status(&self, txid: &str) -> Result<TxStatus, ClientError>;
}

pub struct InsightClient {
    base_url: String,
    client: reqwest::Client,
}

impl InsightClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        InsightClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CoreChainApi for InsightClient {
    async fn utxos_for_address(&self, address: &str) -> Result<Vec<Utxo>, ClientError> {
        let url = format!("{}/addr/{}/utxo", self.base_url, address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        error_for_status(response)
            .await?
            .json::<Vec<Utxo>>()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))
    }

    async fn broadcast_transaction(&self, raw_hex: &str) -> Result<String, ClientError> {
        #[derive(Deserialize)]
        struct SendResponse {
            txid: String,
        }

        let url = format!("{}/tx/send", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "rawtx": raw_hex }))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let parsed: SendResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;
        Ok(parsed.txid)
    }

    async fn transaction_status(&self, txid: &str) -> Result<TxStatus, ClientError> {
        let url = format!("{}/tx/{}", self.base_url, txid);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))
    }
}

/// Outcome of a deposit watch. A timeout is a value, not an error, so the
/// state machine can branch to its recheck path; `total_amount` lets the
/// presenter distinguish "nothing arrived" from "deposit below minimum".
#[derive(Debug, Clone, PartialEq)]
pub struct DepositWatch {
    pub utxo: Option<Utxo>,
    pub total_amount: u64,
    pub timed_out: bool,
}

pub const DEFAULT_DEPOSIT_TIMEOUT: Duration = Duration::from_millis(120_000);
pub const DEFAULT_DEPOSIT_POLL_INTERVAL: Duration = Duration::from_millis(3_000);

/// Polls `api` for UTXOs on `address` until their aggregate value reaches
/// `min_value` or `timeout` elapses. Per-poll errors are logged and
/// tolerated; `on_progress` fires on each poll with the remaining time and
/// the aggregate seen so far.
pub async fn wait_for_utxo(
    api: &dyn CoreChainApi,
    address: &str,
    min_value: u64,
    timeout: Duration,
    poll_interval: Duration,
    mut on_progress: impl FnMut(Duration, u64) + Send,
) -> DepositWatch {
    let started = tokio::time::Instant::now();
    let mut total_amount = 0u64;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            break;
        }

        match api.utxos_for_address(address).await {
            Ok(utxos) => {
                total_amount = utxos.iter().map(|u| u.satoshis).sum();
                if total_amount >= min_value {
                    let selected = select_deposit_utxo(utxos, min_value);
                    return DepositWatch {
                        utxo: selected,
                        total_amount,
                        timed_out: false,
                    };
                }
            }
            Err(err) => {
                tracing::warn!(%address, error = %err, "utxo poll failed, continuing");
            }
        }

        on_progress(timeout.saturating_sub(started.elapsed()), total_amount);
        tokio::time::sleep(poll_interval).await;
    }

    // One final look so the caller sees the freshest aggregate, but the
    // outcome stays a timeout either way.
    if let Ok(utxos) = api.utxos_for_address(address).await {
        total_amount = utxos.iter().map(|u| u.satoshis).sum();
    }
    DepositWatch {
        utxo: None,
        total_amount,
        timed_out: true,
    }
}

/// Prefers the largest single UTXO that covers `min_value` on its own;
/// falls back to the largest present. The bridge spends exactly one input.
fn select_deposit_utxo(utxos: Vec<Utxo>, min_value: u64) -> Option<Utxo> {
    let mut best_covering: Option<Utxo> = None;
    let mut best_overall: Option<Utxo> = None;
    for utxo in utxos {
        if utxo.satoshis >= min_value
            && best_covering
                .as_ref()
                .is_none_or(|b| utxo.satoshis > b.satoshis)
        {
            best_covering = Some(utxo.clone());
        }
        if best_overall
            .as_ref()
            .is_none_or(|b| utxo.satoshis > b.satoshis)
        {
            best_overall = Some(utxo);
        }
    }
    best_covering.or(best_overall)
}

/// Waits until `txid` reports at least `min_confirmations` confirmations or
/// an InstantSend lock. Unlike the deposit watch, running out of time here
/// is an error.
pub async fn wait_for_confirmation(
    api: &dyn CoreChainApi,
    txid: &str,
    min_confirmations: u32,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<TxStatus, ClientError> {
    let started = tokio::time::Instant::now();
    loop {
        match api.transaction_status(txid).await {
            Ok(status) if status.txlock || status.confirmations >= min_confirmations => {
                return Ok(status);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(%txid, error = %err, "tx status poll failed, continuing");
            }
        }
        if started.elapsed() >= timeout {
            return Err(ClientError::ConfirmationTimeout {
                txid: txid.to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}

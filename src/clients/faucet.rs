//! Testnet faucet client. The faucet optionally gates drips behind a
//! proof-of-work "cap" challenge; solving it yields a token that
//! accompanies the drip request. Every request carries a 30 second
//! client-side deadline.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::clients::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Nonces checked between yields while solving the cap challenge.
const POW_YIELD_STRIDE: u64 = 4096;

#[derive(Debug, Clone, Deserialize)]
pub struct FaucetStatus {
    pub status: String,
    #[serde(rename = "capEndpoint", default)]
    pub cap_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FaucetDrip {
    pub txid: String,
    pub amount: u64,
    pub address: String,
}

#[derive(Debug, Deserialize)]
struct CapChallenge {
    challenge: String,
    #[serde(default = "default_difficulty")]
    difficulty: u32,
}

fn default_difficulty() -> u32 {
    16
}

#[derive(Debug, Deserialize)]
struct CapToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct FaucetErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(rename = "retryAfter", default)]
    retry_after: Option<u64>,
}

pub struct FaucetClient {
    base_url: String,
    client: reqwest::Client,
}

impl FaucetClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with these options");
        FaucetClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn status(&self) -> Result<FaucetStatus, ClientError> {
        let url = format!("{}/api/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        crate::clients::error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))
    }

    /// Fetches the cap challenge, searches for a nonce, and redeems it for
    /// a token. The nonce search yields to the runtime periodically so the
    /// driver task stays cooperative.
    async fn solve_cap_challenge(&self, cap_endpoint: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .get(cap_endpoint)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let challenge: CapChallenge = crate::clients::error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;

        let mut nonce = 0u64;
        loop {
            match solve_pow_window(
                challenge.challenge.as_bytes(),
                challenge.difficulty,
                nonce,
                POW_YIELD_STRIDE,
            ) {
                Some(found) => {
                    nonce = found;
                    break;
                }
                None => {
                    nonce += POW_YIELD_STRIDE;
                    tokio::task::yield_now().await;
                }
            }
        }
        tracing::debug!(nonce, difficulty = challenge.difficulty, "cap challenge solved");

        let response = self
            .client
            .post(cap_endpoint)
            .json(&json!({ "challenge": challenge.challenge, "nonce": nonce }))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let token: CapToken = crate::clients::error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;
        Ok(token.token)
    }

    /// Requests `amount` duffs to `address`, solving the proof-of-work gate
    /// first when the faucet advertises one.
    pub async fn drip(&self, address: &str, amount: u64) -> Result<FaucetDrip, ClientError> {
        let status = self.status().await?;
        let cap_token = match status.cap_endpoint.as_deref() {
            Some(endpoint) => Some(self.solve_cap_challenge(endpoint).await?),
            None => None,
        };
        self.request_coins(address, amount, cap_token.as_deref())
            .await
    }

    pub async fn request_coins(
        &self,
        address: &str,
        amount: u64,
        cap_token: Option<&str>,
    ) -> Result<FaucetDrip, ClientError> {
        let url = format!("{}/api/core-faucet", self.base_url);
        let mut body = json!({ "address": address, "amount": amount });
        if let Some(token) = cap_token {
            body["capToken"] = json!(token);
        }
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::UnexpectedResponse(e.to_string()));
        }

        let body: FaucetErrorBody = response.json().await.unwrap_or(FaucetErrorBody {
            error: None,
            message: None,
            detail: None,
            retry_after: None,
        });
        if status.as_u16() == 429 {
            return Err(ClientError::RateLimited {
                retry_after_secs: body.retry_after.unwrap_or(60),
            });
        }
        let message = body
            .error
            .or(body.message)
            .or(body.detail)
            .unwrap_or_else(|| "faucet request failed".to_string());
        Err(ClientError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

/// Checks `count` nonces starting at `start` against the challenge,
/// returning the first whose `SHA-256(challenge ⧺ nonce as LE)` carries at
/// least `difficulty_bits` leading zero bits.
fn solve_pow_window(challenge: &[u8], difficulty_bits: u32, start: u64, count: u64) -> Option<u64> {
    (start..start + count).find(|nonce| {
        let mut hasher = Sha256::new();
        hasher.update(challenge);
        hasher.update(nonce.to_le_bytes());
        leading_zero_bits(&hasher.finalize()) >= difficulty_bits
    })
}

fn leading_zero_bits(digest: &[u8]) -> u32 {
    let mut bits = 0;
    for byte in digest {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

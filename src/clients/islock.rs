//! InstantSend-lock retrieval over JSON-RPC. One endpoint per network; the
//! only method the bridge needs is `getislocks`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::clients::{ClientError, error_for_status};
use crate::codec;

#[derive(Debug, Clone, Deserialize)]
pub struct IslockEntry {
    pub txid: String,
    #[serde(default)]
    pub hex: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<IslockEntry>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[async_trait]
pub trait InstantLockApi: Send + Sync {
    /// The serialized InstantSend lock for `txid`, if a quorum has signed
    /// one yet.
    async fn instant_lock_bytes(&self, txid: &str) -> Result<Option<Vec<u8>>, ClientError>;
}

pub struct IslockClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl IslockClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        IslockClient {
            rpc_url: rpc_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl InstantLockApi for IslockClient {
    async fn instant_lock_bytes(&self, txid: &str) -> Result<Option<Vec<u8>>, ClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "getislocks",
            "params": [[txid]],
            "id": 1,
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let parsed: RpcResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(ClientError::UnexpectedResponse(format!(
                "RPC error: {error}"
            )));
        }

        let entry = parsed
            .result
            .unwrap_or_default()
            .into_iter()
            .find(|entry| entry.txid == txid);
        match entry.and_then(|e| e.hex).filter(|hex| !hex.is_empty()) {
            Some(hex) => {
                let bytes = codec::decode_hex(&hex)
                    .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }
}

pub const DEFAULT_ISLOCK_TIMEOUT: Duration = Duration::from_millis(60_000);
pub const DEFAULT_ISLOCK_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Polls until a quorum-signed lock for `txid` appears. Missing the
/// timeout is fatal for the pipeline, so this returns an error rather than
/// a value.
pub async fn wait_for_instant_send_lock(
    api: &dyn InstantLockApi,
    txid: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<u8>, ClientError> {
    let started = tokio::time::Instant::now();
    loop {
        match api.instant_lock_bytes(txid).await {
            Ok(Some(bytes)) => return Ok(bytes),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%txid, error = %err, "islock poll failed, continuing");
            }
        }
        if started.elapsed() >= timeout {
            return Err(ClientError::IslockTimeout {
                txid: txid.to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockIslocks {
        responses: Mutex<Vec<Result<Option<Vec<u8>>, ClientError>>>,
    }

    #[async_trait]
    impl InstantLockApi for MockIslocks {
        async fn instant_lock_bytes(&self, _txid: &str) -> Result<Option<Vec<u8>>, ClientError> {
            let mut guard = self.responses.lock().unwrap();
            if guard.is_empty() {
                Ok(None)
            } else {
                guard.remove(0)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lock_found_after_a_few_polls() {
        let api = MockIslocks {
            responses: Mutex::new(vec![
                Ok(None),
                Err(ClientError::Transport("reset".into())),
                Ok(Some(vec![1, 2, 3])),
            ]),
        };
        let bytes = wait_for_instant_send_lock(
            &api,
            "ab".repeat(32).as_str(),
            DEFAULT_ISLOCK_TIMEOUT,
            DEFAULT_ISLOCK_POLL_INTERVAL,
        )
        .await
        .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_lock_times_out_fatally() {
        let api = MockIslocks {
            responses: Mutex::new(vec![]),
        };
        let err = wait_for_instant_send_lock(
            &api,
            "deadbeef",
            Duration::from_millis(10_000),
            Duration::from_millis(2_000),
        )
        .await
        .unwrap_err();
        match err {
            ClientError::IslockTimeout { txid, elapsed_ms } => {
                assert_eq!(txid, "deadbeef");
                assert!(elapsed_ms >= 10_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

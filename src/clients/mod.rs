//! HTTP collaborators: the Insight UTXO API, the InstantSend-lock RPC, the
//! testnet faucet, and the retry engine they all sit behind.

pub mod faucet;
pub mod insight;
pub mod islock;
pub mod retry;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    RequestTimedOut,
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("no InstantSend lock for {txid} after {elapsed_ms} ms")]
    IslockTimeout { txid: String, elapsed_ms: u64 },
    #[error("transaction {txid} unconfirmed after {elapsed_ms} ms")]
    ConfirmationTimeout { txid: String, elapsed_ms: u64 },
    #[error("faucet rate limited, retry after {retry_after_secs} s")]
    RateLimited { retry_after_secs: u64 },
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::RequestTimedOut;
        }
        match err.status() {
            Some(status) => ClientError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => ClientError::Transport(err.to_string()),
        }
    }

    /// Transport failures and the overloaded/unavailable status classes are
    /// worth retrying; application errors (4xx other than 429) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::RequestTimedOut => true,
            ClientError::Http { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

/// Reads a non-2xx response into an `Http` error with a body excerpt.
pub(crate) async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    Err(ClientError::Http {
        status: code,
        message: excerpt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ClientError::Transport("connection reset by peer".into()).is_retryable());
        assert!(ClientError::RequestTimedOut.is_retryable());
        for status in [429, 500, 502, 503, 504] {
            assert!(
                ClientError::Http {
                    status,
                    message: String::new()
                }
                .is_retryable()
            );
        }
        for status in [400, 404, 409] {
            assert!(
                !ClientError::Http {
                    status,
                    message: String::new()
                }
                .is_retryable()
            );
        }
        assert!(
            !ClientError::IslockTimeout {
                txid: String::new(),
                elapsed_ms: 0
            }
            .is_retryable()
        );
    }
}

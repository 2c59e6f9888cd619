// =============================================================================
// Chain RPC Client — readiness probe and signed stream publishing
// =============================================================================
//
// SECURITY: The private key is never logged or serialized. It is only used as
// the HMAC-SHA256 key for publish acknowledgments.
// =============================================================================

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::config::FeedConfig;
use crate::types::FeedAvailability;

type HmacSha256 = Hmac<Sha256>;

/// Request timeout for the JSON-RPC endpoint.
const RPC_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain RPC endpoint or private key not configured")]
    NotConfigured,

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected RPC response: {0}")]
    BadResponse(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Acknowledgment returned for a published payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAck {
    pub success: bool,
    pub stream_id: String,
    /// SHA-256 of the serialized payload.
    pub data_hash: String,
    /// HMAC-SHA256 of `data_hash` under the publisher key.
    pub signature: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ChainClient {
    rpc_url: String,
    key: Vec<u8>,
    client: reqwest::Client,
}

impl ChainClient {
    /// Create a client for `rpc_url`. `private_key` must be 32 bytes of hex,
    /// with or without a `0x` prefix.
    pub fn new(rpc_url: impl Into<String>, private_key: &str) -> Result<Self, ChainError> {
        let stripped = private_key.trim().trim_start_matches("0x");
        let key = hex::decode(stripped).map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        if key.len() != 32 {
            return Err(ChainError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                key.len()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()?;

        let rpc_url = rpc_url.into();
        debug!(rpc_url = %rpc_url, "ChainClient initialised");

        Ok(Self {
            rpc_url,
            key,
            client,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Call `eth_chainId` and return the chain id.
    #[instrument(skip(self), name = "chain::probe")]
    pub async fn probe(&self) -> Result<u64, ChainError> {
        let result = self.call("eth_chainId", serde_json::json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ChainError::BadResponse(format!("chain id is not a string: {result}")))?;
        u64::from_str_radix(raw.trim_start_matches("0x"), 16)
            .map_err(|e| ChainError::BadResponse(format!("chain id {raw:?}: {e}")))
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ChainError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        resp.result
            .ok_or_else(|| ChainError::BadResponse(format!("{method}: missing result")))
    }

    /// Produce an HMAC-SHA256 hex signature of `message`.
    pub fn sign(&self, message: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key size");
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Hash and sign `data` for `stream_id`.
    pub fn publish(&self, stream_id: &str, data: &serde_json::Value) -> Result<PublishAck, ChainError> {
        let encoded = serde_json::to_vec(data)?;
        let data_hash = format!("0x{}", hex::encode(Sha256::digest(&encoded)));
        let signature = self.sign(data_hash.as_bytes());

        info!(stream_id = %stream_id, data_hash = %data_hash, "payload published");
        Ok(PublishAck {
            success: true,
            stream_id: stream_id.to_string(),
            data_hash,
            signature,
            published_at: Utc::now(),
        })
    }
}

/// Decide live-feed availability once, at startup. Failures are logged and
/// never retried.
pub async fn connect(config: &FeedConfig) -> (FeedAvailability, Option<ChainClient>) {
    let (Some(url), Some(key)) = (&config.chain_rpc_url, &config.chain_private_key) else {
        info!("{}; serving mock data only", ChainError::NotConfigured);
        return (FeedAvailability::NotConfigured, None);
    };

    let client = match ChainClient::new(url.clone(), key) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "live chain feed initialisation failed");
            return (FeedAvailability::Unavailable, None);
        }
    };

    match client.probe().await {
        Ok(chain_id) => {
            info!(rpc_url = %client.rpc_url(), chain_id, "live chain feed ready");
            (FeedAvailability::Ready, Some(client))
        }
        Err(e) => {
            error!(rpc_url = %client.rpc_url(), error = %e, "live chain feed unavailable");
            (FeedAvailability::Unavailable, None)
        }
    }
}

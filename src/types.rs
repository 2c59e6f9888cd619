// =============================================================================
// Shared types used across the transaction feed
// =============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single transaction observed on the chain (or produced by the mock
/// generator). Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// `0x`-prefixed 32-byte hex hash.
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Transferred amount in native units.
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    /// Gas price in gwei.
    pub gas_price: Decimal,
}

impl TransactionRecord {
    /// Milliseconds since the UNIX epoch, used for minute bucketing.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Readiness of the live chain feed. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedAvailability {
    /// No RPC endpoint or key was supplied.
    NotConfigured,
    /// Configured, but the startup probe failed. Not retried.
    Unavailable,
    Ready,
}

impl Default for FeedAvailability {
    fn default() -> Self {
        Self::NotConfigured
    }
}

impl FeedAvailability {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

impl std::fmt::Display for FeedAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "NotConfigured"),
            Self::Unavailable => write!(f, "Unavailable"),
            Self::Ready => write!(f, "Ready"),
        }
    }
}

// =============================================================================
// Event Sources — synthetic transaction generator and its driving loop
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::feed::Feed;
use crate::types::TransactionRecord;

/// Anything that can produce the next transaction on demand.
pub trait EventSource: Send {
    fn next_record(&mut self, now: DateTime<Utc>) -> TransactionRecord;
}

/// Random but well-formed transactions.
pub struct MockEventSource {
    rng: StdRng,
    nonce: u64,
    block_number: u64,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let block_number = rng.gen_range(1_000_000..20_000_000);
        Self {
            rng,
            nonce: 0,
            block_number,
        }
    }

    fn address(&mut self) -> String {
        let mut bytes = [0u8; 20];
        self.rng.fill_bytes(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }

    fn hash(&mut self) -> String {
        let mut salt = [0u8; 32];
        self.rng.fill_bytes(&mut salt);

        let mut hasher = Sha256::new();
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(salt);
        format!("0x{}", hex::encode(hasher.finalize()))
    }
}

impl Default for MockEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for MockEventSource {
    fn next_record(&mut self, now: DateTime<Utc>) -> TransactionRecord {
        self.nonce += 1;
        // A new block roughly every other event.
        if self.rng.gen_bool(0.5) {
            self.block_number += 1;
        }

        let hash = self.hash();
        let from = self.address();
        let to = self.address();
        // 0.0001 .. 10.0000, 4 decimals.
        let value = Decimal::new(self.rng.gen_range(1..100_000), 4);
        // 1.00 .. 99.99 gwei.
        let gas_price = Decimal::new(self.rng.gen_range(100..10_000), 2);
        let timestamp = now
            .duration_trunc(TimeDelta::milliseconds(1))
            .unwrap_or(now);

        TransactionRecord {
            hash,
            from,
            to,
            value,
            timestamp,
            block_number: self.block_number,
            gas_price,
        }
    }
}

/// Feed `source` into `feed` every `period`, forever.
pub async fn run_event_source<S: EventSource>(feed: Arc<Feed>, mut source: S, period: Duration) {
    info!(period_ms = period.as_millis() as u64, "event source started");
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let record = source.next_record(Utc::now());
        debug!(hash = %record.hash, block = record.block_number, "generated transaction");
        feed.add_transaction(record);
    }
}

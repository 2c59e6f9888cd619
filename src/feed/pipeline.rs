// =============================================================================
// Feed — ingestion pipeline and query façade
// =============================================================================
//
// Ledger, statistics and hub sit behind one mutex. `add_transaction` runs
// ingest → record → broadcast inside that lock, and readers (REST queries,
// new-subscriber init) take the same lock, so nobody can observe stats that
// disagree with the ledger. Hub sends are non-blocking, so the lock is never
// held across an await point.
// =============================================================================

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::feed::hub::{BroadcastHub, BroadcastReport, FeedMessage, Frame, SUBSCRIBER_BUFFER};
use crate::feed::ledger::{Ledger, DEFAULT_LEDGER_CAPACITY};
use crate::feed::stats::{StatisticsState, StatsAggregator, DEFAULT_BUCKET_CAPACITY};
use crate::types::TransactionRecord;

/// Number of transactions in init messages and `/api/transactions`.
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 20;

/// Consistent point-in-time view of ledger + stats.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub transactions: Vec<TransactionRecord>,
    pub stats: StatisticsState,
}

struct FeedCore {
    ledger: Ledger,
    stats: StatsAggregator,
    hub: BroadcastHub,
}

pub struct Feed {
    core: Mutex<FeedCore>,
    snapshot_limit: usize,
}

impl Feed {
    pub fn new(ledger_capacity: usize, bucket_capacity: usize, snapshot_limit: usize) -> Self {
        Self {
            core: Mutex::new(FeedCore {
                ledger: Ledger::new(ledger_capacity),
                stats: StatsAggregator::new(bucket_capacity),
                hub: BroadcastHub::new(),
            }),
            snapshot_limit,
        }
    }

    // ── Ingestion ───────────────────────────────────────────────────────

    /// Ingest one transaction and push the update to every subscriber.
    pub fn add_transaction(&self, record: TransactionRecord) -> BroadcastReport {
        self.add_transaction_at(record, Utc::now())
    }

    /// As [`Feed::add_transaction`], with an explicit observation time.
    pub fn add_transaction_at(&self, record: TransactionRecord, now: DateTime<Utc>) -> BroadcastReport {
        let mut core = self.core.lock();
        let ts = record.timestamp_ms();

        core.ledger.ingest(record.clone());
        core.stats.record(ts, now);

        let message = FeedMessage::Transaction {
            transaction: record,
            stats: core.stats.state().clone(),
        };
        let report = core.hub.broadcast(&message);

        debug!(
            total = core.stats.total_count(),
            delivered = report.delivered,
            skipped = report.skipped,
            "transaction ingested"
        );
        report
    }

    // ── Subscribers ─────────────────────────────────────────────────────

    /// Register a new subscriber and return its id and frame receiver. The
    /// first frame on the receiver is always the init message.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = Uuid::new_v4();

        let mut core = self.core.lock();
        let init = FeedMessage::Init {
            transactions: core.ledger.snapshot(self.snapshot_limit),
            stats: core.stats.state().clone(),
        };
        core.hub.subscribe(id, tx, &init);

        (id, rx)
    }

    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        self.core.lock().hub.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.core.lock().hub.subscriber_count()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> FeedSnapshot {
        let core = self.core.lock();
        FeedSnapshot {
            transactions: core.ledger.snapshot(self.snapshot_limit),
            stats: core.stats.state().clone(),
        }
    }

    #[cfg(test)]
    pub fn transactions(&self, limit: usize) -> Vec<TransactionRecord> {
        self.core.lock().ledger.snapshot(limit)
    }

    pub fn stats(&self) -> StatisticsState {
        self.core.lock().stats.state().clone()
    }

    #[cfg(test)]
    pub fn ledger_len(&self) -> usize {
        self.core.lock().ledger.len()
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::new(
            DEFAULT_LEDGER_CAPACITY,
            DEFAULT_BUCKET_CAPACITY,
            DEFAULT_SNAPSHOT_LIMIT,
        )
    }
}

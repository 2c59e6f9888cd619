// =============================================================================
// Broadcast Hub — fan-out of serialized feed messages
// =============================================================================
//
// Each subscriber is a bounded mpsc sender owned by the hub; the WebSocket
// task holding the receiver forwards frames to the socket. A message is
// serialized once and the resulting `Arc<str>` is shared by every send.
//
// Sends never wait: a full queue (slow reader) or a dropped receiver is a
// skipped send, never retried. Subscribers are only removed by an explicit
// `unsubscribe`, driven by the connection task on close or error.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::feed::stats::StatisticsState;
use crate::types::TransactionRecord;

/// A pre-serialized JSON frame.
pub type Frame = Arc<str>;

/// Frames queued per subscriber before further sends are dropped.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Messages pushed to subscribers, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Sent once, on connect.
    Init {
        transactions: Vec<TransactionRecord>,
        stats: StatisticsState,
    },
    /// Sent on every ingested transaction.
    Transaction {
        transaction: TransactionRecord,
        stats: StatisticsState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Open,
    /// Receiver dropped; kept until the connection task unsubscribes.
    Closed,
}

struct Subscriber {
    tx: mpsc::Sender<Frame>,
    liveness: Liveness,
}

/// Outcome of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub skipped: usize,
}

#[derive(Default)]
pub struct BroadcastHub {
    subscribers: HashMap<Uuid, Subscriber>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tx` under `id` and immediately push `init` to it.
    pub fn subscribe(&mut self, id: Uuid, tx: mpsc::Sender<Frame>, init: &FeedMessage) {
        let mut subscriber = Subscriber {
            tx,
            liveness: Liveness::Open,
        };

        match serialize(init) {
            Some(frame) => {
                if let Err(e) = subscriber.tx.try_send(frame) {
                    debug!(subscriber = %id, error = %e, "init send failed");
                    if matches!(e, TrySendError::Closed(_)) {
                        subscriber.liveness = Liveness::Closed;
                    }
                }
            }
            None => warn!(subscriber = %id, "init message not sent"),
        }

        self.subscribers.insert(id, subscriber);
        info!(subscriber = %id, total = self.subscribers.len(), "subscriber added");
    }

    /// Remove `id`. Unknown or already-removed ids are a no-op.
    pub fn unsubscribe(&mut self, id: &Uuid) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            info!(subscriber = %id, total = self.subscribers.len(), "subscriber removed");
        }
        removed
    }

    #[cfg(test)]
    pub fn liveness(&self, id: &Uuid) -> Option<Liveness> {
        self.subscribers.get(id).map(|s| s.liveness)
    }

    /// Serialize `message` once and send it to every open subscriber.
    pub fn broadcast(&mut self, message: &FeedMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let Some(frame) = serialize(message) else {
            report.skipped = self.subscribers.len();
            return report;
        };

        for (id, sub) in self.subscribers.iter_mut() {
            if sub.liveness != Liveness::Open {
                report.skipped += 1;
                continue;
            }
            match sub.tx.try_send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = %id, "subscriber queue full; skipping");
                    report.skipped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %id, "subscriber receiver gone; skipping");
                    sub.liveness = Liveness::Closed;
                    report.skipped += 1;
                }
            }
        }

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

fn serialize(message: &FeedMessage) -> Option<Frame> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(error = %e, "failed to serialize feed message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::stats::StatsAggregator;
    use crate::types::fixtures::record_at;

    fn update(n: u64) -> FeedMessage {
        FeedMessage::Transaction {
            transaction: record_at(n, 0),
            stats: StatsAggregator::default().state().clone(),
        }
    }

    fn empty_init() -> FeedMessage {
        FeedMessage::Init {
            transactions: Vec::new(),
            stats: StatsAggregator::default().state().clone(),
        }
    }

    fn parse(frame: &Frame) -> serde_json::Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn subscribe_sends_init_first() {
        let mut hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        hub.subscribe(Uuid::new_v4(), tx, &empty_init());

        let first = rx.try_recv().unwrap();
        assert_eq!(parse(&first)["type"], "init");
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn failed_subscriber_does_not_block_healthy_one() {
        let mut hub = BroadcastHub::new();
        let dead_id = Uuid::new_v4();
        let (dead_tx, dead_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (live_tx, mut live_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        hub.subscribe(dead_id, dead_tx, &empty_init());
        hub.subscribe(Uuid::new_v4(), live_tx, &empty_init());
        drop(dead_rx);
        let _ = live_rx.try_recv();

        let report = hub.broadcast(&update(1));
        assert_eq!(report, BroadcastReport { delivered: 1, skipped: 1 });

        let msg = parse(&live_rx.try_recv().unwrap());
        assert_eq!(msg["type"], "transaction");
        assert_eq!(msg["transaction"]["blockNumber"], 1_001);

        // Not auto-removed.
        assert_eq!(hub.subscriber_count(), 2);
        assert_eq!(hub.liveness(&dead_id), Some(Liveness::Closed));
    }

    #[test]
    fn stalled_subscriber_queue_stays_bounded() {
        let mut hub = BroadcastHub::new();
        let stalled_id = Uuid::new_v4();
        let (stalled_tx, mut stalled_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (live_tx, mut live_rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        hub.subscribe(stalled_id, stalled_tx, &empty_init());
        hub.subscribe(Uuid::new_v4(), live_tx, &empty_init());

        for n in 0..(SUBSCRIBER_BUFFER as u64 * 3) {
            hub.broadcast(&update(n));
            // Healthy reader keeps up.
            while live_rx.try_recv().is_ok() {}
        }

        let mut queued = 0;
        while stalled_rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, SUBSCRIBER_BUFFER);
        assert_eq!(hub.liveness(&stalled_id), Some(Liveness::Open));

        // Drained subscriber receives again.
        assert_eq!(hub.broadcast(&update(999)).delivered, 2);
        assert!(stalled_rx.try_recv().is_ok());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut hub = BroadcastHub::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        assert!(!hub.unsubscribe(&id));
        hub.subscribe(id, tx, &empty_init());
        assert!(hub.unsubscribe(&id));
        assert!(!hub.unsubscribe(&id));
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.broadcast(&update(3)), BroadcastReport::default());
    }

    #[test]
    fn every_open_subscriber_gets_the_same_frame() {
        let mut hub = BroadcastHub::new();
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (tx, mut rx) = mpsc::channel(SUBSCRIBER_BUFFER);
            hub.subscribe(Uuid::new_v4(), tx, &empty_init());
            let _ = rx.try_recv();
            receivers.push(rx);
        }

        assert_eq!(hub.broadcast(&update(4)).delivered, 5);
        let frames: Vec<Frame> = receivers.iter_mut().map(|rx| rx.try_recv().unwrap()).collect();
        assert!(frames.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}

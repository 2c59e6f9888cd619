// =============================================================================
// Statistics Aggregator — lifetime total + per-minute throughput window
// =============================================================================
//
// Buckets are append-only: an event is compared against the *last* bucket
// only. A timestamp that falls in an earlier minute than the last bucket is
// counted in the last bucket rather than re-opening history.
// =============================================================================

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of one-minute buckets retained.
pub const DEFAULT_BUCKET_CAPACITY: usize = 60;

const MINUTE_MS: i64 = 60_000;

/// Transaction count for one minute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsBucket {
    /// Minute since the UNIX epoch (`timestamp_ms / 60_000`).
    pub minute: i64,
    pub count: u64,
    /// Wall-clock time the bucket was opened, `HH:MM:SS`.
    pub time: String,
}

/// Snapshot-able statistics state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsState {
    pub total_count: u64,
    pub transactions_per_minute: VecDeque<StatsBucket>,
    pub last_updated: DateTime<Utc>,
}

/// Minute bucket key for a millisecond timestamp.
pub fn bucket_key(timestamp_ms: i64) -> i64 {
    timestamp_ms.div_euclid(MINUTE_MS)
}

pub struct StatsAggregator {
    state: StatisticsState,
    capacity: usize,
}

impl StatsAggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: StatisticsState {
                total_count: 0,
                transactions_per_minute: VecDeque::with_capacity(capacity + 1),
                last_updated: Utc::now(),
            },
            capacity,
        }
    }

    /// Count one event stamped `timestamp_ms`, observed at `now`.
    pub fn record(&mut self, timestamp_ms: i64, now: DateTime<Utc>) {
        let key = bucket_key(timestamp_ms);
        let buckets = &mut self.state.transactions_per_minute;

        // Late events stay in the newest bucket.
        match buckets.back_mut() {
            Some(last) if key <= last.minute => last.count += 1,
            _ => buckets.push_back(StatsBucket {
                minute: key,
                count: 1,
                time: now.format("%H:%M:%S").to_string(),
            }),
        }

        while buckets.len() > self.capacity {
            buckets.pop_front();
        }

        self.state.total_count += 1;
        self.state.last_updated = now;
    }

    pub fn state(&self) -> &StatisticsState {
        &self.state
    }

    pub fn total_count(&self) -> u64 {
        self.state.total_count
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.state.transactions_per_minute.len()
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_CAPACITY)
    }
}

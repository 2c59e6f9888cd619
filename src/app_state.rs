// =============================================================================
// Central Application State — transaction feed server
// =============================================================================
//
// One coordinator instance shared by every handler via `Arc<AppState>`:
//   - `feed` owns ledger, statistics and subscribers behind a single lock.
//   - `availability` is decided once at startup and never re-evaluated.
//   - `chain` is only present when availability is `Ready`.
// =============================================================================

use std::sync::Arc;

use crate::chain::ChainClient;
use crate::config::FeedConfig;
use crate::feed::Feed;
use crate::types::FeedAvailability;

pub struct AppState {
    pub feed: Arc<Feed>,
    pub availability: FeedAvailability,
    pub chain: Option<ChainClient>,
    /// Instant when the server was started. Used for uptime reporting.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: &FeedConfig, availability: FeedAvailability, chain: Option<ChainClient>) -> Self {
        // A client is only usable when the startup probe succeeded.
        let chain = chain.filter(|_| availability.is_ready());
        Self {
            feed: Arc::new(Feed::new(
                config.ledger_capacity,
                config.bucket_capacity,
                config.snapshot_limit,
            )),
            availability,
            chain,
            start_time: std::time::Instant::now(),
        }
    }

    /// The live chain client, if the feed is ready.
    pub fn ready_chain(&self) -> Option<&ChainClient> {
        self.chain.as_ref()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

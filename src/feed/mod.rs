pub mod hub;
pub mod ledger;
pub mod pipeline;
pub mod stats;

pub use pipeline::Feed;

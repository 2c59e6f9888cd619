// =============================================================================
// Feed Configuration — JSON file + environment overrides
// =============================================================================
//
// Every field carries a serde default, so a missing or partial config file
// still yields a usable configuration. Environment variables (loaded through
// dotenv in main) take precedence over the file.
//
// The chain private key is never serialized or logged.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::feed::ledger::DEFAULT_LEDGER_CAPACITY;
use crate::feed::pipeline::DEFAULT_SNAPSHOT_LIMIT;
use crate::feed::stats::DEFAULT_BUCKET_CAPACITY;

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_tick_interval_ms() -> u64 {
    2_000
}

fn default_ledger_capacity() -> usize {
    DEFAULT_LEDGER_CAPACITY
}

fn default_bucket_capacity() -> usize {
    DEFAULT_BUCKET_CAPACITY
}

fn default_snapshot_limit() -> usize {
    DEFAULT_SNAPSHOT_LIMIT
}

#[derive(Clone, Deserialize)]
pub struct FeedConfig {
    /// Address the HTTP/WebSocket server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Mock generator cadence.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_ledger_capacity")]
    pub ledger_capacity: usize,

    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: usize,

    /// Transactions included in init messages and `/api/transactions`.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,

    /// JSON-RPC endpoint of the live chain.
    #[serde(default)]
    pub chain_rpc_url: Option<String>,

    /// Hex-encoded publisher key.
    #[serde(default)]
    pub chain_private_key: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            tick_interval_ms: default_tick_interval_ms(),
            ledger_capacity: default_ledger_capacity(),
            bucket_capacity: default_bucket_capacity(),
            snapshot_limit: default_snapshot_limit(),
            chain_rpc_url: None,
            chain_private_key: None,
        }
    }
}

impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("bind_addr", &self.bind_addr)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("ledger_capacity", &self.ledger_capacity)
            .field("bucket_capacity", &self.bucket_capacity)
            .field("snapshot_limit", &self.snapshot_limit)
            .field("chain_rpc_url", &self.chain_rpc_url)
            .field("chain_private_key", &self.chain_private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl FeedConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feed config from {}", path.display()))?;

        let config = Self::from_json(&content)
            .with_context(|| format!("failed to parse feed config from {}", path.display()))?;

        info!(path = %path.display(), bind_addr = %config.bind_addr, "feed config loaded");
        Ok(config)
    }

    /// Parse a JSON document and replace unusable values with defaults.
    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(content)?;
        config.sanitize();
        Ok(config)
    }

    fn sanitize(&mut self) {
        if self.tick_interval_ms == 0 {
            warn!(
                default = default_tick_interval_ms(),
                "tick_interval_ms must be non-zero; using default"
            );
            self.tick_interval_ms = default_tick_interval_ms();
        }
    }

    /// Apply overrides from process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(addr) = get("FEED_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(raw) = get("FEED_TICK_INTERVAL_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.tick_interval_ms = ms,
                _ => warn!(value = %raw, "ignoring invalid FEED_TICK_INTERVAL_MS"),
            }
        }
        if let Some(url) = get("CHAIN_RPC_URL") {
            self.chain_rpc_url = Some(url);
        }
        if let Some(key) = get("CHAIN_PRIVATE_KEY") {
            self.chain_private_key = Some(key);
        }
    }

    /// Mock generator period; never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.tick_interval(), Duration::from_secs(2));
        assert_eq!(cfg.ledger_capacity, 100);
        assert_eq!(cfg.bucket_capacity, 60);
        assert_eq!(cfg.snapshot_limit, 20);
        assert!(cfg.chain_rpc_url.is_none());
        assert!(cfg.chain_private_key.is_none());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let cfg = FeedConfig::from_json(r#"{ "tick_interval_ms": 500 }"#).unwrap();
        assert_eq!(cfg.tick_interval_ms, 500);
        assert_eq!(cfg.ledger_capacity, 100);
        assert!(cfg.chain_rpc_url.is_none());
    }

    #[test]
    fn zero_tick_interval_in_file_falls_back_to_default() {
        let cfg = FeedConfig::from_json(r#"{ "tick_interval_ms": 0 }"#).unwrap();
        assert_eq!(cfg.tick_interval_ms, 2_000);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(2));

        let raw = FeedConfig {
            tick_interval_ms: 0,
            ..FeedConfig::default()
        };
        assert!(!raw.tick_interval().is_zero());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(FeedConfig::from_json("{ tick_interval_ms: }").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = FeedConfig::default();
        cfg.apply_overrides(env(&[
            ("FEED_BIND_ADDR", "127.0.0.1:9000"),
            ("FEED_TICK_INTERVAL_MS", "250"),
            ("CHAIN_RPC_URL", "http://localhost:8545"),
            ("CHAIN_PRIVATE_KEY", "0xabc"),
        ]));
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.tick_interval_ms, 250);
        assert_eq!(cfg.chain_rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(cfg.chain_private_key.as_deref(), Some("0xabc"));
    }

    #[test]
    fn blank_or_invalid_env_is_ignored() {
        let mut cfg = FeedConfig::default();
        cfg.apply_overrides(env(&[
            ("FEED_TICK_INTERVAL_MS", "soon"),
            ("CHAIN_RPC_URL", "   "),
            ("CHAIN_PRIVATE_KEY", "0xabc"),
        ]));
        assert_eq!(cfg.tick_interval_ms, 2_000);
        assert!(cfg.chain_rpc_url.is_none());
        assert_eq!(cfg.chain_private_key.as_deref(), Some("0xabc"));
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let mut cfg = FeedConfig::default();
        cfg.chain_private_key = Some("deadbeef".into());
        let out = format!("{cfg:?}");
        assert!(!out.contains("deadbeef"));
        assert!(out.contains("<redacted>"));
    }
}

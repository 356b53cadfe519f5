//! Configuration for bus producers and consumers.
//!
//! Embedding applications typically deserialize these from a JSON file via
//! [`load_config`]; every field except the consumer group name is optional
//! and falls back to the documented default through an `effective_*`
//! accessor. No durable state is owned by this library, so configuration is
//! the whole surface.
//!
//! # Example config
//!
//! ```json
//! {
//!   "producer": { "endpoint": "store://127.0.0.1:6379", "max_len_trade": 500000 },
//!   "consumer": { "group_name": "ingest", "min_idle_ms": 60000 }
//! }
//! ```

use serde::Deserialize;

use crate::types::StreamType;

/// Default stream base; streams are keyed `{base}:{suffix}`.
pub const DEFAULT_STREAM_BASE: &str = "md_stream";

/// Default approximate retention caps per stream type.
pub const DEFAULT_MAX_LEN_CANDLE: u64 = 200_000;
pub const DEFAULT_MAX_LEN_BOOK: u64 = 300_000;
pub const DEFAULT_MAX_LEN_TRADE: u64 = 500_000;

/// Default idle threshold before a pending entry becomes reclaimable.
pub const DEFAULT_MIN_IDLE_MS: u64 = 60_000;

/// Default maximum entries reclaimed per claim call.
pub const DEFAULT_CLAIM_COUNT: usize = 100;

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Producer-side configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProducerConfig {
    /// Store endpoint, passed through to the store implementation.
    pub endpoint: Option<String>,

    /// Stream key base (default: `"md_stream"`).
    pub stream_base: Option<String>,

    /// Approximate retention cap for the candle stream.
    pub max_len_candle: Option<u64>,

    /// Approximate retention cap for the book stream.
    pub max_len_book: Option<u64>,

    /// Approximate retention cap for the trade stream.
    pub max_len_trade: Option<u64>,
}

impl ProducerConfig {
    pub fn effective_stream_base(&self) -> &str {
        self.stream_base.as_deref().unwrap_or(DEFAULT_STREAM_BASE)
    }

    /// The retention cap for one stream type. The cap is approximate: the
    /// store may retain somewhat more than this for efficiency, and only
    /// converges toward it.
    pub fn max_len_for(&self, ty: StreamType) -> u64 {
        match ty {
            StreamType::Candle => self.max_len_candle.unwrap_or(DEFAULT_MAX_LEN_CANDLE),
            StreamType::Book => self.max_len_book.unwrap_or(DEFAULT_MAX_LEN_BOOK),
            StreamType::Trade => self.max_len_trade.unwrap_or(DEFAULT_MAX_LEN_TRADE),
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Consumer-side configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Store endpoint, passed through to the store implementation.
    pub endpoint: Option<String>,

    /// Stream key base (default: `"md_stream"`).
    pub stream_base: Option<String>,

    /// Consumer group name. Required: group identity is what ties delivery
    /// cursors and pending entries together in the store.
    pub group_name: String,

    /// This consumer's identity within the group. Defaults to a generated
    /// unique name when unset.
    pub consumer_name: Option<String>,

    /// Idle threshold in milliseconds before an unacknowledged entry owned
    /// by another consumer becomes reclaimable (default: 60000).
    pub min_idle_ms: Option<u64>,

    /// Maximum entries reclaimed per `read_pending` call (default: 100).
    pub claim_count: Option<usize>,
}

impl ConsumerConfig {
    /// Minimal config for the given group; everything else defaulted.
    pub fn for_group(group: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            stream_base: None,
            group_name: group.into(),
            consumer_name: None,
            min_idle_ms: None,
            claim_count: None,
        }
    }

    pub fn effective_stream_base(&self) -> &str {
        self.stream_base.as_deref().unwrap_or(DEFAULT_STREAM_BASE)
    }

    pub fn effective_min_idle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.min_idle_ms.unwrap_or(DEFAULT_MIN_IDLE_MS))
    }

    pub fn effective_claim_count(&self) -> usize {
        self.claim_count.unwrap_or(DEFAULT_CLAIM_COUNT)
    }
}

// ---------------------------------------------------------------------------
// File loading
// ---------------------------------------------------------------------------

/// Top-level bus config block for applications that run both sides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusConfig {
    pub producer: Option<ProducerConfig>,
    pub consumer: Option<ConsumerConfig>,
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<BusConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: BusConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_defaults() {
        let cfg = ProducerConfig::default();
        assert_eq!(cfg.effective_stream_base(), "md_stream");
        assert_eq!(cfg.max_len_for(StreamType::Candle), 200_000);
        assert_eq!(cfg.max_len_for(StreamType::Book), 300_000);
        assert_eq!(cfg.max_len_for(StreamType::Trade), 500_000);
    }

    #[test]
    fn consumer_defaults() {
        let cfg = ConsumerConfig::for_group("ingest");
        assert_eq!(cfg.group_name, "ingest");
        assert_eq!(cfg.effective_min_idle(), std::time::Duration::from_secs(60));
        assert_eq!(cfg.effective_claim_count(), 100);
    }

    #[test]
    fn parses_partial_json() {
        let raw = r#"{
            "producer": { "stream_base": "md_test", "max_len_trade": 1000 },
            "consumer": { "group_name": "ingest", "consumer_name": "c1" }
        }"#;
        let cfg: BusConfig = serde_json::from_str(raw).unwrap();
        let producer = cfg.producer.unwrap();
        assert_eq!(producer.effective_stream_base(), "md_test");
        assert_eq!(producer.max_len_for(StreamType::Trade), 1000);
        assert_eq!(producer.max_len_for(StreamType::Book), 300_000);
        let consumer = cfg.consumer.unwrap();
        assert_eq!(consumer.consumer_name.as_deref(), Some("c1"));
    }
}

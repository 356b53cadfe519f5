//! Bus producer: encodes events and appends them to per-type streams.

use std::sync::Arc;

use mdbus_core::codec;
use mdbus_core::config::ProducerConfig;
use mdbus_core::types::{StreamEvent, StreamType};
use tracing::debug;

use crate::error::Result;
use crate::store::{MessageId, StreamStore};

/// Publishes market events onto type-specific streams with bounded
/// approximate retention.
///
/// Owns one store session exclusively. No client-side sequencing, batching,
/// or retry is performed: append order across concurrent publishes is
/// whatever order the store observes, and any append failure propagates to
/// the caller unmodified.
pub struct BusProducer {
    store: Arc<dyn StreamStore>,
    config: ProducerConfig,
}

impl BusProducer {
    pub fn new(store: Arc<dyn StreamStore>, config: ProducerConfig) -> Self {
        Self { store, config }
    }

    /// Destination stream key for one event type.
    pub fn stream_key(&self, ty: StreamType) -> String {
        format!("{}:{}", self.config.effective_stream_base(), ty.suffix())
    }

    /// Encode one event and append it to its type stream, trimming the
    /// stream to approximately the configured cap for that type.
    pub async fn publish(&self, event: &StreamEvent) -> Result<MessageId> {
        let ty = event.stream_type();
        let key = self.stream_key(ty);
        let fields = codec::encode(event);
        let maxlen = self.config.max_len_for(ty);

        let id = self.store.append(&key, fields, Some(maxlen)).await?;
        debug!("[{key}] appended {id}");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStreamStore;
    use mdbus_core::types::{BookTopN, Candle, Side, Trade};

    fn producer(store: Arc<MemoryStreamStore>) -> BusProducer {
        BusProducer::new(store, ProducerConfig::default())
    }

    #[tokio::test]
    async fn publish_routes_by_event_type() {
        let store = Arc::new(MemoryStreamStore::new());
        let producer = producer(store.clone());

        producer
            .publish(&StreamEvent::Candle(Candle {
                coin: "BTC".into(),
                interval: "1m".into(),
                start_ts: 1_700_000_000_000,
                open: "1".into(),
                high: "2".into(),
                low: "0.5".into(),
                close: "1.5".into(),
                volume: "10".into(),
                is_closed: false,
                event_ts: None,
            }))
            .await
            .unwrap();
        producer
            .publish(&StreamEvent::BookTopN(BookTopN {
                coin: "BTC".into(),
                depth: 1,
                bids: vec![("1".into(), "2".into())],
                asks: vec![],
                event_ts: None,
            }))
            .await
            .unwrap();
        producer
            .publish(&StreamEvent::Trade(Trade {
                coin: "BTC".into(),
                ts: 1,
                price: "1".into(),
                size: "2".into(),
                side: Side::Sell,
                event_ts: None,
            }))
            .await
            .unwrap();

        assert_eq!(store.stream_len("md_stream:candle").await, 1);
        assert_eq!(store.stream_len("md_stream:book").await, 1);
        assert_eq!(store.stream_len("md_stream:trade").await, 1);
    }

    #[tokio::test]
    async fn publish_ids_increase_within_stream() {
        let store = Arc::new(MemoryStreamStore::new());
        let producer = producer(store);

        let trade = |ts: i64| {
            StreamEvent::Trade(Trade {
                coin: "ETH".into(),
                ts,
                price: "3000".into(),
                size: "1".into(),
                side: Side::Buy,
                event_ts: None,
            })
        };
        let a = producer.publish(&trade(1)).await.unwrap();
        let b = producer.publish(&trade(2)).await.unwrap();
        assert_ne!(a, b);
    }
}

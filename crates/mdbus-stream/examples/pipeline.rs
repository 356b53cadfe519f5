//! End-to-end demo over the in-memory store.
//!
//! Publishes one event of each kind, then consumes them with a consumer
//! group and decodes each message back to its typed event.
//!
//! ```bash
//! cargo run -p mdbus-stream --example pipeline
//! ```

use std::sync::Arc;

use anyhow::Result;
use mdbus_core::codec;
use mdbus_core::config::{ConsumerConfig, ProducerConfig};
use mdbus_core::time_util;
use mdbus_core::types::{BookTopN, Candle, Side, StreamEvent, StreamType, Trade};
use mdbus_stream::{BusConsumer, BusProducer, MemoryStreamStore, ProcessOptions};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    mdbus_core::logging::init_logging("debug", None, "mdbus-demo");

    let store = Arc::new(MemoryStreamStore::new());
    let producer = BusProducer::new(store.clone(), ProducerConfig::default());
    let consumer = BusConsumer::new(store, ConsumerConfig::for_group("demo"));

    let now = time_util::now_ms() as i64;
    producer
        .publish(&StreamEvent::Candle(Candle {
            coin: "BTC".into(),
            interval: "1m".into(),
            start_ts: now - 60_000,
            open: "64980.0".into(),
            high: "65012.5".into(),
            low: "64975.25".into(),
            close: "65000.5".into(),
            volume: "12.345".into(),
            is_closed: true,
            event_ts: Some(now),
        }))
        .await?;
    producer
        .publish(&StreamEvent::BookTopN(BookTopN {
            coin: "BTC".into(),
            depth: 2,
            bids: vec![
                ("65000.0".into(), "1.5".into()),
                ("64999.5".into(), "3.0".into()),
            ],
            asks: vec![
                ("65000.5".into(), "0.7".into()),
                ("65001.0".into(), "2.2".into()),
            ],
            event_ts: Some(now),
        }))
        .await?;
    producer
        .publish(&StreamEvent::Trade(Trade {
            coin: "BTC".into(),
            ts: now,
            price: "65000.5".into(),
            size: "0.01".into(),
            side: Side::Buy,
            event_ts: Some(now),
        }))
        .await?;

    for ty in [StreamType::Candle, StreamType::Book, StreamType::Trade] {
        consumer.ensure_group(ty).await?;
        consumer
            .process_pending_and_new(
                ty,
                |message| async move {
                    match codec::decode_any(&message.fields) {
                        Some(StreamEvent::Candle(c)) => info!("{} {c}", message.id),
                        Some(StreamEvent::BookTopN(b)) => info!("{} {b}", message.id),
                        Some(StreamEvent::Trade(t)) => info!("{} {t}", message.id),
                        None => warn!("{} undecodable entry, dropping", message.id),
                    }
                    Ok(())
                },
                ProcessOptions::default(),
            )
            .await?;
    }

    info!("demo complete");
    Ok(())
}

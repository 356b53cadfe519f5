//! Normalized read results.
//!
//! The store's claim reply and group-read reply differ in structure. Both
//! are adapted into the one representation the processing loop consumes:
//! batches of messages keyed by stream, in store order.

use mdbus_core::codec::FieldMap;

use crate::store::{ClaimReply, MessageId, ReadReply, StoreEntry};

/// One message delivered to a consumer.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub id: MessageId,
    pub fields: FieldMap,
}

impl From<StoreEntry> for StreamMessage {
    fn from(entry: StoreEntry) -> Self {
        Self {
            id: entry.id,
            fields: entry.fields,
        }
    }
}

/// Messages delivered from one stream, in store order.
#[derive(Debug, Clone)]
pub struct ReadBatch {
    pub key: String,
    pub messages: Vec<StreamMessage>,
}

/// Adapt a claim reply. Holes (entries trimmed from the stream while
/// pending) are filtered out; an empty or all-hole reply yields no batch.
pub fn normalize_claim(key: &str, reply: ClaimReply) -> Vec<ReadBatch> {
    let messages: Vec<StreamMessage> = reply
        .entries
        .into_iter()
        .flatten()
        .map(Into::into)
        .collect();
    if messages.is_empty() {
        return Vec::new();
    }
    vec![ReadBatch {
        key: key.to_string(),
        messages,
    }]
}

/// Adapt a group-read reply. The store's nil reply (nothing arrived within
/// the block window) yields no batches.
pub fn normalize_read(reply: Option<Vec<ReadReply>>) -> Vec<ReadBatch> {
    reply
        .unwrap_or_default()
        .into_iter()
        .map(|r| ReadBatch {
            key: r.key,
            messages: r.entries.into_iter().map(Into::into).collect(),
        })
        .collect()
}

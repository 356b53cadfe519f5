//! In-memory [`StreamStore`] implementation.
//!
//! Reference store with real consumer-group semantics: delivery cursors,
//! pending-entry ownership with idle tracking, blocking reads, approximate
//! MAXLEN trimming, and claim holes for entries trimmed away while pending.
//! Serves tests and development without a server.
//!
//! Idle tracking uses `tokio::time::Instant`, so paused-clock tests can
//! drive idle thresholds deterministically with `tokio::time::advance`.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use mdbus_core::codec::FieldMap;
use mdbus_core::time_util;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::store::{ClaimReply, MessageId, ReadReply, StoreEntry, StoreError, StreamStore};

/// Extra entries tolerated above a stream's cap before a trim cuts back.
/// Mirrors the node-granularity slack real stores use for approximate
/// trimming: length converges to the cap but may exceed it by up to this
/// much between trims.
pub const TRIM_SLACK: u64 = 64;

// ---------------------------------------------------------------------------
// Entry ids
// ---------------------------------------------------------------------------

/// Entry id with numeric ordering: (epoch milliseconds, per-ms sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EntryId {
    ms: u64,
    seq: u64,
}

impl EntryId {
    const ZERO: Self = Self { ms: 0, seq: 0 };

    fn to_message_id(self) -> MessageId {
        MessageId(format!("{}-{}", self.ms, self.seq))
    }

    /// Parse `"{ms}-{seq}"`; a bare `"{ms}"` reads as sequence 0.
    fn parse(raw: &str) -> Option<Self> {
        match raw.split_once('-') {
            Some((ms, seq)) => Some(Self {
                ms: ms.parse().ok()?,
                seq: seq.parse().ok()?,
            }),
            None => Some(Self {
                ms: raw.parse().ok()?,
                seq: 0,
            }),
        }
    }

    fn next(self) -> Self {
        Self {
            ms: self.ms,
            seq: self.seq + 1,
        }
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::ZERO
    }
}

// ---------------------------------------------------------------------------
// Stream and group state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PendingEntry {
    consumer: String,
    delivered_at: Instant,
}

#[derive(Default)]
struct GroupState {
    /// Highest id ever delivered via a group read.
    last_delivered: EntryId,
    /// Delivered but unacknowledged entries, ordered by id.
    pending: BTreeMap<EntryId, PendingEntry>,
}

#[derive(Default)]
struct StreamState {
    entries: BTreeMap<EntryId, FieldMap>,
    last_id: EntryId,
    groups: AHashMap<String, GroupState>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory store with consumer-group semantics.
#[derive(Default)]
pub struct MemoryStreamStore {
    streams: Mutex<AHashMap<String, StreamState>>,
    appended: Notify,
}

impl MemoryStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stream length. Diagnostic helper; real stores expose the
    /// equivalent via their own introspection commands.
    pub async fn stream_len(&self, key: &str) -> usize {
        self.streams
            .lock()
            .await
            .get(key)
            .map_or(0, |s| s.entries.len())
    }

    /// Pending-set size for one group.
    pub async fn pending_len(&self, key: &str, group: &str) -> usize {
        self.streams
            .lock()
            .await
            .get(key)
            .and_then(|s| s.groups.get(group))
            .map_or(0, |g| g.pending.len())
    }

    fn assign_id(state: &mut StreamState) -> EntryId {
        let now = time_util::now_ms();
        let id = if now > state.last_id.ms {
            EntryId { ms: now, seq: 0 }
        } else {
            state.last_id.next()
        };
        state.last_id = id;
        id
    }

    fn no_group(key: &str, group: &str) -> StoreError {
        StoreError::NoGroup {
            key: key.to_string(),
            group: group.to_string(),
        }
    }
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn append(
        &self,
        key: &str,
        fields: FieldMap,
        maxlen: Option<u64>,
    ) -> Result<MessageId, StoreError> {
        let mut streams = self.streams.lock().await;
        let state = streams.entry(key.to_string()).or_default();
        let id = Self::assign_id(state);
        state.entries.insert(id, fields);

        if let Some(cap) = maxlen {
            // Approximate trim: let the stream run over the cap by the
            // slack, then cut back to the cap in one pass.
            if state.entries.len() as u64 > cap + TRIM_SLACK {
                while state.entries.len() as u64 > cap {
                    state.entries.pop_first();
                }
                debug!("[{key}] trimmed to {} entries", state.entries.len());
            }
        }
        drop(streams);

        self.appended.notify_waiters();
        Ok(id.to_message_id())
    }

    async fn create_group(
        &self,
        key: &str,
        group: &str,
        start_id: &str,
        mkstream: bool,
    ) -> Result<(), StoreError> {
        let mut streams = self.streams.lock().await;
        if !mkstream && !streams.contains_key(key) {
            return Err(StoreError::Backend(format!("no such stream '{key}'")));
        }
        let state = streams.entry(key.to_string()).or_default();

        if state.groups.contains_key(group) {
            return Err(StoreError::GroupExists {
                key: key.to_string(),
                group: group.to_string(),
            });
        }

        let last_delivered = if start_id == "$" {
            state.last_id
        } else {
            EntryId::parse(start_id)
                .ok_or_else(|| StoreError::Backend(format!("invalid start id '{start_id}'")))?
        };
        state.groups.insert(
            group.to_string(),
            GroupState {
                last_delivered,
                pending: BTreeMap::new(),
            },
        );
        debug!("[{key}] group '{group}' created at '{start_id}'");
        Ok(())
    }

    async fn claim_stale(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        start_id: &str,
        count: usize,
    ) -> Result<ClaimReply, StoreError> {
        let start = EntryId::parse(start_id).unwrap_or(EntryId::ZERO);
        let mut streams = self.streams.lock().await;
        let state = streams
            .get_mut(key)
            .ok_or_else(|| Self::no_group(key, group))?;
        let StreamState { entries, groups, .. } = state;
        let group_state = groups
            .get_mut(group)
            .ok_or_else(|| Self::no_group(key, group))?;

        let now = Instant::now();
        let stale: Vec<EntryId> = group_state
            .pending
            .range(start..)
            .filter(|(_, p)| now.duration_since(p.delivered_at) >= min_idle)
            .map(|(id, _)| *id)
            .collect();

        let mut claimed = Vec::new();
        let mut cursor = EntryId::ZERO;
        for id in stale {
            if claimed.len() >= count {
                // More eligible entries remain; hand back a resume point.
                cursor = id;
                break;
            }
            match entries.get(&id) {
                Some(fields) => {
                    let prev = group_state.pending.insert(
                        id,
                        PendingEntry {
                            consumer: consumer.to_string(),
                            delivered_at: now,
                        },
                    );
                    if let Some(prev) = prev {
                        debug!(
                            "[{key}] {} reclaimed from '{}' by '{consumer}'",
                            id.to_message_id(),
                            prev.consumer
                        );
                    }
                    claimed.push(Some(StoreEntry {
                        id: id.to_message_id(),
                        fields: fields.clone(),
                    }));
                }
                None => {
                    // The message was trimmed away while pending: drop the
                    // pending entry and report a hole.
                    group_state.pending.remove(&id);
                    claimed.push(None);
                }
            }
        }

        Ok(ClaimReply {
            cursor: cursor.to_message_id(),
            entries: claimed,
        })
    }

    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Option<Vec<ReadReply>>, StoreError> {
        let deadline = block
            .filter(|d| !d.is_zero())
            .map(|d| Instant::now() + d);

        loop {
            // Register interest before checking, so an append between the
            // check and the wait still wakes us.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut streams = self.streams.lock().await;
                let state = streams
                    .get_mut(key)
                    .ok_or_else(|| Self::no_group(key, group))?;
                let StreamState { entries, groups, .. } = state;
                let group_state = groups
                    .get_mut(group)
                    .ok_or_else(|| Self::no_group(key, group))?;

                let fresh: Vec<(EntryId, FieldMap)> = entries
                    .range((Bound::Excluded(group_state.last_delivered), Bound::Unbounded))
                    .take(count)
                    .map(|(id, fields)| (*id, fields.clone()))
                    .collect();

                if !fresh.is_empty() {
                    let now = Instant::now();
                    let mut delivered = Vec::with_capacity(fresh.len());
                    for (id, fields) in fresh {
                        group_state.last_delivered = id;
                        group_state.pending.insert(
                            id,
                            PendingEntry {
                                consumer: consumer.to_string(),
                                delivered_at: now,
                            },
                        );
                        delivered.push(StoreEntry {
                            id: id.to_message_id(),
                            fields,
                        });
                    }
                    return Ok(Some(vec![ReadReply {
                        key: key.to_string(),
                        entries: delivered,
                    }]));
                }
            }

            // Nothing to deliver: nil reply unless still inside the block
            // window.
            let Some(deadline) = deadline else {
                return Ok(None);
            };
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, key: &str, group: &str, ids: &[MessageId]) -> Result<u64, StoreError> {
        let mut streams = self.streams.lock().await;
        // Missing stream or group acks nothing rather than erroring,
        // matching store ack semantics.
        let Some(group_state) = streams
            .get_mut(key)
            .and_then(|s| s.groups.get_mut(group))
        else {
            return Ok(0);
        };

        let mut removed = 0;
        for id in ids {
            if let Some(entry_id) = EntryId::parse(id.as_str()) {
                if group_state.pending.remove(&entry_id).is_some() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(v: &str) -> FieldMap {
        let mut f = FieldMap::default();
        f.insert("v".into(), v.into());
        f
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let store = MemoryStreamStore::new();
        let a = store.append("s", fields("1"), None).await.unwrap();
        let b = store.append("s", fields("2"), None).await.unwrap();
        assert!(EntryId::parse(a.as_str()).unwrap() < EntryId::parse(b.as_str()).unwrap());
    }

    #[tokio::test]
    async fn duplicate_group_reports_exists() {
        let store = MemoryStreamStore::new();
        store.create_group("s", "g", "0", true).await.unwrap();
        match store.create_group("s", "g", "0", true).await {
            Err(StoreError::GroupExists { key, group }) => {
                assert_eq!(key, "s");
                assert_eq!(group, "g");
            }
            other => panic!("expected GroupExists, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_group_without_mkstream_requires_stream() {
        let store = MemoryStreamStore::new();
        assert!(matches!(
            store.create_group("missing", "g", "0", false).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn read_group_unknown_group_errors() {
        let store = MemoryStreamStore::new();
        store.append("s", fields("1"), None).await.unwrap();
        assert!(matches!(
            store.read_group("s", "g", "c", 10, None).await,
            Err(StoreError::NoGroup { .. })
        ));
    }

    #[tokio::test]
    async fn dollar_start_skips_backlog() {
        let store = MemoryStreamStore::new();
        store.append("s", fields("old"), None).await.unwrap();
        store.create_group("s", "g", "$", true).await.unwrap();

        let reply = store.read_group("s", "g", "c", 10, None).await.unwrap();
        assert!(reply.is_none());

        store.append("s", fields("new"), None).await.unwrap();
        let reply = store.read_group("s", "g", "c", 10, None).await.unwrap().unwrap();
        assert_eq!(reply[0].entries.len(), 1);
        assert_eq!(reply[0].entries[0].fields.get("v").unwrap(), "new");
    }

    #[tokio::test]
    async fn trim_converges_near_cap() {
        let store = MemoryStreamStore::new();
        let cap = 100u64;
        for i in 0..(cap + 500) {
            store
                .append("s", fields(&i.to_string()), Some(cap))
                .await
                .unwrap();
        }
        let len = store.stream_len("s").await as u64;
        assert!(len >= cap, "len {len} below cap {cap}");
        assert!(len <= cap + TRIM_SLACK, "len {len} exceeds cap + slack");
    }

    #[tokio::test(start_paused = true)]
    async fn claim_respects_min_idle() {
        let store = MemoryStreamStore::new();
        store.create_group("s", "g", "0", true).await.unwrap();
        store.append("s", fields("1"), None).await.unwrap();
        store.read_group("s", "g", "a", 10, None).await.unwrap();

        let min_idle = Duration::from_secs(60);
        tokio::time::advance(min_idle - Duration::from_millis(1)).await;
        let reply = store
            .claim_stale("s", "g", "b", min_idle, "0-0", 10)
            .await
            .unwrap();
        assert!(reply.entries.is_empty(), "claimed before min_idle elapsed");

        tokio::time::advance(Duration::from_millis(1)).await;
        let reply = store
            .claim_stale("s", "g", "b", min_idle, "0-0", 10)
            .await
            .unwrap();
        assert_eq!(reply.entries.len(), 1);
        assert!(reply.entries[0].is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn claim_reports_holes_for_trimmed_entries() {
        let store = MemoryStreamStore::new();
        store.create_group("s", "g", "0", true).await.unwrap();
        let id = store.append("s", fields("1"), None).await.unwrap();
        store.read_group("s", "g", "a", 10, None).await.unwrap();

        // Trim the entry away while it is still pending.
        for i in 0..(TRIM_SLACK + 2) {
            store
                .append("s", fields(&i.to_string()), Some(1))
                .await
                .unwrap();
        }
        assert!(store.stream_len("s").await as u64 <= 1 + TRIM_SLACK);

        tokio::time::advance(Duration::from_secs(120)).await;
        let reply = store
            .claim_stale("s", "g", "b", Duration::from_secs(60), "0-0", 10)
            .await
            .unwrap();
        assert!(
            reply.entries.iter().any(|e| e.is_none()),
            "expected a hole for {id}"
        );
        // The hole is dropped from the pending set for good.
        assert_eq!(store.pending_len("s", "g").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_read_returns_when_data_arrives() {
        let store = std::sync::Arc::new(MemoryStreamStore::new());
        store.create_group("s", "g", "0", true).await.unwrap();

        let writer = store.clone();
        let write = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            writer.append("s", fields("late"), None).await.unwrap();
        });

        let reply = store
            .read_group("s", "g", "c", 10, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        write.await.unwrap();

        let reply = reply.expect("blocking read should have seen the append");
        assert_eq!(reply[0].entries[0].fields.get("v").unwrap(), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_read_times_out_to_nil() {
        let store = MemoryStreamStore::new();
        store.create_group("s", "g", "0", true).await.unwrap();
        let reply = store
            .read_group("s", "g", "c", 10, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn ack_counts_only_removed_ids() {
        let store = MemoryStreamStore::new();
        store.create_group("s", "g", "0", true).await.unwrap();
        store.append("s", fields("1"), None).await.unwrap();
        let reply = store.read_group("s", "g", "c", 10, None).await.unwrap().unwrap();
        let id = reply[0].entries[0].id.clone();

        assert_eq!(store.ack("s", "g", &[id.clone()]).await.unwrap(), 1);
        // Second ack of the same id, plus an id the group never saw.
        assert_eq!(
            store
                .ack("s", "g", &[id, MessageId::from("999-0")])
                .await
                .unwrap(),
            0
        );
        // Unknown stream acks nothing rather than erroring.
        assert_eq!(store.ack("missing", "g", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn new_messages_are_not_double_delivered_within_group() {
        let store = MemoryStreamStore::new();
        store.create_group("s", "g", "0", true).await.unwrap();
        store.append("s", fields("1"), None).await.unwrap();

        let first = store.read_group("s", "g", "a", 10, None).await.unwrap();
        assert!(first.is_some());
        let second = store.read_group("s", "g", "b", 10, None).await.unwrap();
        assert!(second.is_none(), "same new entry delivered twice");
    }
}

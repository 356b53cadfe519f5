//! Narrow capability interface to the external log store.
//!
//! The bus needs exactly five operations; everything else about the store
//! (connection lifecycle, retention mechanics, cursor persistence) stays
//! behind the implementation, so the store is swappable. The claim and read
//! reply shapes deliberately mirror the store's differing wire replies;
//! [`crate::normalize`] reconciles both into one representation.

use std::time::Duration;

use async_trait::async_trait;
use mdbus_core::codec::FieldMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Identifiers and reply shapes
// ---------------------------------------------------------------------------

/// Store-assigned entry identifier.
///
/// Opaque to the bus: monotonically increasing within one stream, used for
/// causal ordering inside that stream and as the acknowledgment key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for MessageId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One raw entry as returned by the store.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub id: MessageId,
    pub fields: FieldMap,
}

/// Reply shape of a stale-claim call.
#[derive(Debug, Clone)]
pub struct ClaimReply {
    /// Scan cursor: the id to continue from, or `"0-0"` once the pending
    /// set has been fully scanned.
    pub cursor: MessageId,
    /// Claimed entries. `None` marks a pending id whose message has been
    /// trimmed from the stream; the store drops it from the pending set.
    pub entries: Vec<Option<StoreEntry>>,
}

/// Per-stream reply shape of a group read.
#[derive(Debug, Clone)]
pub struct ReadReply {
    pub key: String,
    pub entries: Vec<StoreEntry>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Group creation hit an existing group of the same name.
    #[error("group '{group}' already exists on '{key}'")]
    GroupExists { key: String, group: String },

    /// Read or claim against a group that was never created.
    #[error("no such group '{group}' on '{key}'")]
    NoGroup { key: String, group: String },

    /// Transport-level failure (connect, send, receive).
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other store-side failure.
    #[error("store error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// The five store operations the bus depends on.
///
/// Implementations guarantee: append order within one stream is delivery
/// order for group reads; group cursors and pending sets are serialized by
/// the store; duplicate group creation reports [`StoreError::GroupExists`].
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Append a field map to `key`, returning the assigned id. When
    /// `maxlen` is set, the stream is trimmed to approximately that length;
    /// the store may retain somewhat more for efficiency.
    async fn append(
        &self,
        key: &str,
        fields: FieldMap,
        maxlen: Option<u64>,
    ) -> Result<MessageId, StoreError>;

    /// Create `group` on `key`, delivering entries after `start_id`
    /// (`"0"` for the full backlog, `"$"` for only-new). `mkstream`
    /// creates the backing stream if absent.
    async fn create_group(
        &self,
        key: &str,
        group: &str,
        start_id: &str,
        mkstream: bool,
    ) -> Result<(), StoreError>;

    /// Reassign up to `count` pending entries idle for at least `min_idle`
    /// to `consumer`, scanning from `start_id`. Resets the idle clock of
    /// everything claimed.
    async fn claim_stale(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        start_id: &str,
        count: usize,
    ) -> Result<ClaimReply, StoreError>;

    /// Read up to `count` never-delivered entries, marking them pending
    /// under `consumer`. Waits up to `block` for data when set; `None` is
    /// the store's nil reply when nothing arrived in time.
    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Option<Vec<ReadReply>>, StoreError>;

    /// Remove `ids` from the group's pending set. Returns how many were
    /// actually removed; unknown or already-acked ids are simply not
    /// counted.
    async fn ack(&self, key: &str, group: &str, ids: &[MessageId]) -> Result<u64, StoreError>;
}

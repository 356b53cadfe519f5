//! Bus consumer: group bootstrap, stale-entry reclamation, new-entry reads,
//! and the failure-tolerant processing loop.
//!
//! # Message state machine
//!
//! ```text
//! New ──read_new──► Pending(owner, delivered_at) ──ack──► Acked (terminal)
//!                        │
//!                        └─ idle >= min_idle ──read_pending──► Pending(new owner)
//! ```
//!
//! Reclaim count is unbounded; each reclaim resets the idle clock and
//! ownership. A message never acked is re-offered until it is, which is
//! what gives the bus at-least-once delivery. Duplicate delivery of stale
//! entries to two group members is expected and must be handled by
//! idempotent logic downstream.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mdbus_core::config::ConsumerConfig;
use mdbus_core::types::StreamType;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BusError, Result};
use crate::normalize::{self, ReadBatch, StreamMessage};
use crate::store::{MessageId, StoreError, StreamStore};

/// Start id covering the whole backlog when bootstrapping a group.
pub const START_BEGINNING: &str = "0";

/// Start id skipping the backlog: only entries appended after creation.
pub const START_NEW_ONLY: &str = "$";

/// Claim scan origin: always rescan the pending set from the start.
const CLAIM_SCAN_START: &str = "0-0";

/// Default fresh-entry read count in the processing loop.
const DEFAULT_FRESH_COUNT: usize = 100;

/// Options for [`BusConsumer::process_pending_and_new`].
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Max stale entries reclaimed first (default: the configured
    /// `claim_count`).
    pub pending_count: Option<usize>,

    /// Max fresh entries read after the pending drain (default: 100).
    pub fresh_count: Option<usize>,

    /// How long to wait for fresh entries; `None` returns immediately with
    /// whatever is available.
    pub block: Option<Duration>,

    /// Skip messages whose handler fails instead of aborting the batch.
    /// Skipped messages are not acked and stay reclaimable; with a handler
    /// that always fails on one poisoned message this means permanent skip,
    /// as no dead-letter mechanism exists at this layer.
    pub continue_on_error: bool,
}

/// One member of a named consumer group.
///
/// Owns one store session exclusively. All operations are scoped to the
/// `(stream, group)` pair fixed by the config; the consumer identity within
/// the group is generated when not configured.
pub struct BusConsumer {
    store: Arc<dyn StreamStore>,
    config: ConsumerConfig,
    consumer_name: String,
}

impl BusConsumer {
    pub fn new(store: Arc<dyn StreamStore>, config: ConsumerConfig) -> Self {
        let consumer_name = config
            .consumer_name
            .clone()
            .unwrap_or_else(|| format!("consumer-{}", Uuid::new_v4()));
        Self {
            store,
            config,
            consumer_name,
        }
    }

    /// This consumer's identity within the group.
    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Stream key for one event type.
    pub fn stream_key(&self, ty: StreamType) -> String {
        format!("{}:{}", self.config.effective_stream_base(), ty.suffix())
    }

    // -----------------------------------------------------------------------
    // Group bootstrap
    // -----------------------------------------------------------------------

    /// Idempotent group bootstrap covering the whole backlog.
    pub async fn ensure_group(&self, ty: StreamType) -> Result<()> {
        self.ensure_group_from(ty, START_BEGINNING).await
    }

    /// Idempotent group bootstrap at an explicit start id.
    ///
    /// Creates the backing stream if absent. An already-existing group is
    /// success, so this is safe to call repeatedly and from several
    /// consumer instances at once; any other failure propagates.
    pub async fn ensure_group_from(&self, ty: StreamType, start_id: &str) -> Result<()> {
        let key = self.stream_key(ty);
        let group = &self.config.group_name;
        match self.store.create_group(&key, group, start_id, true).await {
            Ok(()) => {
                debug!("[{key}] group '{group}' created at '{start_id}'");
                Ok(())
            }
            Err(StoreError::GroupExists { .. }) => {
                debug!("[{key}] group '{group}' already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Reclaim entries idle for at least `min_idle_ms`, up to `count`
    /// (default: the configured `claim_count`), reassigning ownership to
    /// this consumer. An empty pending set yields an empty result, not an
    /// error.
    pub async fn read_pending(
        &self,
        ty: StreamType,
        count: Option<usize>,
    ) -> Result<Vec<ReadBatch>> {
        let key = self.stream_key(ty);
        let reply = self
            .store
            .claim_stale(
                &key,
                &self.config.group_name,
                &self.consumer_name,
                self.config.effective_min_idle(),
                CLAIM_SCAN_START,
                count.unwrap_or_else(|| self.config.effective_claim_count()),
            )
            .await?;

        let holes = reply.entries.iter().filter(|e| e.is_none()).count();
        if holes > 0 {
            warn!("[{key}] {holes} pending entries were trimmed before reclaim");
        }

        let batches = normalize::normalize_claim(&key, reply);
        if let Some(batch) = batches.first() {
            debug!("[{key}] reclaimed {} stale entries", batch.messages.len());
        }
        Ok(batches)
    }

    /// Read entries never delivered to any group member, marking them
    /// pending under this consumer. `block` `None` returns immediately with
    /// whatever is available (possibly nothing); a positive duration waits
    /// up to that long for at least one entry.
    pub async fn read_new(
        &self,
        ty: StreamType,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<ReadBatch>> {
        let key = self.stream_key(ty);
        let reply = self
            .store
            .read_group(
                &key,
                &self.config.group_name,
                &self.consumer_name,
                count,
                block,
            )
            .await?;
        Ok(normalize::normalize_read(reply))
    }

    // -----------------------------------------------------------------------
    // Processing loop
    // -----------------------------------------------------------------------

    /// Canonical processing pass: drain stale-pending entries, then fresh
    /// ones, and handle every message strictly in order, pending before
    /// new. Each message is acked immediately after its handler succeeds.
    ///
    /// On handler failure the default is fail-fast: the pass aborts with
    /// [`BusError::Handler`], already-acked messages stay acked, and the
    /// failing message plus everything after it remain pending for a later
    /// pass or reclaim. With [`ProcessOptions::continue_on_error`] the
    /// failing message is skipped (left pending) and the pass continues.
    pub async fn process_pending_and_new<F, Fut>(
        &self,
        ty: StreamType,
        mut handler: F,
        options: ProcessOptions,
    ) -> Result<()>
    where
        F: FnMut(StreamMessage) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let pending = self.read_pending(ty, options.pending_count).await?;
        let fresh = self
            .read_new(
                ty,
                options.fresh_count.unwrap_or(DEFAULT_FRESH_COUNT),
                options.block,
            )
            .await?;

        for batch in pending.into_iter().chain(fresh) {
            for message in batch.messages {
                let id = message.id.clone();
                match handler(message).await {
                    Ok(()) => {
                        self.ack(ty, std::slice::from_ref(&id)).await?;
                    }
                    Err(e) if options.continue_on_error => {
                        warn!("[{}] handler failed on {id}, skipping: {e:#}", batch.key);
                    }
                    Err(e) => return Err(BusError::Handler { id, source: e }),
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Acknowledgment
    // -----------------------------------------------------------------------

    /// Acknowledge handled messages. Returns how many ids were actually
    /// removed from the pending set; unknown or already-acked ids are not
    /// counted and are not an error.
    pub async fn ack(&self, ty: StreamType, ids: &[MessageId]) -> Result<u64> {
        let key = self.stream_key(ty);
        let removed = self.store.ack(&key, &self.config.group_name, ids).await?;
        debug!("[{key}] acked {removed}/{} ids", ids.len());
        Ok(removed)
    }
}

//! Typed error definitions for the stream bus.
//!
//! Store failures pass through unmodified with their source preserved;
//! handler failures carry the id of the message that was being processed
//! when the batch aborted.

use thiserror::Error;

use crate::store::{MessageId, StoreError};

pub type Result<T> = std::result::Result<T, BusError>;

/// Errors surfaced by the producer and consumer.
#[derive(Debug, Error)]
pub enum BusError {
    /// Store or transport failure, propagated verbatim. No retry is
    /// performed at this layer.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A message handler failed during batch processing. The named message
    /// and everything after it in the batch remain pending.
    #[error("handler failed on message {id}")]
    Handler {
        id: MessageId,
        #[source]
        source: anyhow::Error,
    },
}

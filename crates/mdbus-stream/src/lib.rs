//! # mdbus-stream
//!
//! Stream-bus protocol crate: typed event publishing and consumer-group
//! processing over an append-only log store.
//!
//! ## Architecture
//!
//! ```text
//! BusProducer ──encode──► StreamStore (per-type stream, approximate cap)
//! BusConsumer ──claim/read──► handler ──ack──► StreamStore
//! ```
//!
//! - [`store`]: narrow capability trait plus the raw store reply shapes
//! - [`normalize`]: claim/read reply reconciliation into [`ReadBatch`]es
//! - [`producer`]: event publishing with per-type retention caps
//! - [`consumer`]: group bootstrap, stale reclamation, processing loop
//! - [`memory`]: in-memory reference store with full group semantics
//! - [`error`]: bus error type
//!
//! Delivery is at-least-once: a message is re-offered via reclamation until
//! it is acknowledged, so duplicate delivery of stale entries is expected
//! and must be handled by idempotent logic downstream.

pub mod consumer;
pub mod error;
pub mod memory;
pub mod normalize;
pub mod producer;
pub mod store;

pub use consumer::{BusConsumer, ProcessOptions, START_BEGINNING, START_NEW_ONLY};
pub use error::{BusError, Result};
pub use memory::MemoryStreamStore;
pub use normalize::{ReadBatch, StreamMessage};
pub use producer::BusProducer;
pub use store::{MessageId, StoreError, StreamStore};

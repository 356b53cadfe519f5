//! # mdbus-core
//!
//! Core crate for the market-data stream bus, providing:
//!
//! - **Types** (`types`): stream event structs plus side and stream-type enums
//! - **Codec** (`codec`): typed-to-flat-field encode/decode with strict validation
//! - **Configuration** (`config`): producer/consumer config and JSON loading
//! - **Logging** (`logging`): tracing-based structured logging
//! - **Time utilities** (`time_util`): epoch-millisecond timestamps

pub mod codec;
pub mod config;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;

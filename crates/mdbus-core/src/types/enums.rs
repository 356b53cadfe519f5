//! Enumerations used throughout the stream bus.
//!
//! [`StreamType`] doubles as the routing discriminant (stream key suffix) and
//! the wire type tag; [`Side`] is the taker direction of a trade.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stream types
// ---------------------------------------------------------------------------

/// The three event streams carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Candle,
    Book,
    Trade,
}

impl StreamType {
    /// Stream key suffix, appended to the configured stream base
    /// (e.g. `md_stream:candle`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Candle => "candle",
            Self::Book => "book",
            Self::Trade => "trade",
        }
    }

    /// Wire type tag carried in the `t` field of every stream entry.
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Candle => "CANDLE",
            Self::Book => "BOOK_TOPN",
            Self::Trade => "TRADE",
        }
    }

    /// Reverse lookup from a wire type tag. Unknown tags map to `None`.
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "CANDLE" => Some(Self::Candle),
            "BOOK_TOPN" => Some(Self::Book),
            "TRADE" => Some(Self::Trade),
            _ => None,
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

// ---------------------------------------------------------------------------
// Trade side
// ---------------------------------------------------------------------------

/// Taker direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Single-character wire tag (`B` / `S`).
    pub fn tag(self) -> &'static str {
        match self {
            Self::Buy => "B",
            Self::Sell => "S",
        }
    }

    /// Parse a wire tag. Anything other than exactly `B` or `S` is rejected
    /// rather than coerced to a default side.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "B" => Some(Self::Buy),
            "S" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

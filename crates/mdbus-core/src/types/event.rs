//! Stream event structures: the typed values flowing through the bus.
//!
//! Price, size, and volume fields are decimal values carried as exact-text
//! strings and are never parsed to floating point, so no precision is lost
//! between producer and consumer. Timestamps are integer epoch milliseconds.
//!
//! `event_ts` is the moment the producing side observed the event. Older
//! payloads may omit it, so it is typed as `Option<i64>` rather than being
//! coerced to a sentinel value on decode.

use super::enums::{Side, StreamType};

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// An OHLCV candle for one coin and interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    pub coin: String,
    /// Candle interval label (e.g. `"1m"`, `"1h"`).
    pub interval: String,
    /// Candle open time, epoch milliseconds.
    pub start_ts: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    /// Whether the candle window has closed.
    pub is_closed: bool,
    pub event_ts: Option<i64>,
}

// ---------------------------------------------------------------------------
// BookTopN
// ---------------------------------------------------------------------------

/// Top-N order book snapshot.
///
/// `bids[0]` is the best (highest) bid, `asks[0]` the best (lowest) ask.
/// Each level is a `(price_text, size_text)` pair; level count is at most
/// `depth` by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookTopN {
    pub coin: String,
    pub depth: u32,
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
    pub event_ts: Option<i64>,
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// A single trade execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub coin: String,
    /// Trade time, epoch milliseconds.
    pub ts: i64,
    pub price: String,
    pub size: String,
    pub side: Side,
    pub event_ts: Option<i64>,
}

// ---------------------------------------------------------------------------
// StreamEvent tagged union
// ---------------------------------------------------------------------------

/// A tagged union of all event kinds carried by the bus.
///
/// The enum is closed and both codec directions match it exhaustively, so
/// adding a kind is a compile-time-checked change, not a silent fallthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Candle(Candle),
    BookTopN(BookTopN),
    Trade(Trade),
}

impl StreamEvent {
    /// The stream this event is routed to.
    pub fn stream_type(&self) -> StreamType {
        match self {
            Self::Candle(_) => StreamType::Candle,
            Self::BookTopN(_) => StreamType::Book,
            Self::Trade(_) => StreamType::Trade,
        }
    }
}

// ---------------------------------------------------------------------------
// Display impls
// ---------------------------------------------------------------------------

impl std::fmt::Display for Candle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Candle({} {} o={} h={} l={} c={} v={} closed={})",
            self.coin, self.interval, self.open, self.high, self.low, self.close, self.volume,
            self.is_closed
        )
    }
}

impl std::fmt::Display for BookTopN {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bid = self.bids.first().map(|(px, _)| px.as_str()).unwrap_or("-");
        let ask = self.asks.first().map(|(px, _)| px.as_str()).unwrap_or("-");
        write!(f, "BookTop{}({} bid={bid} ask={ask})", self.depth, self.coin)
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade({} {} {}x{} ts={})",
            self.coin, self.side, self.price, self.size, self.ts
        )
    }
}

//! Event codec: typed events to flat string field maps and back.
//!
//! Encoding is a total function with no failure mode. Decoding validates
//! strictly and fails fast to `None`:
//!
//! 1. the `ver` field must equal [`SCHEMA_VERSION`]
//! 2. the `t` field must match the kind being decoded
//! 3. required numeric fields must parse as integers (missing field,
//!    `"NaN"`, `"Infinity"`, or any unparsable text fails the decode)
//! 4. book `bids`/`asks` must be JSON arrays of 2-element text pairs; a
//!    parse failure on either side fails the whole decode
//!
//! The codec never substitutes defaults for required fields. The optional
//! `eventTs` decodes to `None` when the field is absent; a present but
//! unparsable value is a decode failure, not a fallback.

use ahash::AHashMap;

use crate::types::{BookTopN, Candle, Side, StreamEvent, StreamType, Trade};

/// Flat string-to-string field map, the wire representation of one entry.
pub type FieldMap = AHashMap<String, String>;

/// Schema version tag carried in the `ver` field of every entry.
pub const SCHEMA_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode an event into its wire field map.
///
/// Deterministic and total: every declared field of the variant is emitted
/// as text. `eventTs` is omitted entirely when unset.
pub fn encode(event: &StreamEvent) -> FieldMap {
    let mut fields = FieldMap::default();
    fields.insert("ver".into(), SCHEMA_VERSION.into());
    fields.insert("t".into(), event.stream_type().type_tag().into());

    match event {
        StreamEvent::Candle(c) => {
            fields.insert("coin".into(), c.coin.clone());
            fields.insert("interval".into(), c.interval.clone());
            fields.insert("startTs".into(), c.start_ts.to_string());
            fields.insert("o".into(), c.open.clone());
            fields.insert("h".into(), c.high.clone());
            fields.insert("l".into(), c.low.clone());
            fields.insert("c".into(), c.close.clone());
            fields.insert("v".into(), c.volume.clone());
            fields.insert("isClosed".into(), c.is_closed.to_string());
            put_event_ts(&mut fields, c.event_ts);
        }
        StreamEvent::BookTopN(b) => {
            fields.insert("coin".into(), b.coin.clone());
            fields.insert("depth".into(), b.depth.to_string());
            fields.insert("bids".into(), pairs_to_json(&b.bids));
            fields.insert("asks".into(), pairs_to_json(&b.asks));
            put_event_ts(&mut fields, b.event_ts);
        }
        StreamEvent::Trade(t) => {
            fields.insert("coin".into(), t.coin.clone());
            fields.insert("ts".into(), t.ts.to_string());
            fields.insert("px".into(), t.price.clone());
            fields.insert("sz".into(), t.size.clone());
            fields.insert("side".into(), t.side.tag().into());
            put_event_ts(&mut fields, t.event_ts);
        }
    }
    fields
}

fn put_event_ts(fields: &mut FieldMap, event_ts: Option<i64>) {
    if let Some(ts) = event_ts {
        fields.insert("eventTs".into(), ts.to_string());
    }
}

/// Serialize `(price, size)` pairs as a JSON array of 2-element arrays.
fn pairs_to_json(pairs: &[(String, String)]) -> String {
    let levels: Vec<serde_json::Value> = pairs
        .iter()
        .map(|(px, sz)| serde_json::json!([px, sz]))
        .collect();
    serde_json::Value::Array(levels).to_string()
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a candle field map. Returns `None` on any validation failure.
pub fn decode_candle(fields: &FieldMap) -> Option<Candle> {
    check_header(fields, StreamType::Candle)?;
    let start_ts = parse_i64_field(fields, "startTs")?;
    let is_closed = parse_bool_field(fields, "isClosed")?;
    let event_ts = parse_event_ts(fields)?;

    Some(Candle {
        coin: text_field(fields, "coin"),
        interval: text_field(fields, "interval"),
        start_ts,
        open: text_field(fields, "o"),
        high: text_field(fields, "h"),
        low: text_field(fields, "l"),
        close: text_field(fields, "c"),
        volume: text_field(fields, "v"),
        is_closed,
        event_ts,
    })
}

/// Decode a book top-N field map. Returns `None` on any validation failure.
///
/// `bids` and `asks` fail together: a malformed payload on either side
/// rejects the whole entry, partial success is not reported.
pub fn decode_book_top_n(fields: &FieldMap) -> Option<BookTopN> {
    check_header(fields, StreamType::Book)?;
    let depth = parse_u32_field(fields, "depth")?;
    let bids = parse_pair_list(fields.get("bids"))?;
    let asks = parse_pair_list(fields.get("asks"))?;
    let event_ts = parse_event_ts(fields)?;

    Some(BookTopN {
        coin: text_field(fields, "coin"),
        depth,
        bids,
        asks,
        event_ts,
    })
}

/// Decode a trade field map. Returns `None` on any validation failure.
///
/// The `side` tag must be exactly `B` or `S`; unknown tags reject the entry
/// instead of defaulting to a side.
pub fn decode_trade(fields: &FieldMap) -> Option<Trade> {
    check_header(fields, StreamType::Trade)?;
    let ts = parse_i64_field(fields, "ts")?;
    let side = Side::from_tag(fields.get("side")?)?;
    let event_ts = parse_event_ts(fields)?;

    Some(Trade {
        coin: text_field(fields, "coin"),
        ts,
        price: text_field(fields, "px"),
        size: text_field(fields, "sz"),
        side,
        event_ts,
    })
}

/// Decode any event kind, dispatching on the `t` type tag.
///
/// This is the single entry point consumers use. Unknown tags map to `None`.
pub fn decode_any(fields: &FieldMap) -> Option<StreamEvent> {
    match StreamType::from_type_tag(fields.get("t")?)? {
        StreamType::Candle => decode_candle(fields).map(StreamEvent::Candle),
        StreamType::Book => decode_book_top_n(fields).map(StreamEvent::BookTopN),
        StreamType::Trade => decode_trade(fields).map(StreamEvent::Trade),
    }
}

// ---------------------------------------------------------------------------
// Field parsing helpers
// ---------------------------------------------------------------------------

fn check_header(fields: &FieldMap, ty: StreamType) -> Option<()> {
    if fields.get("ver").map(String::as_str) != Some(SCHEMA_VERSION) {
        return None;
    }
    if fields.get("t").map(String::as_str) != Some(ty.type_tag()) {
        return None;
    }
    Some(())
}

/// Text field with the wire convention that a missing value reads as empty.
fn text_field(fields: &FieldMap, key: &str) -> String {
    fields.get(key).cloned().unwrap_or_default()
}

fn parse_i64_field(fields: &FieldMap, key: &str) -> Option<i64> {
    fields.get(key)?.parse().ok()
}

fn parse_u32_field(fields: &FieldMap, key: &str) -> Option<u32> {
    fields.get(key)?.parse().ok()
}

/// `true`/`false` only; anything else rejects the entry.
fn parse_bool_field(fields: &FieldMap, key: &str) -> Option<bool> {
    match fields.get(key)?.as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Optional `eventTs`: outer `None` is a decode failure, inner `None` means
/// the field was absent on the wire.
fn parse_event_ts(fields: &FieldMap) -> Option<Option<i64>> {
    match fields.get("eventTs") {
        None => Some(None),
        Some(raw) => raw.parse().ok().map(Some),
    }
}

/// JSON pair-list payload. A missing field reads as an empty level list;
/// a present but malformed payload is a decode failure.
fn parse_pair_list(raw: Option<&String>) -> Option<Vec<(String, String)>> {
    match raw {
        None => Some(Vec::new()),
        Some(s) => serde_json::from_str(s).ok(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tracing::warn;

static PARSE_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Raw deserializable shape covering the feed messages we care about.
/// Fields are optional because different message types carry different
/// subsets; normalization decides what is actually required.
#[derive(Debug, Deserialize)]
struct RawFeedMsg {
    #[serde(rename = "MessageType")]
    message_type: Option<String>,
    /// `RealtimeResult` only.
    #[serde(rename = "InstrumentIdentifier")]
    instrument: Option<String>,
    #[serde(rename = "LastTradePrice")]
    last_trade_price: Option<f64>,
    #[serde(rename = "OpenInterest")]
    open_interest: Option<i64>,
    /// Authentication response only.
    #[serde(rename = "Complete")]
    complete: Option<bool>,
    #[serde(rename = "Comment")]
    comment: Option<String>,
}

/// Parsed event from a single feed text frame.
#[derive(Debug)]
pub enum FeedFrame {
    /// Response to the credential exchange.
    AuthResult {
        complete: bool,
        comment: Option<String>,
    },
    /// A raw tick record. Price and OI stay optional here; the normalizer
    /// drops incomplete records against the registry.
    TickRecord {
        symbol: String,
        price: Option<f64>,
        oi: Option<i64>,
    },
}

/// Parse a raw feed frame into at most one event. Unrecognized frames are
/// counted and warned about at a sampled rate so a misbehaving feed cannot
/// flood the log.
pub fn parse_frame(raw: &str) -> Option<FeedFrame> {
    let msg: RawFeedMsg = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(_) => {
            note_parse_failure(raw);
            return None;
        }
    };

    match msg.message_type.as_deref() {
        Some("RealtimeResult") => match msg.instrument {
            Some(symbol) => Some(FeedFrame::TickRecord {
                symbol,
                price: msg.last_trade_price,
                oi: msg.open_interest,
            }),
            None => {
                warn!("realtime record without instrument identifier dropped");
                None
            }
        },
        // The auth response carries no stable MessageType; the Complete
        // field identifies it.
        _ => msg.complete.map(|complete| FeedFrame::AuthResult {
            complete,
            comment: msg.comment,
        }),
    }
}

fn note_parse_failure(raw: &str) {
    let count = PARSE_FAILURES.fetch_add(1, Ordering::Relaxed) + 1;
    if count <= 10 || count % 1000 == 0 {
        let sample = &raw[..200.min(raw.len())];
        warn!(count, "unrecognized feed frame: {sample}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_realtime_result() {
        let raw = r#"{"MessageType":"RealtimeResult","InstrumentIdentifier":"BANKNIFTY24FEB2658900CE","LastTradePrice":105.5,"OpenInterest":120000}"#;
        match parse_frame(raw) {
            Some(FeedFrame::TickRecord { symbol, price, oi }) => {
                assert_eq!(symbol, "BANKNIFTY24FEB2658900CE");
                assert!((price.unwrap() - 105.5).abs() < 1e-9);
                assert_eq!(oi, Some(120_000));
            }
            other => panic!("expected TickRecord, got {other:?}"),
        }
    }

    #[test]
    fn realtime_result_without_price_still_parses() {
        let raw = r#"{"MessageType":"RealtimeResult","InstrumentIdentifier":"SBIN27JAN26FUT"}"#;
        match parse_frame(raw) {
            Some(FeedFrame::TickRecord { symbol, price, oi }) => {
                assert_eq!(symbol, "SBIN27JAN26FUT");
                assert!(price.is_none());
                assert!(oi.is_none());
            }
            other => panic!("expected TickRecord, got {other:?}"),
        }
    }

    #[test]
    fn realtime_result_without_instrument_is_dropped() {
        let raw = r#"{"MessageType":"RealtimeResult","LastTradePrice":105.5}"#;
        assert!(parse_frame(raw).is_none());
    }

    #[test]
    fn parses_auth_outcomes() {
        match parse_frame(r#"{"Complete":true}"#) {
            Some(FeedFrame::AuthResult { complete: true, .. }) => {}
            other => panic!("expected successful AuthResult, got {other:?}"),
        }

        match parse_frame(r#"{"Complete":false,"Comment":"bad password"}"#) {
            Some(FeedFrame::AuthResult { complete: false, comment }) => {
                assert_eq!(comment.as_deref(), Some("bad password"));
            }
            other => panic!("expected rejected AuthResult, got {other:?}"),
        }
    }

    #[test]
    fn unknown_and_garbage_frames_return_none() {
        assert!(parse_frame(r#"{"MessageType":"Heartbeat"}"#).is_none());
        assert!(parse_frame("not json at all").is_none());
    }
}

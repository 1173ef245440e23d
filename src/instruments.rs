use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::Config;
use crate::types::{ContractKind, OptionSide};

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// Static contract metadata, parsed once at startup from the exchange
/// symbol notation. Options: `<UNDERLYING><DDMON><YY><STRIKE><CE|PE>`
/// (e.g. `BANKNIFTY24FEB2658900CE`). Futures: `...FUT` (dated) or `...-I`
/// (continuous).
#[derive(Debug, Clone)]
pub struct Instrument {
    pub symbol: String,
    pub underlying: String,
    pub kind: ContractKind,
    /// Options only.
    pub side: Option<OptionSide>,
    /// Options only.
    pub strike: Option<f64>,
    pub lot_size: u64,
}

impl Instrument {
    pub fn is_future(&self) -> bool {
        self.kind == ContractKind::Future
    }

    /// Display form of the strike leg, e.g. "58900CE". Empty for futures.
    pub fn strike_label(&self) -> String {
        match (self.strike, self.side) {
            (Some(strike), Some(side)) => format!("{strike:.0}{side}"),
            _ => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// InstrumentRegistry
// ---------------------------------------------------------------------------

/// Immutable symbol → instrument map for the configured universe.
/// Shared read-only across the feed and engine tasks.
pub struct InstrumentRegistry {
    by_symbol: HashMap<String, Instrument>,
}

impl InstrumentRegistry {
    /// Build the registry from the configured universe. Symbols that do not
    /// parse are rejected with a warning rather than guessed at.
    pub fn build(cfg: &Config) -> Self {
        let mut by_symbol = HashMap::with_capacity(cfg.symbols.len());
        let mut rejected = 0usize;

        for symbol in &cfg.symbols {
            match parse_symbol(symbol) {
                Some(parsed) => {
                    let lot_size = cfg.lot_size_for(&parsed.underlying);
                    by_symbol.insert(
                        symbol.clone(),
                        Instrument {
                            symbol: symbol.clone(),
                            underlying: parsed.underlying,
                            kind: parsed.kind,
                            side: parsed.side,
                            strike: parsed.strike,
                            lot_size,
                        },
                    );
                }
                None => {
                    rejected += 1;
                    warn!("unrecognized symbol {symbol:?} excluded from universe");
                }
            }
        }

        let futures = by_symbol.values().filter(|i| i.is_future()).count();
        info!(
            instruments = by_symbol.len(),
            futures,
            rejected,
            "instrument registry built"
        );

        Self { by_symbol }
    }

    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.by_symbol.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.by_symbol.keys().map(String::as_str)
    }

    /// Distinct underlying names across the universe.
    pub fn underlyings(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_symbol
            .values()
            .map(|i| i.underlying.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Symbol parsing
// ---------------------------------------------------------------------------

struct ParsedSymbol {
    underlying: String,
    kind: ContractKind,
    side: Option<OptionSide>,
    strike: Option<f64>,
}

fn parse_symbol(symbol: &str) -> Option<ParsedSymbol> {
    let underlying: String = symbol
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    // A bare alphabetic symbol carries neither a strike nor a future marker.
    if underlying.is_empty() || underlying.len() == symbol.len() {
        return None;
    }

    if symbol.ends_with("FUT") || symbol.ends_with("-I") {
        return Some(ParsedSymbol {
            underlying,
            kind: ContractKind::Future,
            side: None,
            strike: None,
        });
    }

    let side = if symbol.ends_with("CE") {
        OptionSide::Call
    } else if symbol.ends_with("PE") {
        OptionSide::Put
    } else {
        return None;
    };

    // The trailing digit run is the 2-digit expiry year followed by the
    // strike: "...FEB2658900CE" → "2658900" → year "26", strike 58900.
    let body = &symbol[..symbol.len() - 2];
    let digits: String = body
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.len() < 3 {
        return None;
    }
    let strike: f64 = digits[2..].parse().ok()?;

    Some(ParsedSymbol {
        underlying,
        kind: ContractKind::Option,
        side: Some(side),
        strike: Some(strike),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config(symbols: &[&str]) -> Config {
        Config {
            feed_url: String::new(),
            api_key: String::new(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            log_level: "info".to_string(),
            api_port: 3000,
            oi_roc_threshold: 2.0,
            momentum_window_secs: 300,
            min_lots_size_alert: 100,
            min_lots_momentum: 300,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            lot_sizes: vec![("BANKNIFTY".to_string(), 30), ("SBIN".to_string(), 750)],
            default_lot_size: 75,
        }
    }

    #[test]
    fn parses_dated_option_symbol() {
        let parsed = parse_symbol("BANKNIFTY24FEB2658900CE").expect("should parse");
        assert_eq!(parsed.underlying, "BANKNIFTY");
        assert_eq!(parsed.kind, ContractKind::Option);
        assert_eq!(parsed.side, Some(OptionSide::Call));
        assert_eq!(parsed.strike, Some(58900.0));

        let put = parse_symbol("SBIN24FEB261040PE").expect("should parse");
        assert_eq!(put.underlying, "SBIN");
        assert_eq!(put.side, Some(OptionSide::Put));
        assert_eq!(put.strike, Some(1040.0));
    }

    #[test]
    fn parses_both_future_conventions() {
        let dated = parse_symbol("BANKNIFTY27JAN26FUT").expect("should parse");
        assert_eq!(dated.kind, ContractKind::Future);
        assert_eq!(dated.underlying, "BANKNIFTY");
        assert!(dated.strike.is_none());

        let continuous = parse_symbol("HDFCBANK-I").expect("should parse");
        assert_eq!(continuous.kind, ContractKind::Future);
        assert_eq!(continuous.underlying, "HDFCBANK");
    }

    #[test]
    fn rejects_unparseable_symbols() {
        assert!(parse_symbol("HELLO").is_none());
        // Too few trailing digits to hold a year plus a strike.
        assert!(parse_symbol("ABC12CE").is_none());
        assert!(parse_symbol("").is_none());
    }

    #[test]
    fn registry_skips_bad_symbols_and_maps_lot_sizes() {
        let cfg = test_config(&[
            "BANKNIFTY24FEB2658900CE",
            "SBIN27JAN26FUT",
            "HDFCBANK24FEB26930CE",
            "garbage",
        ]);
        let registry = InstrumentRegistry::build(&cfg);

        assert_eq!(registry.len(), 3);
        assert!(registry.get("garbage").is_none());
        assert_eq!(registry.get("BANKNIFTY24FEB2658900CE").unwrap().lot_size, 30);
        // HDFCBANK is not in the test table: default fallback.
        assert_eq!(registry.get("HDFCBANK24FEB26930CE").unwrap().lot_size, 75);

        let mut underlyings = registry.underlyings();
        underlyings.sort();
        assert_eq!(underlyings, vec!["BANKNIFTY", "HDFCBANK", "SBIN"]);
    }

    #[test]
    fn strike_label_renders_strike_and_side() {
        let cfg = test_config(&["BANKNIFTY24FEB2658900CE", "SBIN27JAN26FUT"]);
        let registry = InstrumentRegistry::build(&cfg);
        assert_eq!(
            registry.get("BANKNIFTY24FEB2658900CE").unwrap().strike_label(),
            "58900CE"
        );
        assert_eq!(registry.get("SBIN27JAN26FUT").unwrap().strike_label(), "");
    }
}

use std::str::FromStr;

use crate::error::{AppError, Result};

pub const FEED_URL: &str = "wss://nimblewebstream.lisuns.com:4576/";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Heartbeat ping interval while streaming (seconds).
pub const FEED_PING_INTERVAL_SECS: u64 = 20;

/// Backoff after the feed rejects our credentials (seconds).
pub const AUTH_RETRY_BACKOFF_SECS: u64 = 30;

/// Backoff after the transport closes or errors mid-stream (seconds).
pub const RECONNECT_BACKOFF_SECS: u64 = 10;

/// Channel capacity for internal message routing.
pub const CHANNEL_CAPACITY: usize = 1024;

/// ATM band as a fraction of the underlying future price (0.1%).
pub const ATM_BAND_RATIO: f64 = 0.001;

/// Outbound Telegram request timeout (seconds).
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Lot-count breakpoints for the qualitative size buckets.
pub mod lot_buckets {
    pub const LOW_MIN: u64 = 1;
    pub const MEDIUM_MIN: u64 = 75;
    pub const HIGH_MIN: u64 = 100;
    pub const EXTRA_HIGH_MIN: u64 = 150;
    pub const EXTREME_HIGH_MIN: u64 = 200;
}

/// Built-in per-underlying lot sizes. Overridable via LOT_SIZES.
pub const LOT_SIZE_TABLE: &[(&str, u64)] = &[
    ("AXISBANK", 625),
    ("KOTAKBANK", 2000),
    ("SBIN", 750),
    ("ICICIBANK", 700),
    ("HDFCBANK", 550),
    ("BANKNIFTY", 30),
];

/// Fallback lot size for underlyings missing from the table.
pub const DEFAULT_LOT_SIZE: u64 = 75;

/// Built-in monitoring universe: ITM/ATM/OTM strikes around the Feb-26
/// bank expiries plus the underlying futures. Overridable via SYMBOLS.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "BANKNIFTY24FEB2658400CE", "BANKNIFTY24FEB2658400PE",
    "BANKNIFTY24FEB2658500CE", "BANKNIFTY24FEB2658500PE",
    "BANKNIFTY24FEB2658600CE", "BANKNIFTY24FEB2658600PE",
    "BANKNIFTY24FEB2658700CE", "BANKNIFTY24FEB2658700PE",
    "BANKNIFTY24FEB2658800CE", "BANKNIFTY24FEB2658800PE",
    "BANKNIFTY24FEB2658900CE", "BANKNIFTY24FEB2658900PE",
    "BANKNIFTY24FEB2659000CE", "BANKNIFTY24FEB2659000PE",
    "BANKNIFTY24FEB2659100CE", "BANKNIFTY24FEB2659100PE",
    "BANKNIFTY24FEB2659200CE", "BANKNIFTY24FEB2659200PE",
    "BANKNIFTY24FEB2659300CE", "BANKNIFTY24FEB2659300PE",
    "BANKNIFTY24FEB2659400CE", "BANKNIFTY24FEB2659400PE",
    "HDFCBANK24FEB26905CE", "HDFCBANK24FEB26905PE",
    "HDFCBANK24FEB26910CE", "HDFCBANK24FEB26910PE",
    "HDFCBANK24FEB26915CE", "HDFCBANK24FEB26915PE",
    "HDFCBANK24FEB26920CE", "HDFCBANK24FEB26920PE",
    "HDFCBANK24FEB26925CE", "HDFCBANK24FEB26925PE",
    "HDFCBANK24FEB26930CE", "HDFCBANK24FEB26930PE",
    "HDFCBANK24FEB26935CE", "HDFCBANK24FEB26935PE",
    "HDFCBANK24FEB26940CE", "HDFCBANK24FEB26940PE",
    "HDFCBANK24FEB26945CE", "HDFCBANK24FEB26945PE",
    "HDFCBANK24FEB26950CE", "HDFCBANK24FEB26950PE",
    "HDFCBANK24FEB26955CE", "HDFCBANK24FEB26955PE",
    "SBIN24FEB261015CE", "SBIN24FEB261015PE",
    "SBIN24FEB261020CE", "SBIN24FEB261020PE",
    "SBIN24FEB261025CE", "SBIN24FEB261025PE",
    "SBIN24FEB261030CE", "SBIN24FEB261030PE",
    "SBIN24FEB261035CE", "SBIN24FEB261035PE",
    "SBIN24FEB261040CE", "SBIN24FEB261040PE",
    "SBIN24FEB261045CE", "SBIN24FEB261045PE",
    "SBIN24FEB261050CE", "SBIN24FEB261050PE",
    "SBIN24FEB261055CE", "SBIN24FEB261055PE",
    "SBIN24FEB261060CE", "SBIN24FEB261060PE",
    "SBIN24FEB261065CE", "SBIN24FEB261065PE",
    "ICICIBANK24FEB261300CE", "ICICIBANK24FEB261300PE",
    "ICICIBANK24FEB261310CE", "ICICIBANK24FEB261310PE",
    "ICICIBANK24FEB261320CE", "ICICIBANK24FEB261320PE",
    "ICICIBANK24FEB261330CE", "ICICIBANK24FEB261330PE",
    "ICICIBANK24FEB261340CE", "ICICIBANK24FEB261340PE",
    "ICICIBANK24FEB261350CE", "ICICIBANK24FEB261350PE",
    "ICICIBANK24FEB261360CE", "ICICIBANK24FEB261360PE",
    "ICICIBANK24FEB261370CE", "ICICIBANK24FEB261370PE",
    "ICICIBANK24FEB261380CE", "ICICIBANK24FEB261380PE",
    "ICICIBANK24FEB261390CE", "ICICIBANK24FEB261390PE",
    "ICICIBANK24FEB261400CE", "ICICIBANK24FEB261400PE",
    "ICICIBANK24FEB261410CE", "ICICIBANK24FEB261410PE",
    "ICICIBANK24FEB261420CE", "ICICIBANK24FEB261420PE",
    "BANKNIFTY27JAN26FUT",
    "HDFCBANK27JAN26FUT",
    "ICICIBANK27JAN26FUT",
    "SBIN27JAN26FUT",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_url: String,
    /// Feed authentication password (API_KEY, required).
    pub api_key: String,
    /// Telegram bot credentials (TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID, required).
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub log_level: String,
    pub api_port: u16,
    /// Minimum |OI rate-of-change| in percent before a size alert fires (OI_ROC_THRESHOLD).
    pub oi_roc_threshold: f64,
    /// Trailing window for momentum-trend detection in seconds (MOMENTUM_WINDOW_SECS).
    pub momentum_window_secs: u64,
    /// Size alerts require strictly more than this many lots (MIN_LOTS_SIZE_ALERT).
    pub min_lots_size_alert: u64,
    /// Momentum verdicts require strictly more than this many lots over the window (MIN_LOTS_MOMENTUM).
    pub min_lots_momentum: u64,
    /// Monitoring universe (SYMBOLS, comma-separated).
    pub symbols: Vec<String>,
    /// Per-underlying lot sizes: built-in table merged with LOT_SIZES ("NAME:SIZE,...").
    pub lot_sizes: Vec<(String, u64)>,
    pub default_lot_size: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            feed_url: std::env::var("FEED_URL").unwrap_or_else(|_| FEED_URL.to_string()),
            api_key: required_var("API_KEY")?,
            telegram_bot_token: required_var("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: required_var("TELEGRAM_CHAT_ID")?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: numeric_var("API_PORT", 3000)?,
            oi_roc_threshold: numeric_var("OI_ROC_THRESHOLD", 2.0)?,
            momentum_window_secs: numeric_var("MOMENTUM_WINDOW_SECS", 300)?,
            min_lots_size_alert: numeric_var("MIN_LOTS_SIZE_ALERT", 100)?,
            min_lots_momentum: numeric_var("MIN_LOTS_MOMENTUM", 300)?,
            symbols: symbol_list(std::env::var("SYMBOLS").ok()),
            lot_sizes: lot_size_table(std::env::var("LOT_SIZES").ok())?,
            default_lot_size: numeric_var("DEFAULT_LOT_SIZE", DEFAULT_LOT_SIZE)?,
        })
    }

    pub fn lot_size_for(&self, underlying: &str) -> u64 {
        self.lot_sizes
            .iter()
            .find(|(name, _)| name == underlying)
            .map(|&(_, size)| size)
            .unwrap_or(self.default_lot_size)
    }
}

fn required_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| AppError::Config(format!("missing required environment variable {key}")))
}

/// Parse an optional numeric env var. Absent → default; present but
/// unparseable → startup-fatal, never a silent fallback.
fn numeric_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be numeric, got {raw:?}"))),
    }
}

fn symbol_list(raw: Option<String>) -> Vec<String> {
    match raw {
        Some(s) if !s.trim().is_empty() => s
            .split(',')
            .map(|sym| sym.trim().to_string())
            .filter(|sym| !sym.is_empty())
            .collect(),
        _ => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Merge LOT_SIZES overrides ("BANKNIFTY:30,SBIN:750") over the built-in table.
fn lot_size_table(raw: Option<String>) -> Result<Vec<(String, u64)>> {
    let mut table: Vec<(String, u64)> = LOT_SIZE_TABLE
        .iter()
        .map(|&(name, size)| (name.to_string(), size))
        .collect();

    let Some(raw) = raw else {
        return Ok(table);
    };

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, size) = entry.split_once(':').ok_or_else(|| {
            AppError::Config(format!("LOT_SIZES entry {entry:?} is not NAME:SIZE"))
        })?;
        let size: u64 = size.trim().parse().map_err(|_| {
            AppError::Config(format!("LOT_SIZES entry {entry:?} has a non-numeric size"))
        })?;
        let name = name.trim().to_uppercase();
        match table.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = size,
            None => table.push((name, size)),
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lot_size_overrides_merge_over_builtin_table() {
        let table = lot_size_table(Some("BANKNIFTY:35, newco:120".to_string())).unwrap();
        assert_eq!(table.iter().find(|(n, _)| n == "BANKNIFTY").unwrap().1, 35);
        assert_eq!(table.iter().find(|(n, _)| n == "NEWCO").unwrap().1, 120);
        // Untouched entries survive the merge.
        assert_eq!(table.iter().find(|(n, _)| n == "SBIN").unwrap().1, 750);
    }

    #[test]
    fn malformed_lot_size_entry_is_rejected() {
        assert!(lot_size_table(Some("BANKNIFTY=30".to_string())).is_err());
        assert!(lot_size_table(Some("BANKNIFTY:thirty".to_string())).is_err());
    }

    #[test]
    fn symbol_list_falls_back_to_default_universe() {
        assert_eq!(symbol_list(None).len(), DEFAULT_SYMBOLS.len());
        assert_eq!(symbol_list(Some("  ".to_string())).len(), DEFAULT_SYMBOLS.len());
        let custom = symbol_list(Some("SBIN24FEB261040CE, SBIN27JAN26FUT".to_string()));
        assert_eq!(custom, vec!["SBIN24FEB261040CE", "SBIN27JAN26FUT"]);
    }
}

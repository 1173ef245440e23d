use serde::{Deserialize, Serialize};
use std::time::Instant;

// ---------------------------------------------------------------------------
// Contract metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Option,
    Future,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionSide::Call => write!(f, "CE"),
            OptionSide::Put => write!(f, "PE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Moneyness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Moneyness {
    Itm,
    Atm,
    Otm,
}

impl Moneyness {
    /// Only ITM and ATM strikes are worth alerting on.
    pub fn passes_filter(self) -> bool {
        matches!(self, Moneyness::Itm | Moneyness::Atm)
    }
}

impl std::fmt::Display for Moneyness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Moneyness::Itm => "ITM",
            Moneyness::Atm => "ATM",
            Moneyness::Otm => "OTM",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Size classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBucket {
    /// < 1 lot, never alerted.
    Ignore,
    /// 1–74 lots.
    Low,
    /// 75–99 lots.
    Medium,
    /// 100–149 lots.
    High,
    /// 150–199 lots.
    ExtraHigh,
    /// 200+ lots.
    ExtremeHigh,
}

impl std::fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SizeBucket::Ignore => "IGNORE",
            SizeBucket::Low => "LOW",
            SizeBucket::Medium => "MEDIUM",
            SizeBucket::High => "HIGH",
            SizeBucket::ExtraHigh => "EXTRA HIGH",
            SizeBucket::ExtremeHigh => "EXTREME HIGH",
        };
        write!(f, "{s}")
    }
}

/// Positioning read from the (OI delta, price delta) sign pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionLabel {
    /// OI up, price up: fresh long positioning.
    BuyerLong,
    /// OI up, price down: fresh short positioning.
    WriterShort,
    /// OI down, price up: shorts exiting.
    RemoveFromShort,
    /// OI down, price down: longs exiting.
    RemoveFromLong,
    /// OI up, price flat.
    Hedging,
    /// OI down, price flat.
    RemoveFromHedge,
    Indecisive,
}

impl std::fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionLabel::BuyerLong => "BUYER(LONG)",
            ActionLabel::WriterShort => "WRITER(SHORT)",
            ActionLabel::RemoveFromShort => "REMOVE FROM SHORT",
            ActionLabel::RemoveFromLong => "REMOVE FROM LONG",
            ActionLabel::Hedging => "HEDGING",
            ActionLabel::RemoveFromHedge => "REMOVE FROM HEDGE",
            ActionLabel::Indecisive => "INDECISIVE MOVEMENT",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Momentum classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    /// Future rising, confirming option move, OI building.
    StrongUptrend,
    /// Future rising, confirming option move, OI unwinding (short covering).
    WeakUptrend,
    /// Future falling, confirming option move, OI building.
    StrongDowntrend,
    /// Future falling, confirming option move, OI unwinding (long unwinding).
    WeakDowntrend,
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendLabel::StrongUptrend => "STRONG UPTREND",
            TrendLabel::WeakUptrend => "WEAK UPTREND (Short Covering)",
            TrendLabel::StrongDowntrend => "STRONG DOWNTREND",
            TrendLabel::WeakDowntrend => "WEAK DOWNTREND (Long Unwinding)",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Channel message types
// ---------------------------------------------------------------------------

/// Normalized tick routed from the feed manager to the engine.
/// Records that fail normalization (unknown instrument, missing price,
/// option without open interest) are dropped before this point.
#[derive(Debug, Clone)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    /// Absent on future ticks; not consumed for them.
    pub oi: Option<i64>,
    /// Monotonic arrival time; window math and suppression use this.
    pub received_at: Instant,
    /// Unix seconds, display only.
    pub unix_s: i64,
}

// ---------------------------------------------------------------------------
// Findings: sent over the alert channel, formatted, then discarded
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SizeFinding {
    pub symbol: String,
    pub underlying: String,
    /// e.g. "58900CE"; empty for futures.
    pub strike_label: String,
    pub moneyness: Moneyness,
    pub action: ActionLabel,
    pub bucket: SizeBucket,
    pub lots: u64,
    pub oi_prev: i64,
    pub oi_delta: i64,
    pub oi_roc: f64,
    pub price: f64,
    pub price_delta: f64,
    pub price_roc: f64,
    /// Latest underlying future price, if one has been observed.
    pub future_price: Option<f64>,
    pub at_unix: i64,
}

#[derive(Debug, Clone)]
pub struct MomentumFinding {
    pub symbol: String,
    pub underlying: String,
    pub strike_label: String,
    pub trend: TrendLabel,
    pub lots: u64,
    pub oi_delta: i64,
    pub oi_roc: f64,
    pub option_price_delta: f64,
    pub option_price_roc: f64,
    pub future_price_delta: f64,
    pub future_price_roc: f64,
    pub last_option_price: f64,
    pub last_future_price: f64,
    pub window_start_unix: i64,
    pub window_end_unix: i64,
    pub window_secs: u64,
}

#[derive(Debug, Clone)]
pub enum Finding {
    Size(SizeFinding),
    Momentum(MomentumFinding),
}

impl Finding {
    pub fn symbol(&self) -> &str {
        match self {
            Finding::Size(f) => &f.symbol,
            Finding::Momentum(f) => &f.symbol,
        }
    }
}

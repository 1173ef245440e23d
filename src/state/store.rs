use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::instruments::InstrumentRegistry;
use crate::types::TrendLabel;

// ---------------------------------------------------------------------------
// Window samples
// ---------------------------------------------------------------------------

/// One (timestamp, price, oi) observation in an option's trailing window.
#[derive(Debug, Clone, Copy)]
pub struct TickSample {
    /// Monotonic arrival time; all window math uses this.
    pub at: Instant,
    /// Unix seconds, display only.
    pub unix_s: i64,
    pub price: f64,
    pub oi: i64,
}

/// One (timestamp, price) observation in an underlying's future window.
#[derive(Debug, Clone, Copy)]
pub struct FutureSample {
    pub at: Instant,
    pub unix_s: i64,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// InstrumentState
// ---------------------------------------------------------------------------

/// Mutable per-instrument state. One per tracked instrument, created at
/// process start, mutated only by the engine task, never destroyed.
///
/// `oi_prev == 0` marks "not yet initialized": the first observed tick has
/// no prior reference point and must never produce a delta-based alert.
#[derive(Debug)]
pub struct InstrumentState {
    pub price: f64,
    pub price_prev: f64,
    pub oi: i64,
    pub oi_prev: i64,
    /// Trailing (timestamp, price, oi) samples, append-only at the tail,
    /// pruned from the head to the momentum window.
    pub window: VecDeque<TickSample>,
    /// Last momentum verdict emitted, for same-trend suppression.
    pub last_trend: Option<TrendLabel>,
    pub last_trend_at: Option<Instant>,
}

impl InstrumentState {
    pub fn new() -> Self {
        Self {
            price: 0.0,
            price_prev: 0.0,
            oi: 0,
            oi_prev: 0,
            window: VecDeque::new(),
            last_trend: None,
            last_trend_at: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.oi_prev != 0
    }

    /// Shift the current observation into the `prev` slots and store the new
    /// one. Must be the only mutation path for the price/oi pairs so the
    /// `prev` fields always hold the immediately preceding observation.
    pub fn observe(&mut self, price: f64, oi: i64) {
        self.price_prev = self.price;
        self.oi_prev = self.oi;
        self.price = price;
        self.oi = oi;
    }

    /// Append a sample to the trailing window and prune the head.
    /// Zero prices or OI are not history worth trending on.
    pub fn push_sample(&mut self, sample: TickSample, retain: Duration) {
        if sample.price > 0.0 && sample.oi > 0 {
            self.window.push_back(sample);
        }
        prune_window(&mut self.window, |s| s.at, sample.at, retain);
    }

    pub fn note_trend_alert(&mut self, trend: TrendLabel, at: Instant) {
        self.last_trend = Some(trend);
        self.last_trend_at = Some(at);
    }
}

// ---------------------------------------------------------------------------
// UnderlyingSeries
// ---------------------------------------------------------------------------

/// Latest future price and trailing price window for one underlying symbol.
/// Updated only from ticks whose instrument is a future.
#[derive(Debug)]
pub struct UnderlyingSeries {
    /// None until the first valid future tick arrives.
    pub last_price: Option<f64>,
    pub window: VecDeque<FutureSample>,
}

impl UnderlyingSeries {
    fn new() -> Self {
        Self {
            last_price: None,
            window: VecDeque::new(),
        }
    }

    pub fn record(&mut self, sample: FutureSample, retain: Duration) {
        if sample.price > 0.0 {
            self.last_price = Some(sample.price);
            self.window.push_back(sample);
        }
        prune_window(&mut self.window, |s| s.at, sample.at, retain);
    }

    /// Earliest sample at or after `start`: the future-side anchor for a
    /// momentum window beginning at that time.
    pub fn first_at_or_after(&self, start: Instant) -> Option<&FutureSample> {
        self.window.iter().find(|s| s.at >= start)
    }

    pub fn last(&self) -> Option<&FutureSample> {
        self.window.back()
    }
}

/// Drop head samples older than the trailing `retain` duration.
/// Idempotent: re-pruning an already-pruned window removes nothing.
fn prune_window<T, F>(window: &mut VecDeque<T>, at: F, now: Instant, retain: Duration)
where
    F: Fn(&T) -> Instant,
{
    while let Some(front) = window.front() {
        if now.saturating_duration_since(at(front)) > retain {
            window.pop_front();
        } else {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// ScannerStore
// ---------------------------------------------------------------------------

/// All mutable scanner state, owned exclusively by the engine task and
/// passed by reference to the classification functions. No shared maps,
/// no locks: per-instrument updates are linearized by construction.
pub struct ScannerStore {
    states: HashMap<String, InstrumentState>,
    series: HashMap<String, UnderlyingSeries>,
    pub momentum_window: Duration,
}

impl ScannerStore {
    /// Pre-create state for the full static universe so lookups during
    /// streaming never allocate.
    pub fn new(registry: &InstrumentRegistry, momentum_window: Duration) -> Self {
        let states = registry
            .symbols()
            .map(|s| (s.to_string(), InstrumentState::new()))
            .collect();
        let series = registry
            .underlyings()
            .into_iter()
            .map(|u| (u, UnderlyingSeries::new()))
            .collect();
        Self {
            states,
            series,
            momentum_window,
        }
    }

    pub fn state(&self, symbol: &str) -> Option<&InstrumentState> {
        self.states.get(symbol)
    }

    pub fn state_mut(&mut self, symbol: &str) -> Option<&mut InstrumentState> {
        self.states.get_mut(symbol)
    }

    pub fn series(&self, underlying: &str) -> Option<&UnderlyingSeries> {
        self.series.get(underlying)
    }

    pub fn series_mut(&mut self, underlying: &str) -> Option<&mut UnderlyingSeries> {
        self.series.get_mut(underlying)
    }

    /// Latest observed future price for an underlying, if any.
    pub fn future_price(&self, underlying: &str) -> Option<f64> {
        self.series.get(underlying).and_then(|s| s.last_price)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

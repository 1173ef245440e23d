use std::time::Duration;

use crate::instruments::Instrument;
use crate::state::{InstrumentState, UnderlyingSeries};
use crate::types::{MomentumFinding, OptionSide, TrendLabel};

use super::classify::{lots_from_oi_delta, rate_of_change};

/// Analyze an option's trailing window against its underlying's future
/// window and return at most one trend verdict.
///
/// No verdict unless: the window holds at least two samples and spans at
/// least half the momentum duration, the future window covers the period,
/// the windowed OI change clears both the lot and rate gates, and the
/// option's move confirms the future's direction for this side.
pub fn detect_trend(
    instrument: &Instrument,
    state: &InstrumentState,
    series: &UnderlyingSeries,
    momentum_window: Duration,
    min_lots: u64,
    oi_roc_threshold: f64,
) -> Option<MomentumFinding> {
    let side = instrument.side?;

    let first = state.window.front()?;
    let last = state.window.back()?;
    if state.window.len() < 2 {
        return None;
    }
    let span = last.at.saturating_duration_since(first.at);
    if span < momentum_window / 2 {
        return None;
    }

    // Future-side anchor: the earliest future sample inside the option's
    // window. Without it the underlying data does not cover the period.
    let anchor = series.first_at_or_after(first.at)?;
    let last_future = series.last()?;

    let future_delta = last_future.price - anchor.price;
    let option_delta = last.price - first.price;
    let oi_delta = last.oi - first.oi;

    let lots = lots_from_oi_delta(oi_delta, instrument.lot_size);
    if lots <= min_lots {
        return None;
    }
    let oi_roc = rate_of_change(oi_delta as f64, first.oi as f64);
    if oi_roc.abs() <= oi_roc_threshold {
        return None;
    }

    let trend = classify_trend(side, future_delta, option_delta, oi_delta)?;

    Some(MomentumFinding {
        symbol: instrument.symbol.clone(),
        underlying: instrument.underlying.clone(),
        strike_label: instrument.strike_label(),
        trend,
        lots,
        oi_delta,
        oi_roc,
        option_price_delta: option_delta,
        option_price_roc: rate_of_change(option_delta, first.price),
        future_price_delta: future_delta,
        future_price_roc: rate_of_change(future_delta, anchor.price),
        last_option_price: last.price,
        last_future_price: last_future.price,
        window_start_unix: first.unix_s,
        window_end_unix: last.unix_s,
        window_secs: span.as_secs(),
    })
}

/// Direction consistency and Strong/Weak split. A rising future confirms an
/// uptrend only when the option moved with it (calls up, puts down); the
/// downtrend check mirrors. Fresh OI is Strong, unwinding OI is Weak.
fn classify_trend(
    side: OptionSide,
    future_delta: f64,
    option_delta: f64,
    oi_delta: i64,
) -> Option<TrendLabel> {
    let is_call = side == OptionSide::Call;

    if future_delta > 0.0 {
        let confirmed = (is_call && option_delta > 0.0) || (!is_call && option_delta < 0.0);
        if confirmed {
            if oi_delta > 0 {
                return Some(TrendLabel::StrongUptrend);
            } else if oi_delta < 0 {
                return Some(TrendLabel::WeakUptrend);
            }
        }
    } else if future_delta < 0.0 {
        let confirmed = (is_call && option_delta < 0.0) || (!is_call && option_delta > 0.0);
        if confirmed {
            if oi_delta > 0 {
                return Some(TrendLabel::StrongDowntrend);
            } else if oi_delta < 0 {
                return Some(TrendLabel::WeakDowntrend);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FutureSample, TickSample, UnderlyingSeries};
    use crate::types::ContractKind;
    use std::time::Instant;

    const WINDOW: Duration = Duration::from_secs(300);

    /// Base instant offset well past boot so subtracting window spans can
    /// never underflow the monotonic clock.
    fn test_now() -> Instant {
        Instant::now() + Duration::from_secs(86_400)
    }

    fn call() -> Instrument {
        Instrument {
            symbol: "BANKNIFTY24FEB2658900CE".to_string(),
            underlying: "BANKNIFTY".to_string(),
            kind: ContractKind::Option,
            side: Some(OptionSide::Call),
            strike: Some(58900.0),
            lot_size: 30,
        }
    }

    fn put() -> Instrument {
        Instrument {
            symbol: "BANKNIFTY24FEB2658900PE".to_string(),
            underlying: "BANKNIFTY".to_string(),
            kind: ContractKind::Option,
            side: Some(OptionSide::Put),
            strike: Some(58900.0),
            lot_size: 30,
        }
    }

    /// Option window: (secs before `now`, price, oi) triples.
    fn option_state(now: Instant, samples: &[(u64, f64, i64)]) -> InstrumentState {
        let mut state = InstrumentState::new();
        for &(ago, price, oi) in samples {
            let at = now - Duration::from_secs(ago);
            state.push_sample(
                TickSample { at, unix_s: 1_700_000_000 - ago as i64, price, oi },
                WINDOW,
            );
        }
        state
    }

    fn future_series(now: Instant, samples: &[(u64, f64)]) -> UnderlyingSeries {
        let mut series = UnderlyingSeries {
            last_price: None,
            window: Default::default(),
        };
        for &(ago, price) in samples {
            let at = now - Duration::from_secs(ago);
            series.record(
                FutureSample { at, unix_s: 1_700_000_000 - ago as i64, price },
                WINDOW,
            );
        }
        series
    }

    #[test]
    fn rising_future_with_fresh_oi_is_a_strong_uptrend() {
        let now = test_now();
        let state = option_state(now, &[(200, 100.0, 100_000), (0, 110.0, 120_000)]);
        let series = future_series(now, &[(200, 58_000.0), (0, 58_500.0)]);

        let finding = detect_trend(&call(), &state, &series, WINDOW, 300, 2.0)
            .expect("trend expected");
        assert_eq!(finding.trend, TrendLabel::StrongUptrend);
        assert_eq!(finding.oi_delta, 20_000);
        assert_eq!(finding.lots, 666);
        assert!((finding.oi_roc - 20.0).abs() < 1e-9);
        assert!((finding.future_price_delta - 500.0).abs() < 1e-9);
    }

    #[test]
    fn unwinding_oi_downgrades_to_weak() {
        let now = test_now();
        // Future up, call up, but OI draining: short covering.
        let state = option_state(now, &[(200, 100.0, 120_000), (0, 110.0, 100_000)]);
        let series = future_series(now, &[(200, 58_000.0), (0, 58_500.0)]);

        let finding = detect_trend(&call(), &state, &series, WINDOW, 300, 2.0)
            .expect("trend expected");
        assert_eq!(finding.trend, TrendLabel::WeakUptrend);
        assert_eq!(finding.oi_delta, -20_000);
    }

    #[test]
    fn put_confirms_downtrend_by_rising() {
        let now = test_now();
        // Future falling, put gaining, OI building: strong downtrend.
        let state = option_state(now, &[(200, 100.0, 100_000), (0, 115.0, 125_000)]);
        let series = future_series(now, &[(200, 58_500.0), (0, 58_000.0)]);

        let finding = detect_trend(&put(), &state, &series, WINDOW, 300, 2.0)
            .expect("trend expected");
        assert_eq!(finding.trend, TrendLabel::StrongDowntrend);
    }

    #[test]
    fn flat_future_yields_no_verdict() {
        let now = test_now();
        let state = option_state(now, &[(200, 100.0, 100_000), (0, 110.0, 130_000)]);
        let series = future_series(now, &[(200, 58_000.0), (0, 58_000.0)]);

        assert!(detect_trend(&call(), &state, &series, WINDOW, 300, 2.0).is_none());
    }

    #[test]
    fn inconsistent_option_move_yields_no_verdict() {
        let now = test_now();
        // Future up but the call fell: narrative not confirmed.
        let state = option_state(now, &[(200, 110.0, 100_000), (0, 100.0, 130_000)]);
        let series = future_series(now, &[(200, 58_000.0), (0, 58_500.0)]);

        assert!(detect_trend(&call(), &state, &series, WINDOW, 300, 2.0).is_none());
    }

    #[test]
    fn young_window_yields_no_verdict() {
        let now = test_now();
        // Only 60s of data against a 300s window: below the half-span gate.
        let state = option_state(now, &[(60, 100.0, 100_000), (0, 110.0, 130_000)]);
        let series = future_series(now, &[(60, 58_000.0), (0, 58_500.0)]);

        assert!(detect_trend(&call(), &state, &series, WINDOW, 300, 2.0).is_none());
    }

    #[test]
    fn missing_future_coverage_yields_no_verdict() {
        let now = test_now();
        let state = option_state(now, &[(200, 100.0, 100_000), (0, 110.0, 130_000)]);

        // No future data at all.
        let empty = future_series(now, &[]);
        assert!(detect_trend(&call(), &state, &empty, WINDOW, 300, 2.0).is_none());

        // Future data exists but predates the option window.
        let stale = future_series(now, &[(290, 58_000.0)]);
        assert!(detect_trend(&call(), &state, &stale, WINDOW, 300, 2.0).is_none());
    }

    #[test]
    fn lot_and_rate_gates_suppress_small_windows() {
        let now = test_now();
        let series = future_series(now, &[(200, 58_000.0), (0, 58_500.0)]);

        // 8_000 contracts / 30 lot size = 266 lots: below the 300-lot gate.
        let few_lots = option_state(now, &[(200, 100.0, 100_000), (0, 110.0, 108_000)]);
        assert!(detect_trend(&call(), &few_lots, &series, WINDOW, 300, 2.0).is_none());

        // Plenty of lots but only 1.5% RoC against a large base.
        let low_roc = option_state(now, &[(200, 100.0, 1_000_000), (0, 110.0, 1_015_000)]);
        assert!(detect_trend(&call(), &low_roc, &series, WINDOW, 300, 2.0).is_none());
    }
}

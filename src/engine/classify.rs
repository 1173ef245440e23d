use crate::config::lot_buckets;
use crate::instruments::Instrument;
use crate::state::InstrumentState;
use crate::types::{ActionLabel, SizeBucket, SizeFinding};

use super::moneyness;

/// Whole lots represented by an OI change. Floor division; a zero lot size
/// yields zero lots rather than a panic.
pub fn lots_from_oi_delta(oi_delta: i64, lot_size: u64) -> u64 {
    if lot_size == 0 {
        return 0;
    }
    oi_delta.unsigned_abs() / lot_size
}

pub fn lot_bucket(lots: u64) -> SizeBucket {
    if lots >= lot_buckets::EXTREME_HIGH_MIN {
        SizeBucket::ExtremeHigh
    } else if lots >= lot_buckets::EXTRA_HIGH_MIN {
        SizeBucket::ExtraHigh
    } else if lots >= lot_buckets::HIGH_MIN {
        SizeBucket::High
    } else if lots >= lot_buckets::MEDIUM_MIN {
        SizeBucket::Medium
    } else if lots >= lot_buckets::LOW_MIN {
        SizeBucket::Low
    } else {
        SizeBucket::Ignore
    }
}

/// Positioning label from the (OI delta, price delta) sign pair.
pub fn classify_action(oi_delta: i64, price_delta: f64) -> ActionLabel {
    if price_delta == 0.0 {
        if oi_delta > 0 {
            ActionLabel::Hedging
        } else if oi_delta < 0 {
            ActionLabel::RemoveFromHedge
        } else {
            ActionLabel::Indecisive
        }
    } else if oi_delta > 0 {
        if price_delta > 0.0 {
            ActionLabel::BuyerLong
        } else {
            ActionLabel::WriterShort
        }
    } else if oi_delta < 0 {
        if price_delta > 0.0 {
            ActionLabel::RemoveFromShort
        } else {
            ActionLabel::RemoveFromLong
        }
    } else {
        ActionLabel::Indecisive
    }
}

/// Percent change with a defined result for a zero base.
pub fn rate_of_change(delta: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        delta / base * 100.0
    }
}

/// Evaluate the per-tick size-alert path for an option whose state has just
/// been updated. Returns at most one finding.
///
/// Suppression order: uninitialized state, flat OI, RoC below threshold,
/// the minimum-lot gate (checked before moneyness so noise-level activity
/// never pays for the moneyness lookup), OTM strikes, and the Ignore bucket.
pub fn evaluate_size_alert(
    instrument: &Instrument,
    state: &InstrumentState,
    future_price: Option<f64>,
    oi_roc_threshold: f64,
    min_lots: u64,
    at_unix: i64,
) -> Option<SizeFinding> {
    let (side, strike) = match (instrument.side, instrument.strike) {
        (Some(side), Some(strike)) => (side, strike),
        // Futures never enter the per-tick OI alert path.
        _ => return None,
    };

    if !state.is_initialized() {
        return None;
    }

    let oi_delta = state.oi - state.oi_prev;
    if oi_delta == 0 {
        return None;
    }

    let oi_roc = rate_of_change(oi_delta as f64, state.oi_prev as f64);
    if oi_roc.abs() <= oi_roc_threshold {
        return None;
    }

    let lots = lots_from_oi_delta(oi_delta, instrument.lot_size);
    if lots <= min_lots {
        return None;
    }

    let moneyness = moneyness::classify(side, strike, future_price);
    if !moneyness.passes_filter() {
        return None;
    }

    let bucket = lot_bucket(lots);
    if bucket == SizeBucket::Ignore {
        return None;
    }

    let price_delta = state.price - state.price_prev;
    Some(SizeFinding {
        symbol: instrument.symbol.clone(),
        underlying: instrument.underlying.clone(),
        strike_label: instrument.strike_label(),
        moneyness,
        action: classify_action(oi_delta, price_delta),
        bucket,
        lots,
        oi_prev: state.oi_prev,
        oi_delta,
        oi_roc,
        price: state.price,
        price_delta,
        price_roc: rate_of_change(price_delta, state.price_prev),
        future_price,
        at_unix,
    })
}

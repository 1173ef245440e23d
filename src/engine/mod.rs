pub mod classify;
pub mod momentum;
pub mod moneyness;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::Config;
use crate::instruments::{Instrument, InstrumentRegistry};
use crate::state::{FutureSample, ScannerStore, TickSample};
use crate::types::{Finding, Tick};

/// The engine half of the ingestion loop: owns all mutable scanner state
/// and processes the normalized tick stream sequentially. Each tick's
/// update → classify → detect sequence completes before the next tick is
/// read, so the `prev` fields and window ordering stay meaningful.
pub struct Engine {
    registry: Arc<InstrumentRegistry>,
    store: ScannerStore,
    tick_rx: mpsc::Receiver<Tick>,
    finding_tx: mpsc::Sender<Finding>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    oi_roc_threshold: f64,
    min_lots_size_alert: u64,
    min_lots_momentum: u64,
    /// Lifetime counters for periodic flow diagnostics.
    ticks_processed: u64,
    findings_emitted: u64,
    last_diag_at: Instant,
}

impl Engine {
    pub fn new(
        cfg: &Config,
        registry: Arc<InstrumentRegistry>,
        tick_rx: mpsc::Receiver<Tick>,
        finding_tx: mpsc::Sender<Finding>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        let store = ScannerStore::new(&registry, Duration::from_secs(cfg.momentum_window_secs));
        Self {
            registry,
            store,
            tick_rx,
            finding_tx,
            health,
            latency,
            oi_roc_threshold: cfg.oi_roc_threshold,
            min_lots_size_alert: cfg.min_lots_size_alert,
            min_lots_momentum: cfg.min_lots_momentum,
            ticks_processed: 0,
            findings_emitted: 0,
            last_diag_at: Instant::now(),
        }
    }

    pub async fn run(mut self) {
        while let Some(tick) = self.tick_rx.recv().await {
            self.handle_tick(tick);
        }
        info!("tick channel closed, engine stopping");
    }

    /// Process one normalized tick to completion. Synchronous on purpose:
    /// findings leave through `try_send`, so a slow notification channel
    /// can never stall state updates.
    fn handle_tick(&mut self, tick: Tick) {
        self.ticks_processed += 1;
        self.health.inc_ticks_processed();

        let Some(instrument) = self.registry.get(&tick.symbol).cloned() else {
            debug!(symbol = %tick.symbol, "tick for unregistered instrument dropped");
            return;
        };

        if instrument.is_future() {
            self.apply_future_tick(&instrument, &tick);
            self.maybe_log_diagnostics();
            return;
        }

        let Some(oi) = tick.oi else {
            debug!(symbol = %tick.symbol, "option tick without open interest dropped");
            return;
        };

        self.apply_option_tick(&instrument, &tick, oi);

        // Per-tick size-alert path.
        if let Some(finding) = self.evaluate_size(&instrument, &tick) {
            self.emit(Finding::Size(finding));
        }

        // Momentum path: runs on every accepted option tick, independent of
        // the size path. Both may fire for the same tick.
        if let Some(finding) = self.evaluate_momentum(&instrument, &tick) {
            self.emit(Finding::Momentum(finding));
        }

        self.latency.record(tick.received_at.elapsed());
        self.maybe_log_diagnostics();
    }

    /// Futures feed only the underlying price series consumed by the
    /// moneyness and momentum checks. They never produce per-tick alerts.
    fn apply_future_tick(&mut self, instrument: &Instrument, tick: &Tick) {
        let retain = self.store.momentum_window;
        if let Some(series) = self.store.series_mut(&instrument.underlying) {
            series.record(
                FutureSample {
                    at: tick.received_at,
                    unix_s: tick.unix_s,
                    price: tick.price,
                },
                retain,
            );
        }
    }

    fn apply_option_tick(&mut self, instrument: &Instrument, tick: &Tick, oi: i64) {
        let retain = self.store.momentum_window;
        let Some(state) = self.store.state_mut(&instrument.symbol) else {
            return;
        };
        state.push_sample(
            TickSample {
                at: tick.received_at,
                unix_s: tick.unix_s,
                price: tick.price,
                oi,
            },
            retain,
        );
        state.observe(tick.price, oi);
        if !state.is_initialized() {
            info!(symbol = %instrument.symbol, "initializing option state");
        }
    }

    fn evaluate_size(&self, instrument: &Instrument, tick: &Tick) -> Option<crate::types::SizeFinding> {
        let state = self.store.state(&instrument.symbol)?;
        let future_price = self.store.future_price(&instrument.underlying);
        classify::evaluate_size_alert(
            instrument,
            state,
            future_price,
            self.oi_roc_threshold,
            self.min_lots_size_alert,
            tick.unix_s,
        )
    }

    fn evaluate_momentum(
        &mut self,
        instrument: &Instrument,
        tick: &Tick,
    ) -> Option<crate::types::MomentumFinding> {
        let finding = {
            let state = self.store.state(&instrument.symbol)?;
            let series = self.store.series(&instrument.underlying)?;
            momentum::detect_trend(
                instrument,
                state,
                series,
                self.store.momentum_window,
                self.min_lots_momentum,
                self.oi_roc_threshold,
            )?
        };

        // Same-trend suppression: an ongoing trend is reported once per
        // momentum window, not on every confirming tick.
        let window = self.store.momentum_window;
        let state = self.store.state_mut(&instrument.symbol)?;
        let ongoing = match (state.last_trend, state.last_trend_at) {
            (Some(last), Some(at)) => {
                last == finding.trend
                    && tick.received_at.saturating_duration_since(at) < window
            }
            _ => false,
        };
        if ongoing {
            debug!(
                symbol = %instrument.symbol,
                trend = %finding.trend,
                "ongoing trend already reported, suppressed"
            );
            return None;
        }

        state.note_trend_alert(finding.trend, tick.received_at);
        Some(finding)
    }

    fn emit(&mut self, finding: Finding) {
        match self.finding_tx.try_send(finding) {
            Ok(()) => {
                self.findings_emitted += 1;
                self.health.inc_alerts_emitted();
            }
            Err(e) => {
                self.health.inc_alerts_dropped();
                warn!("alert channel full, dropping finding: {e}");
            }
        }
    }

    fn maybe_log_diagnostics(&mut self) {
        if self.last_diag_at.elapsed() < Duration::from_secs(30) {
            return;
        }
        self.last_diag_at = Instant::now();
        info!(
            ticks = self.ticks_processed,
            findings = self.findings_emitted,
            "engine 30s diag"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionLabel, TrendLabel};

    const CALL: &str = "BANKNIFTY24FEB2658900CE";
    const FUT: &str = "BANKNIFTY27JAN26FUT";

    /// Base instant offset well past boot so subtracting window spans can
    /// never underflow the monotonic clock.
    fn test_now() -> Instant {
        Instant::now() + Duration::from_secs(86_400)
    }

    fn test_config() -> Config {
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
            symbols: vec![CALL.to_string(), FUT.to_string()],
            lot_sizes: vec![("BANKNIFTY".to_string(), 30)],
            default_lot_size: 75,
        }
    }

    fn engine_with_channels() -> (Engine, mpsc::Receiver<Finding>) {
        let cfg = test_config();
        let registry = Arc::new(InstrumentRegistry::build(&cfg));
        let (_tick_tx, tick_rx) = mpsc::channel(16);
        let (finding_tx, finding_rx) = mpsc::channel(16);
        let engine = Engine::new(
            &cfg,
            registry,
            tick_rx,
            finding_tx,
            Arc::new(HealthState::new()),
            Arc::new(LatencyStats::new()),
        );
        (engine, finding_rx)
    }

    fn tick_at(symbol: &str, price: f64, oi: Option<i64>, at: Instant, unix_s: i64) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            price,
            oi,
            received_at: at,
            unix_s,
        }
    }

    #[tokio::test]
    async fn first_tick_initializes_without_alerting() {
        let (mut engine, mut findings) = engine_with_channels();
        let now = test_now();

        engine.handle_tick(tick_at(FUT, 59_500.0, None, now, 0));
        engine.handle_tick(tick_at(CALL, 100.0, Some(100_000), now, 0));

        assert!(findings.try_recv().is_err(), "first option tick must not alert");
    }

    #[tokio::test]
    async fn size_alert_fires_for_itm_strike_after_initialization() {
        let (mut engine, mut findings) = engine_with_channels();
        let now = test_now();

        // Future at 59_500: the 58_900 call is ITM.
        engine.handle_tick(tick_at(FUT, 59_500.0, None, now, 0));
        engine.handle_tick(tick_at(CALL, 100.0, Some(100_000), now, 0));
        // +20% OI, 666 lots, price up: buyer buildup.
        engine.handle_tick(tick_at(CALL, 110.0, Some(120_000), now, 1));

        let finding = findings.try_recv().expect("size alert expected");
        match finding {
            Finding::Size(f) => {
                assert_eq!(f.action, ActionLabel::BuyerLong);
                assert_eq!(f.lots, 666);
                assert_eq!(f.oi_delta, 20_000);
            }
            other => panic!("expected size finding, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_future_price_suppresses_size_alert() {
        let (mut engine, mut findings) = engine_with_channels();
        let now = test_now();

        // No future tick ever observed: moneyness defaults to OTM.
        engine.handle_tick(tick_at(CALL, 100.0, Some(100_000), now, 0));
        engine.handle_tick(tick_at(CALL, 110.0, Some(120_000), now, 1));

        assert!(findings.try_recv().is_err(), "OTM-by-default must suppress");
    }

    #[tokio::test]
    async fn option_tick_without_oi_is_dropped() {
        let (mut engine, mut findings) = engine_with_channels();
        let now = test_now();

        engine.handle_tick(tick_at(FUT, 59_500.0, None, now, 0));
        engine.handle_tick(tick_at(CALL, 100.0, Some(100_000), now, 0));
        engine.handle_tick(tick_at(CALL, 110.0, None, now, 1));

        assert!(findings.try_recv().is_err());
        // State was not touched by the incomplete tick.
        let state = engine.store.state(CALL).unwrap();
        assert_eq!(state.oi, 100_000);
    }

    #[tokio::test]
    async fn ongoing_trend_is_reported_once_per_window() {
        let (mut engine, mut findings) = engine_with_channels();
        let now = test_now();
        let start = now - Duration::from_secs(200);

        // Future at 58_500 keeps the 58_900 call OTM, so only the momentum
        // path can fire here.
        engine.handle_tick(tick_at(FUT, 58_000.0, None, start, 0));
        engine.handle_tick(tick_at(CALL, 100.0, Some(100_000), start, 0));
        engine.handle_tick(tick_at(FUT, 58_500.0, None, now, 200));
        // 200s of confirming data: strong uptrend detected.
        engine.handle_tick(tick_at(CALL, 110.0, Some(120_000), now, 200));

        match findings.try_recv().expect("momentum alert expected") {
            Finding::Momentum(f) => assert_eq!(f.trend, TrendLabel::StrongUptrend),
            other => panic!("expected momentum finding, got {other:?}"),
        }

        // Another confirming tick inside the same window: identical verdict,
        // suppressed.
        engine.handle_tick(tick_at(CALL, 111.0, Some(121_000), now, 201));
        assert!(findings.try_recv().is_err(), "ongoing trend must be suppressed");

        // Age the last alert past the window and the trend re-reports.
        let state = engine.store.state_mut(CALL).unwrap();
        state.last_trend_at = Some(now - Duration::from_secs(400));
        engine.handle_tick(tick_at(CALL, 112.0, Some(122_000), now, 202));
        match findings.try_recv().expect("trend re-reported after window") {
            Finding::Momentum(f) => assert_eq!(f.trend, TrendLabel::StrongUptrend),
            other => panic!("expected momentum finding, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn futures_never_produce_findings() {
        let (mut engine, mut findings) = engine_with_channels();
        let now = test_now();

        engine.handle_tick(tick_at(FUT, 58_000.0, Some(500_000), now, 0));
        engine.handle_tick(tick_at(FUT, 59_000.0, Some(900_000), now, 1));

        assert!(findings.try_recv().is_err());
        assert_eq!(engine.store.future_price("BANKNIFTY"), Some(59_000.0));
    }
}

//! Alert formatting and outbound dispatch.
//!
//! Findings arrive over a bounded channel, are rendered to plain text, and
//! are posted to the Telegram Bot API. The dispatcher runs as a dedicated
//! background task and never blocks the detection path; a failed send is
//! logged and the alert is dropped.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::config::NOTIFY_TIMEOUT_SECS;
use crate::error::Result;
use crate::types::{Finding, MomentumFinding, SizeFinding};

// ---------------------------------------------------------------------------
// TelegramNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    chat_id: String,
    text: String,
}

/// Thin client for the Bot API `sendMessage` endpoint.
pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(base_url: &str, bot_token: String, chat_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let request = SendMessageRequest {
            chat_id: self.chat_id.clone(),
            text: text.to_string(),
        };
        self.http
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AlertDispatcher
// ---------------------------------------------------------------------------

/// Consumes findings from the engine, renders them, and fires them at the
/// notification channel. Failures never propagate back to the engine.
pub struct AlertDispatcher {
    finding_rx: mpsc::Receiver<Finding>,
    notifier: Arc<TelegramNotifier>,
    health: Arc<HealthState>,
}

impl AlertDispatcher {
    pub fn new(
        finding_rx: mpsc::Receiver<Finding>,
        notifier: Arc<TelegramNotifier>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            finding_rx,
            notifier,
            health,
        }
    }

    pub async fn run(mut self) {
        while let Some(finding) = self.finding_rx.recv().await {
            let text = format_finding(&finding);
            match self.notifier.send(&text).await {
                Ok(()) => {
                    self.health.note_alert_sent();
                    info!(symbol = %finding.symbol(), "alert dispatched");
                }
                Err(e) => {
                    self.health.inc_alerts_failed();
                    error!(symbol = %finding.symbol(), "alert dispatch failed: {e}");
                }
            }
        }
        info!("alert channel closed, dispatcher stopping");
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

pub fn format_finding(finding: &Finding) -> String {
    match finding {
        Finding::Size(f) => format_size_alert(f),
        Finding::Momentum(f) => format_momentum_alert(f),
    }
}

fn format_size_alert(f: &SizeFinding) -> String {
    let price_dir = if f.price_delta > 0.0 {
        "↑"
    } else if f.price_delta < 0.0 {
        "↓"
    } else {
        "↔"
    };
    let future_price = f
        .future_price
        .map(|p| format!("{p:.2}"))
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "{} | OPTION\n\
         STRIKE: {} {}\n\
         ACTION: {}\n\
         SIZE: {} ({} lots)\n\
         EXISTING OI: {}\n\
         OI Δ: {}\n\
         OI RoC: {:.2}%\n\
         PRICE: {}\n\
         PRICE Chg: {:+.2} ({:+.2}%)\n\
         TIME: {}\n\
         FUTURE PRICE: {}\n\
         LAST PRICE: {:.2}",
        f.underlying,
        f.strike_label,
        f.moneyness,
        f.action,
        f.bucket,
        f.lots,
        f.oi_prev,
        f.oi_delta,
        f.oi_roc,
        price_dir,
        f.price_delta,
        f.price_roc,
        hhmmss(f.at_unix),
        future_price,
        f.price,
    )
}

fn format_momentum_alert(f: &MomentumFinding) -> String {
    let minutes = f.window_secs / 60;
    let seconds = f.window_secs % 60;

    format!(
        "- - - Momentum Alert - - -\n\
         {} | {}\n\
         \n\
         {} Confirmed\n\
         \n\
         OI Δ: {:+} ({} lots)\n\
         OI RoC: {:+.2}%\n\
         Future Price Δ: {:+.2} ({:+.2}%)\n\
         Option Price Δ: {:+.2} ({:+.2}%)\n\
         \n\
         Last Option Price: {:.2}\n\
         Last Future Price: {:.2}\n\
         Duration: {}m {}s ({} -> {})\n\
         - - - - - - - - - - - - - - - -",
        f.underlying,
        f.strike_label,
        f.trend,
        f.oi_delta,
        f.lots,
        f.oi_roc,
        f.future_price_delta,
        f.future_price_roc,
        f.option_price_delta,
        f.option_price_roc,
        f.last_option_price,
        f.last_future_price,
        minutes,
        seconds,
        hhmm(f.window_start_unix),
        hhmm(f.window_end_unix),
    )
}

fn hhmmss(unix_s: i64) -> String {
    chrono::DateTime::from_timestamp(unix_s, 0)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

fn hhmm(unix_s: i64) -> String {
    chrono::DateTime::from_timestamp(unix_s, 0)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

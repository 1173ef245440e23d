mod alert;
mod api;
mod config;
mod engine;
mod error;
mod feed;
mod instruments;
mod state;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::alert::{AlertDispatcher, TelegramNotifier};
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY, TELEGRAM_API_URL};
use crate::engine::Engine;
use crate::error::Result;
use crate::feed::FeedManager;
use crate::instruments::InstrumentRegistry;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Static universe ---
    let registry = Arc::new(InstrumentRegistry::build(&cfg));
    if registry.is_empty() {
        return Err(crate::error::AppError::Config(
            "no valid symbols in the configured universe".to_string(),
        ));
    }
    info!(
        "Universe ready: {} instruments across {} underlyings",
        registry.len(),
        registry.underlyings().len()
    );

    // --- Shared observability state ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    // --- Notification channel ---
    let notifier = Arc::new(TelegramNotifier::new(
        TELEGRAM_API_URL,
        cfg.telegram_bot_token.clone(),
        cfg.telegram_chat_id.clone(),
    )?);

    // --- Channels ---
    let (tick_tx, tick_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (finding_tx, finding_rx) = mpsc::channel(CHANNEL_CAPACITY);

    // --- Spawn tasks ---

    // Feed manager (transport state machine)
    let feed = FeedManager::new(
        cfg.feed_url.clone(),
        cfg.api_key.clone(),
        Arc::clone(&registry),
        tick_tx,
        Arc::clone(&notifier),
        Arc::clone(&health),
    );
    tokio::spawn(async move { feed.run().await });

    // Engine (hot path: state updates, classification, momentum)
    let engine = Engine::new(
        &cfg,
        Arc::clone(&registry),
        tick_rx,
        finding_tx,
        Arc::clone(&health),
        Arc::clone(&latency),
    );
    tokio::spawn(async move { engine.run().await });

    // Alert dispatcher (outbound, fire-and-forget from the engine's view)
    let dispatcher = AlertDispatcher::new(finding_rx, Arc::clone(&notifier), Arc::clone(&health));
    tokio::spawn(async move { dispatcher.run().await });

    // --- Ops API ---
    let api_state = ApiState {
        health,
        latency,
        instruments: registry.len(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Ops API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

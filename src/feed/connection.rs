use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::alert::TelegramNotifier;
use crate::api::health::HealthState;
use crate::config::{AUTH_RETRY_BACKOFF_SECS, FEED_PING_INTERVAL_SECS, RECONNECT_BACKOFF_SECS};
use crate::error::Result;
use crate::feed::messages::{parse_frame, FeedFrame};
use crate::instruments::InstrumentRegistry;
use crate::types::{ContractKind, Tick};

/// How one streaming session ended; picks the reconnect backoff.
enum SessionEnd {
    /// Credential exchange rejected; longer backoff before retrying.
    AuthRejected,
    /// Transport closed cleanly.
    Closed,
}

/// Transport half of the ingestion loop. Drives the session state machine
/// (connect → authenticate → subscribe → stream) and feeds normalized ticks
/// into the engine channel. Never returns: every failure path ends in a
/// backoff and a fresh connection attempt.
pub struct FeedManager {
    feed_url: String,
    api_key: String,
    registry: Arc<InstrumentRegistry>,
    tick_tx: mpsc::Sender<Tick>,
    notifier: Arc<TelegramNotifier>,
    health: Arc<HealthState>,
    /// Flow counters for periodic diagnostics.
    frames_received: u64,
    ticks_routed: u64,
    dropped_unknown: u64,
    dropped_incomplete: u64,
}

impl FeedManager {
    pub fn new(
        feed_url: String,
        api_key: String,
        registry: Arc<InstrumentRegistry>,
        tick_tx: mpsc::Sender<Tick>,
        notifier: Arc<TelegramNotifier>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            feed_url,
            api_key,
            registry,
            tick_tx,
            notifier,
            health,
            frames_received: 0,
            ticks_routed: 0,
            dropped_unknown: 0,
            dropped_incomplete: 0,
        }
    }

    pub async fn run(mut self) {
        loop {
            info!("feed connecting to {}", self.feed_url);
            let backoff_secs = match self.connect_once().await {
                Ok(SessionEnd::AuthRejected) => AUTH_RETRY_BACKOFF_SECS,
                Ok(SessionEnd::Closed) => {
                    info!("feed connection closed");
                    RECONNECT_BACKOFF_SECS
                }
                Err(e) => {
                    error!("feed connection error: {e}");
                    RECONNECT_BACKOFF_SECS
                }
            };
            self.health.set_feed_connected(false);

            warn!("feed reconnecting in {backoff_secs}s");
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
        }
    }

    /// One full session: authenticate, subscribe the universe, then stream
    /// until the transport closes or errors.
    async fn connect_once(&mut self) -> Result<SessionEnd> {
        let (ws_stream, _) = connect_async(&self.feed_url).await?;
        let (mut write, mut read) = ws_stream.split();

        // Authenticating: one credential frame, one response.
        let auth_msg = serde_json::json!({
            "MessageType": "Authenticate",
            "Password": self.api_key,
        })
        .to_string();
        write.send(Message::Text(auth_msg.into())).await?;

        match read.next().await {
            Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                Some(FeedFrame::AuthResult { complete: true, .. }) => {
                    info!("feed authentication successful");
                }
                Some(FeedFrame::AuthResult { complete: false, comment }) => {
                    error!(
                        "feed authentication rejected: {}",
                        comment.as_deref().unwrap_or("no reason given")
                    );
                    return Ok(SessionEnd::AuthRejected);
                }
                _ => {
                    error!("unexpected frame during credential exchange");
                    return Ok(SessionEnd::AuthRejected);
                }
            },
            Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(_)) => {
                error!("non-text frame during credential exchange");
                return Ok(SessionEnd::AuthRejected);
            }
        }

        // Subscribed: one frame per instrument, fire-and-forget; the feed
        // sends no per-subscription acknowledgment.
        for symbol in self.registry.symbols() {
            let sub_msg = serde_json::json!({
                "MessageType": "SubscribeRealtime",
                "Exchange": "NFO",
                "Unsubscribe": "false",
                "InstrumentIdentifier": symbol,
            })
            .to_string();
            write.send(Message::Text(sub_msg.into())).await?;
        }
        info!(
            "subscribed to {} instruments, feed is live",
            self.registry.len()
        );
        self.health.set_feed_connected(true);

        // Liveness note for alert recipients; detached so a slow Telegram
        // endpoint cannot hold up the stream.
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send("Scanner is LIVE and monitoring the market.").await {
                warn!("liveness notification failed: {e}");
            }
        });

        // Streaming: terminal per session.
        let mut ping_interval = interval(Duration::from_secs(FEED_PING_INTERVAL_SECS));
        ping_interval.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&text);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Ok(SessionEnd::Closed);
                        }
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(_)) => {}
                    }
                }

                _ = ping_interval.tick() => {
                    debug!("feed ping");
                    write.send(Message::Ping(vec![].into())).await?;
                }
            }
        }
    }

    /// Parse one text frame and route the normalized tick, if any.
    /// Malformed frames are logged and skipped without leaving the stream.
    fn handle_frame(&mut self, text: &str) {
        self.frames_received += 1;
        if self.frames_received % 500 == 0 {
            info!(
                frames = self.frames_received,
                routed = self.ticks_routed,
                unknown = self.dropped_unknown,
                incomplete = self.dropped_incomplete,
                "feed flow"
            );
        }

        match parse_frame(text) {
            Some(FeedFrame::TickRecord { symbol, price, oi }) => {
                self.normalize_and_route(symbol, price, oi);
            }
            // Late auth echoes carry nothing for the streaming state.
            Some(FeedFrame::AuthResult { .. }) | None => {}
        }
    }

    /// Validation per the registry: unknown instruments, priceless records,
    /// and option records without open interest never reach state.
    fn normalize_and_route(&mut self, symbol: String, price: Option<f64>, oi: Option<i64>) {
        let Some(instrument) = self.registry.get(&symbol) else {
            self.dropped_unknown += 1;
            debug!(symbol = %symbol, "record for unknown instrument dropped");
            return;
        };

        let Some(price) = price else {
            self.dropped_incomplete += 1;
            warn!(symbol = %symbol, "record without last trade price dropped");
            return;
        };

        if instrument.kind == ContractKind::Option && oi.is_none() {
            self.dropped_incomplete += 1;
            warn!(symbol = %symbol, "option record without open interest dropped");
            return;
        }

        let tick = Tick {
            symbol,
            price,
            oi,
            received_at: Instant::now(),
            unix_s: now_unix(),
        };

        if let Err(e) = self.tick_tx.try_send(tick) {
            warn!("tick channel full, dropping message: {e}");
            return;
        }
        self.ticks_routed += 1;
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

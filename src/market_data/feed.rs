// =============================================================================
// Feed — inbound message parsing and the connection supervisor
// =============================================================================
//
// The feed delivers JSON messages discriminated by a `type` field:
//
//   { "type": "candleUpdate", "timestamp": ..., "open": ..., ... }
//   { "type": "priceUpdate", "price": ... }
//   { "type": "tradeExecuted", "price": ..., "quantity": ..., "side": ... }
//
// Unknown types pass through ignored; structurally broken payloads are
// surfaced as diagnostics without touching the window or the connection
// state. The async supervisor owns the WebSocket and is the only mutator of
// the connection state machine; merges and recomputes run to completion
// inside its task, so updates apply strictly in arrival order.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::error::FeedError;
use crate::market_data::subscription::TradeEvent;
use crate::market_data::{Candle, ConnectionState, MarketSubscription};

// =============================================================================
// Messages and commands
// =============================================================================

/// Control commands for the supervisor. `Reconnect` resets the retry budget
/// and supersedes any pending scheduled retry; `Shutdown` tears the
/// subscription down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionCommand {
    Reconnect,
    Shutdown,
}

/// One inbound feed message, discriminated by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum FeedMessage {
    #[serde(rename = "candleUpdate")]
    CandleUpdate {
        symbol: Option<String>,
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        #[serde(default)]
        volume: f64,
    },

    #[serde(rename = "priceUpdate")]
    PriceUpdate { price: f64 },

    #[serde(rename = "tradeExecuted")]
    TradeExecuted {
        price: f64,
        quantity: f64,
        side: String,
        #[serde(default)]
        timestamp: i64,
    },

    /// Any message with an unrecognised `type`: passed through, never an
    /// error.
    #[serde(other)]
    Unknown,
}

/// Parse one feed payload. Structural failures (bad JSON, missing fields,
/// wrong field types) become [`FeedError::MalformedMessage`].
pub fn parse_feed_message(text: &str) -> Result<FeedMessage, FeedError> {
    serde_json::from_str(text).map_err(|e| FeedError::MalformedMessage(e.to_string()))
}

/// Route one parsed message into the subscription.
pub fn dispatch_message(
    subscription: &MarketSubscription,
    message: FeedMessage,
) -> Result<(), FeedError> {
    match message {
        FeedMessage::CandleUpdate {
            symbol,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        } => {
            // A candle for another symbol is a feed contract violation, not
            // something to silently drop.
            if let Some(sym) = symbol {
                if !sym.eq_ignore_ascii_case(subscription.symbol()) {
                    return Err(FeedError::SymbolMismatch {
                        expected: subscription.symbol().to_string(),
                        got: sym,
                    });
                }
            }

            subscription.apply_candle(Candle {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            })?;
            Ok(())
        }

        FeedMessage::PriceUpdate { price } => {
            subscription.record_price(price);
            Ok(())
        }

        FeedMessage::TradeExecuted {
            price,
            quantity,
            side,
            timestamp,
        } => {
            subscription.record_trade(TradeEvent {
                timestamp,
                price,
                quantity,
                side,
            });
            Ok(())
        }

        FeedMessage::Unknown => {
            debug!("ignoring feed message with unknown type");
            Ok(())
        }
    }
}

// =============================================================================
// Connection supervisor
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Shutdown,
}

/// Drive the connection state machine over a real WebSocket until shutdown.
///
/// Runs as a single task: every merge and indicator recompute happens inline
/// here, in arrival order. Shutdown (command channel closed or an explicit
/// `Shutdown`) synchronously tears down the subscription, so no merge or
/// notification can happen afterwards and no retry timer survives.
pub async fn run_feed_supervisor(
    state: Arc<AppState>,
    mut commands: mpsc::UnboundedReceiver<ConnectionCommand>,
) {
    state.update_connection(|m| m.connect());

    loop {
        let current = state.connection.read().state();
        let step = match current {
            ConnectionState::Connecting => attempt_connection(&state, &mut commands).await,
            ConnectionState::Reconnecting => wait_for_retry(&state, &mut commands).await,
            ConnectionState::Disconnected | ConnectionState::FailedPermanent => {
                wait_for_command(&state, &mut commands).await
            }
            ConnectionState::Connected => {
                // Only reachable if the socket vanished without a recorded
                // transition; treat it as a remote loss.
                state.update_connection(|m| m.on_connection_lost());
                Step::Continue
            }
        };

        if step == Step::Shutdown {
            break;
        }
    }

    state.subscription.teardown();
    state.update_connection(|m| m.teardown());
    info!("feed supervisor stopped");
}

/// One connection attempt, then the whole connected phase if it succeeds.
async fn attempt_connection(
    state: &Arc<AppState>,
    commands: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
) -> Step {
    let url = state.runtime_config.read().feed_url.clone();
    info!(url = %url, "connecting to feed WebSocket");

    tokio::select! {
        cmd = commands.recv() => match cmd {
            // Already connecting; a manual reconnect just restarts the attempt.
            Some(ConnectionCommand::Reconnect) => {
                state.update_connection(|m| m.manual_reconnect());
                Step::Continue
            }
            Some(ConnectionCommand::Shutdown) | None => Step::Shutdown,
        },

        result = connect_async(&url) => match result {
            Ok((ws_stream, _response)) => {
                state.update_connection(|m| m.on_connected());
                drive_connected(state, ws_stream, commands).await
            }
            Err(e) => {
                warn!(error = %e, "feed connection attempt failed");
                state.push_error(format!("feed connect failed: {e}"));
                state.update_connection(|m| m.on_connect_failed());
                Step::Continue
            }
        },
    }
}

/// Pump messages off an established socket until it drops or a command
/// arrives.
async fn drive_connected(
    state: &Arc<AppState>,
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    commands: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
) -> Step {
    let (_write, mut read) = ws_stream.split();
    info!(symbol = %state.subscription.symbol(), "feed WebSocket connected");

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(ConnectionCommand::Reconnect) => {
                    state.update_connection(|m| m.manual_reconnect());
                    return Step::Continue;
                }
                Some(ConnectionCommand::Shutdown) | None => return Step::Shutdown,
            },

            msg = read.next() => match msg {
                Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                    handle_text(state, &text);
                }
                Some(Ok(_)) => {
                    // Ping/Pong/Binary/Close frames -- tungstenite replies to
                    // pings automatically.
                }
                Some(Err(e)) => {
                    error!(error = %e, "feed WebSocket read error");
                    state.push_error(format!("feed read error: {e}"));
                    state.update_connection(|m| m.on_connection_lost());
                    return Step::Continue;
                }
                None => {
                    warn!("feed WebSocket stream ended");
                    state.update_connection(|m| m.on_connection_lost());
                    return Step::Continue;
                }
            }
        }
    }
}

/// Parse + dispatch one text frame. Errors here are local diagnostics and
/// never affect the connection state.
fn handle_text(state: &Arc<AppState>, text: &str) {
    let result = parse_feed_message(text).and_then(|msg| dispatch_message(&state.subscription, msg));
    if let Err(e) = result {
        warn!(error = %e, "feed message rejected");
        state.push_error(e.to_string());
    }
}

/// Sit out the fixed retry delay, unless a command pre-empts it.
async fn wait_for_retry(
    state: &Arc<AppState>,
    commands: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
) -> Step {
    let delay = Duration::from_millis(state.runtime_config.read().reconnect_interval_ms);

    tokio::select! {
        _ = tokio::time::sleep(delay) => {
            state.update_connection(|m| m.on_retry_timer());
            Step::Continue
        }
        cmd = commands.recv() => match cmd {
            Some(ConnectionCommand::Reconnect) => {
                state.update_connection(|m| m.manual_reconnect());
                Step::Continue
            }
            Some(ConnectionCommand::Shutdown) | None => Step::Shutdown,
        },
    }
}

/// Parked (`Disconnected` / `FailedPermanent`): nothing happens until an
/// operator command arrives.
async fn wait_for_command(
    state: &Arc<AppState>,
    commands: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
) -> Step {
    match commands.recv().await {
        Some(ConnectionCommand::Reconnect) => {
            state.update_connection(|m| m.manual_reconnect());
            Step::Continue
        }
        Some(ConnectionCommand::Shutdown) | None => Step::Shutdown,
    }
}

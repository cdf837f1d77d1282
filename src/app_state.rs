// =============================================================================
// Central Application State — chartfeed service
// =============================================================================
//
// The single source of truth wired together for the dashboard API and the
// WebSocket push feed. The feed supervisor owns all mutation of the
// connection machine and the subscription; everything here is shared via
// `Arc<AppState>` and read through cloned snapshots.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for mutable shared collections.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::chart::{build_chart_series, ChartSeries};
use crate::indicators::rsi;
use crate::market_data::feed::ConnectionCommand;
use crate::market_data::subscription::{ChangeNotifier, TradeEvent};
use crate::market_data::{ConnectionMachine, ConnectionState, MarketSubscription};
use crate::runtime_config::RuntimeConfig;

/// Maximum number of recent errors to retain for the dashboard error log.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded diagnostic event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Central application state shared across all async tasks.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every meaningful
    /// state change. The WebSocket feed uses this to detect changes and push
    /// updates; candle merges bump it through the subscription's notifier.
    notifier: ChangeNotifier,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    /// The single (symbol, timeframe) pipeline.
    pub subscription: Arc<MarketSubscription>,

    /// Connection state machine; mutated only by the feed supervisor.
    pub connection: Arc<RwLock<ConnectionMachine>>,

    /// Command channel into the feed supervisor (manual reconnect, shutdown).
    feed_commands: mpsc::UnboundedSender<ConnectionCommand>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct the full state graph from the given runtime configuration
    /// and the sending half of the supervisor command channel.
    pub fn new(config: RuntimeConfig, feed_commands: mpsc::UnboundedSender<ConnectionCommand>) -> Self {
        let notifier = ChangeNotifier::default();

        let subscription = Arc::new(MarketSubscription::new(
            config.symbol.clone(),
            config.interval.clone(),
            config.capacity,
            config.indicator_params(),
            notifier.clone(),
        ));

        let connection = Arc::new(RwLock::new(ConnectionMachine::new(
            config.max_reconnect_attempts,
            config.auto_reconnect,
        )));

        Self {
            notifier,
            ws_sequence_number: AtomicU64::new(0),
            runtime_config: Arc::new(RwLock::new(config)),
            subscription,
            connection,
            feed_commands,
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Bump the shared state version to signal WebSocket clients that fresh
    /// data is available.
    pub fn increment_version(&self) -> u64 {
        self.notifier.notify()
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.notifier.current()
    }

    // ── Connection helpers ──────────────────────────────────────────────

    /// Apply one transition to the connection machine and publish the change.
    pub fn update_connection(&self, f: impl FnOnce(&mut ConnectionMachine)) {
        f(&mut self.connection.write());
        self.increment_version();
    }

    /// Ask the feed supervisor for a manual reconnect. Returns false when
    /// the supervisor is gone (service shutting down).
    pub fn request_reconnect(&self) -> bool {
        let sent = self.feed_commands.send(ConnectionCommand::Reconnect).is_ok();
        if !sent {
            warn!("manual reconnect requested but the feed supervisor is not running");
        }
        sent
    }

    /// Ask the feed supervisor to shut down and tear the subscription down.
    pub fn request_shutdown(&self) {
        let _ = self.feed_commands.send(ConnectionCommand::Shutdown);
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record a diagnostic message. The ring is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build a complete, serialisable snapshot of the service state.
    ///
    /// This is the payload served by `GET /api/v1/state` and pushed over the
    /// WebSocket feed. Candles and indicators come from the same
    /// subscription accessors the merge path swaps atomically, so the pair
    /// is always internally consistent.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let config = self.runtime_config.read();
        let connection = self.connection.read();

        let candles = self.subscription.candles();
        let indicators = self.subscription.indicators();

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let (rsi, rsi_label) = match rsi::current_rsi(&closes, config.rsi_period) {
            Some((value, label)) => (Some(value), Some(label)),
            None => (None, None),
        };

        let chart = build_chart_series(candles, &indicators);

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_s: self.start_time.elapsed().as_secs(),
            connection: ConnectionSnapshot {
                state: connection.state(),
                retry_count: connection.retry_count(),
                max_reconnect_attempts: config.max_reconnect_attempts,
            },
            market: MarketSnapshot {
                symbol: self.subscription.symbol().to_string(),
                interval: self.subscription.interval().to_string(),
                last_price: self.subscription.last_price(),
                rsi,
                rsi_label,
                candle_count: self.subscription.candle_count(),
                window_capacity: self.subscription.window_capacity(),
                recent_trades: self.subscription.recent_trades(),
            },
            chart,
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types (match the dashboard's TypeScript interfaces)
// =============================================================================

/// Full service snapshot sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_s: u64,
    pub connection: ConnectionSnapshot,
    pub market: MarketSnapshot,
    pub chart: ChartSeries,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Connection status banner data.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub max_reconnect_attempts: u32,
}

/// Per-subscription market data.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub interval: String,
    pub last_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi_label: Option<&'static str>,
    pub candle_count: usize,
    pub window_capacity: usize,
    pub recent_trades: Vec<TradeEvent>,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;

    fn state() -> (Arc<AppState>, mpsc::UnboundedReceiver<ConnectionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(AppState::new(RuntimeConfig::default(), tx)), rx)
    }

    fn bar(timestamp: i64, close: f64) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 5.0,
        }
    }

    #[test]
    fn merge_bumps_the_shared_version() {
        let (state, _rx) = state();
        let before = state.current_state_version();

        state.subscription.apply_candle(bar(60_000, 100.0)).unwrap();
        assert_eq!(state.current_state_version(), before + 1);
    }

    #[test]
    fn snapshot_reflects_window_and_connection() {
        let (state, _rx) = state();
        for i in 1..=25 {
            state.subscription.apply_candle(bar(i * 60_000, i as f64)).unwrap();
        }

        let snap = state.build_snapshot();
        assert_eq!(snap.market.symbol, "BTCUSDT");
        assert_eq!(snap.market.candle_count, 25);
        // Strictly ascending closes: RSI pegged at 100.
        assert!((snap.market.rsi.unwrap() - 100.0).abs() < 1e-10);
        assert_eq!(snap.market.rsi_label, Some("OVERBOUGHT"));
        assert_eq!(snap.market.window_capacity, 200);
        assert_eq!(snap.chart.candles.len(), 25);
        assert_eq!(snap.chart.sma.len(), 6);
        assert_eq!(snap.connection.state, ConnectionState::Disconnected);
        assert_eq!(snap.connection.max_reconnect_attempts, 5);
    }

    #[test]
    fn error_ring_is_capped() {
        let (state, _rx) = state();
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.push_error(format!("error {i}"));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "error 5");
    }

    #[test]
    fn reconnect_request_reaches_the_supervisor_channel() {
        let (state, mut rx) = state();
        assert!(state.request_reconnect());
        assert_eq!(rx.try_recv().unwrap(), ConnectionCommand::Reconnect);
    }

    #[test]
    fn reconnect_request_fails_without_supervisor() {
        let (state, rx) = state();
        drop(rx);
        assert!(!state.request_reconnect());
    }
}

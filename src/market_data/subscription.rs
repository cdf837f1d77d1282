// =============================================================================
// MarketSubscription — one (symbol, timeframe) pipeline
// =============================================================================
//
// Owns the candle window and the derived indicator series for the single
// live subscription. `apply_candle` is the only write path: it validates,
// merges, recomputes the full indicator series from the fresh snapshot and
// emits exactly one "window changed" notification per effective merge.
// Merge and recompute run to completion before the method returns, so
// consumers never observe the window and the indicators out of step.
//
// Teardown flips an atomic gate: once torn down, no further merge can occur
// and no notification is emitted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::error::FeedError;
use crate::indicators::{IndicatorParams, IndicatorSeries};
use crate::market_data::{Candle, CandleWindow, MergeOutcome};

/// Maximum number of executed trades retained for the dashboard ticker.
const MAX_RECENT_TRADES: usize = 50;

/// Shared monotonic counter used as the "state changed" signal. The
/// WebSocket push loop converts counter deltas into pushed snapshots.
#[derive(Clone, Default)]
pub struct ChangeNotifier(Arc<AtomicU64>);

impl ChangeNotifier {
    pub fn notify(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// An executed trade reported by the feed, shown in the dashboard ticker.
#[derive(Debug, Clone, Serialize)]
pub struct TradeEvent {
    pub timestamp: i64,
    pub price: f64,
    pub quantity: f64,
    pub side: String,
}

/// The single source-of-truth pipeline for one (symbol, timeframe) pair.
pub struct MarketSubscription {
    symbol: String,
    interval: String,
    params: IndicatorParams,
    window: RwLock<CandleWindow>,
    indicators: RwLock<IndicatorSeries>,
    last_price: RwLock<Option<f64>>,
    recent_trades: RwLock<Vec<TradeEvent>>,
    torn_down: AtomicBool,
    notifier: ChangeNotifier,
}

impl MarketSubscription {
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        capacity: usize,
        params: IndicatorParams,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            params,
            window: RwLock::new(CandleWindow::new(capacity)),
            indicators: RwLock::new(IndicatorSeries::default()),
            last_price: RwLock::new(None),
            recent_trades: RwLock::new(Vec::new()),
            torn_down: AtomicBool::new(false),
            notifier,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    /// Fold one candle into the window and bring the indicator series up to
    /// date. Rejected and no-op inputs leave all state untouched, including
    /// the change counter.
    pub fn apply_candle(&self, candle: Candle) -> Result<MergeOutcome, FeedError> {
        if self.torn_down.load(Ordering::SeqCst) {
            debug!("candle ignored: subscription torn down");
            return Ok(MergeOutcome::Unchanged);
        }

        candle.validate().map_err(FeedError::MalformedMessage)?;

        let outcome = self.window.write().merge(candle)?;
        if outcome == MergeOutcome::Unchanged {
            return Ok(outcome);
        }

        // Full recompute from the fresh snapshot; swapped in before the
        // notification so observers always see a consistent pair.
        let snapshot = self.window.read().snapshot();
        let series = IndicatorSeries::compute(&snapshot, &self.params);
        *self.indicators.write() = series;

        self.notifier.notify();
        Ok(outcome)
    }

    /// Record the latest traded price from a `priceUpdate` message.
    pub fn record_price(&self, price: f64) {
        if !price.is_finite() || self.torn_down.load(Ordering::SeqCst) {
            return;
        }
        let mut last = self.last_price.write();
        if *last != Some(price) {
            *last = Some(price);
            drop(last);
            self.notifier.notify();
        }
    }

    /// Record an executed trade from a `tradeExecuted` message.
    pub fn record_trade(&self, trade: TradeEvent) {
        if self.torn_down.load(Ordering::SeqCst) {
            return;
        }
        let mut trades = self.recent_trades.write();
        trades.push(trade);
        while trades.len() > MAX_RECENT_TRADES {
            trades.remove(0);
        }
        drop(trades);
        self.notifier.notify();
    }

    /// Synchronously stop all further merges and recordings. Idempotent.
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    // ── Read-only snapshot accessors ────────────────────────────────────

    pub fn candles(&self) -> Vec<Candle> {
        self.window.read().snapshot()
    }

    pub fn indicators(&self) -> IndicatorSeries {
        self.indicators.read().clone()
    }

    pub fn last_price(&self) -> Option<f64> {
        *self.last_price.read()
    }

    pub fn recent_trades(&self) -> Vec<TradeEvent> {
        self.recent_trades.read().clone()
    }

    pub fn candle_count(&self) -> usize {
        self.window.read().len()
    }

    pub fn window_capacity(&self) -> usize {
        self.window.read().capacity()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;

    fn subscription() -> MarketSubscription {
        MarketSubscription::new(
            "BTCUSDT",
            "1m",
            200,
            IndicatorParams::default(),
            ChangeNotifier::default(),
        )
    }

    fn bar(timestamp: i64, close: f64) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn merge_recomputes_indicators_and_notifies_once() {
        let sub = subscription();
        let before = sub.notifier.current();

        sub.apply_candle(bar(60_000, 100.0)).unwrap();
        assert_eq!(sub.notifier.current(), before + 1);
        assert_eq!(sub.indicators().ema.len(), 1);
    }

    #[test]
    fn duplicate_candle_is_idempotent() {
        let sub = subscription();
        sub.apply_candle(bar(60_000, 100.0)).unwrap();

        let version = sub.notifier.current();
        let indicators = sub.indicators();

        let outcome = sub.apply_candle(bar(60_000, 100.0)).unwrap();
        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(sub.notifier.current(), version);
        assert_eq!(sub.indicators().ema, indicators.ema);
        assert_eq!(sub.candle_count(), 1);
    }

    #[test]
    fn in_progress_update_replaces_and_notifies() {
        let sub = subscription();
        sub.apply_candle(bar(60_000, 100.0)).unwrap();
        let version = sub.notifier.current();

        let outcome = sub.apply_candle(bar(60_000, 101.0)).unwrap();
        assert_eq!(outcome, MergeOutcome::Replaced);
        assert_eq!(sub.notifier.current(), version + 1);
        assert!((sub.candles()[0].close - 101.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_order_leaves_state_untouched() {
        let sub = subscription();
        sub.apply_candle(bar(120_000, 100.0)).unwrap();
        let version = sub.notifier.current();

        let err = sub.apply_candle(bar(60_000, 99.0)).unwrap_err();
        assert!(matches!(err, FeedError::Merge(MergeError::OutOfOrderCandle { .. })));
        assert_eq!(sub.notifier.current(), version);
        assert_eq!(sub.candle_count(), 1);
    }

    #[test]
    fn invalid_candle_rejected_before_merge() {
        let sub = subscription();
        let mut c = bar(60_000, 100.0);
        c.volume = -5.0;

        let err = sub.apply_candle(c).unwrap_err();
        assert!(matches!(err, FeedError::MalformedMessage(_)));
        assert_eq!(sub.candle_count(), 0);
    }

    #[test]
    fn indicators_track_window_contents() {
        let sub = subscription();
        for i in 0..25 {
            sub.apply_candle(bar((i + 1) * 60_000, (i + 1) as f64)).unwrap();
        }

        let series = sub.indicators();
        assert_eq!(series.sma.len(), 6);
        assert_eq!(series.ema.len(), 25);
        assert_eq!(series.rsi.len(), 11);

        // The series must match a from-scratch recompute of the snapshot.
        let fresh = IndicatorSeries::compute(&sub.candles(), &IndicatorParams::default());
        assert_eq!(series.sma, fresh.sma);
        assert_eq!(series.rsi, fresh.rsi);
    }

    #[test]
    fn teardown_stops_merges_synchronously() {
        let sub = subscription();
        sub.apply_candle(bar(60_000, 100.0)).unwrap();
        let version = sub.notifier.current();

        sub.teardown();
        assert!(sub.is_torn_down());

        let outcome = sub.apply_candle(bar(120_000, 101.0)).unwrap();
        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(sub.candle_count(), 1);
        assert_eq!(sub.notifier.current(), version);

        sub.record_price(123.0);
        assert_eq!(sub.last_price(), None);
    }

    #[test]
    fn price_updates_dedupe() {
        let sub = subscription();
        sub.record_price(100.0);
        let version = sub.notifier.current();

        sub.record_price(100.0);
        assert_eq!(sub.notifier.current(), version);

        sub.record_price(100.5);
        assert_eq!(sub.notifier.current(), version + 1);
        assert_eq!(sub.last_price(), Some(100.5));
    }

    #[test]
    fn trade_ring_is_capped() {
        let sub = subscription();
        for i in 0..(MAX_RECENT_TRADES + 10) {
            sub.record_trade(TradeEvent {
                timestamp: i as i64,
                price: 100.0,
                quantity: 1.0,
                side: "BUY".into(),
            });
        }
        let trades = sub.recent_trades();
        assert_eq!(trades.len(), MAX_RECENT_TRADES);
        assert_eq!(trades[0].timestamp, 10);
    }
}

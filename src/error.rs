// =============================================================================
// Error taxonomy for the market-data pipeline
// =============================================================================
//
// Merge and feed errors are local and recoverable: they are logged, appended
// to the dashboard error ring, and never tear down the active subscription.
// Transport failures are not represented here at all: they drive the
// connection state machine and stay invisible to the merger and calculator.

use thiserror::Error;

/// Errors raised by [`crate::market_data::CandleWindow::merge`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    /// The incoming candle's timestamp precedes the window tail. The merger
    /// never reorders history; the window is left unchanged.
    #[error("out-of-order candle: incoming timestamp {incoming} precedes window tail {tail}")]
    OutOfOrderCandle { incoming: i64, tail: i64 },

    /// Post-merge length exceeded capacity. Unreachable given correct merge
    /// logic; raised instead of silently truncating so the bug is visible.
    #[error("capacity invariant violated: window length {len} exceeds capacity {capacity}")]
    CapacityInvariant { len: usize, capacity: usize },
}

/// Errors raised while dispatching inbound feed messages.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The payload failed structural validation (bad JSON, missing fields, or
    /// a candle violating its OHLCV invariants). Dropped, state unchanged.
    #[error("malformed feed message: {0}")]
    MalformedMessage(String),

    /// A candle arrived for a symbol other than the subscribed one. This is
    /// a feed contract violation, surfaced rather than silently dropped.
    #[error("candle for {got} does not belong to subscription {expected}")]
    SymbolMismatch { expected: String, got: String },

    #[error(transparent)]
    Merge(#[from] MergeError),
}

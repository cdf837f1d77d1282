pub mod backfill;
pub mod candle;
pub mod connection;
pub mod feed;
pub mod subscription;
pub mod window;

// Re-exports for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::Candle;
pub use connection::{ConnectionMachine, ConnectionState};
pub use subscription::MarketSubscription;
pub use window::{CandleWindow, MergeOutcome};

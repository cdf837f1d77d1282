// =============================================================================
// Runtime Configuration — feed and indicator settings with atomic save
// =============================================================================
//
// Central configuration for the chartfeed service: the subscribed market,
// feed endpoints, window capacity, indicator periods and the reconnect
// policy.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::IndicatorParams;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_interval() -> String {
    "1m".to_string()
}

fn default_feed_url() -> String {
    "ws://127.0.0.1:8900/feed".to_string()
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_capacity() -> usize {
    200
}

fn default_sma_period() -> usize {
    20
}

fn default_ema_period() -> usize {
    20
}

fn default_rsi_period() -> usize {
    14
}

fn default_bollinger_k() -> f64 {
    2.0
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the chartfeed service.
///
/// Every field has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Subscription --------------------------------------------------------

    /// Market symbol the single live subscription follows.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Candle timeframe of the subscription (e.g. "1m", "5m").
    #[serde(default = "default_interval")]
    pub interval: String,

    /// WebSocket endpoint delivering candle/price/trade messages.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Exchange REST base URL used to backfill the window on startup.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    // --- Window & indicators -------------------------------------------------

    /// Maximum number of candles retained in the rolling window.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    #[serde(default = "default_sma_period")]
    pub sma_period: usize,

    #[serde(default = "default_ema_period")]
    pub ema_period: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Bollinger band width in standard deviations.
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,

    // --- Reconnect policy ----------------------------------------------------

    /// Consecutive failed attempts tolerated before the connection is
    /// declared permanently failed.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Whether a lost connection is retried automatically.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval: default_interval(),
            feed_url: default_feed_url(),
            rest_url: default_rest_url(),
            capacity: default_capacity(),
            sma_period: default_sma_period(),
            ema_period: default_ema_period(),
            rsi_period: default_rsi_period(),
            bollinger_k: default_bollinger_k(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            auto_reconnect: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            interval = %config.interval,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Indicator look-back settings for the calculator.
    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            sma_period: self.sma_period,
            ema_period: self.ema_period,
            rsi_period: self.rsi_period,
            bollinger_k: self.bollinger_k,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.interval, "1m");
        assert_eq!(cfg.capacity, 200);
        assert_eq!(cfg.sma_period, 20);
        assert_eq!(cfg.ema_period, 20);
        assert_eq!(cfg.rsi_period, 14);
        assert!((cfg.bollinger_k - 2.0).abs() < f64::EPSILON);
        assert_eq!(cfg.max_reconnect_attempts, 5);
        assert_eq!(cfg.reconnect_interval_ms, 5_000);
        assert!(cfg.auto_reconnect);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.capacity, 200);
        assert!(cfg.auto_reconnect);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbol": "ETHUSDT", "capacity": 500, "auto_reconnect": false }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.capacity, 500);
        assert!(!cfg.auto_reconnect);
        assert_eq!(cfg.rsi_period, 14);
        assert_eq!(cfg.reconnect_interval_ms, 5_000);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = RuntimeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbol, cfg2.symbol);
        assert_eq!(cfg.capacity, cfg2.capacity);
        assert_eq!(cfg.max_reconnect_attempts, cfg2.max_reconnect_attempts);
    }

    #[test]
    fn indicator_params_mirror_config() {
        let json = r#"{ "sma_period": 10, "rsi_period": 7, "bollinger_k": 2.5 }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        let params = cfg.indicator_params();
        assert_eq!(params.sma_period, 10);
        assert_eq!(params.ema_period, 20);
        assert_eq!(params.rsi_period, 7);
        assert!((params.bollinger_k - 2.5).abs() < f64::EPSILON);
    }
}

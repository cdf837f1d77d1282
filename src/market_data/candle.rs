// =============================================================================
// Candle — one OHLCV bar, bucket-aligned to the subscription timeframe
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single OHLCV candle.
///
/// `timestamp` is the bucket-aligned open time in epoch milliseconds. Two
/// candles with equal timestamps are the same bar at different points of its
/// life (an in-progress update); strictly increasing timestamps are distinct
/// bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Structural validation for candles arriving off the feed.
    ///
    /// Returns a human-readable reason when the candle is rejected:
    /// - non-positive or absurd timestamp (not a plausible epoch ms value)
    /// - non-finite OHLCV field
    /// - `high < max(open, close)` or `low > min(open, close)`
    /// - negative volume
    pub fn validate(&self) -> Result<(), String> {
        if self.timestamp <= 0 {
            return Err(format!("timestamp {} is not a valid epoch ms value", self.timestamp));
        }

        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(format!("field {name} is not finite: {value}"));
            }
        }

        if self.high < self.open.max(self.close) {
            return Err(format!(
                "high {} below max(open, close) = {}",
                self.high,
                self.open.max(self.close)
            ));
        }
        if self.low > self.open.min(self.close) {
            return Err(format!(
                "low {} above min(open, close) = {}",
                self.low,
                self.open.min(self.close)
            ));
        }
        if self.volume < 0.0 {
            return Err(format!("volume {} is negative", self.volume));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn valid_candle() -> Candle {
        Candle {
            timestamp: 1_700_000_000_000,
            open: 100.0,
            high: 101.5,
            low: 99.0,
            close: 101.0,
            volume: 12.5,
        }
    }

    #[test]
    fn valid_candle_passes() {
        assert!(valid_candle().validate().is_ok());
    }

    #[test]
    fn zero_timestamp_rejected() {
        let mut c = valid_candle();
        c.timestamp = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn nan_field_rejected() {
        let mut c = valid_candle();
        c.close = f64::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn high_below_close_rejected() {
        let mut c = valid_candle();
        c.high = 100.5; // close is 101.0
        assert!(c.validate().is_err());
    }

    #[test]
    fn low_above_open_rejected() {
        let mut c = valid_candle();
        c.low = 100.5; // open is 100.0
        assert!(c.validate().is_err());
    }

    #[test]
    fn negative_volume_rejected() {
        let mut c = valid_candle();
        c.volume = -1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_volume_allowed() {
        let mut c = valid_candle();
        c.volume = 0.0;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn doji_candle_allowed() {
        // open == high == low == close is a legal (if dull) bar.
        let c = Candle {
            timestamp: 1_700_000_000_000,
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 0.0,
        };
        assert!(c.validate().is_ok());
    }
}

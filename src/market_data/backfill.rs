// =============================================================================
// Historical backfill — seed the window before live data arrives
// =============================================================================
//
// Fetches recent klines from the exchange REST API and folds them through
// the normal merge path, so the chart has a full window at startup instead
// of filling one bar per interval. Backfill failure is non-fatal: the live
// feed populates the window eventually either way.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::market_data::{Candle, MarketSubscription};

/// Fetch up to `limit` recent klines and merge them into the subscription.
///
/// Returns the number of candles merged. Rows the exchange returns are
/// oldest-first, which is exactly the order the merger requires.
pub async fn backfill_window(
    subscription: &MarketSubscription,
    rest_url: &str,
    limit: usize,
) -> Result<usize> {
    let url = format!(
        "{}/api/v3/klines?symbol={}&interval={}&limit={}",
        rest_url.trim_end_matches('/'),
        subscription.symbol(),
        subscription.interval(),
        limit
    );
    info!(url = %url, "backfilling candle window");

    let rows: Vec<serde_json::Value> = reqwest::get(&url)
        .await
        .context("backfill request failed")?
        .error_for_status()
        .context("backfill request returned an error status")?
        .json()
        .await
        .context("failed to decode backfill response")?;

    let mut merged = 0usize;
    for row in &rows {
        match parse_kline_row(row) {
            Ok(candle) => {
                if let Err(e) = subscription.apply_candle(candle) {
                    warn!(error = %e, "backfill candle rejected");
                } else {
                    merged += 1;
                }
            }
            Err(e) => warn!(error = %e, "skipping unparseable backfill row"),
        }
    }

    info!(merged, total = rows.len(), "backfill complete");
    Ok(merged)
}

/// Parse one exchange kline row:
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
fn parse_kline_row(row: &serde_json::Value) -> Result<Candle> {
    let arr = row.as_array().context("kline row is not an array")?;
    if arr.len() < 6 {
        anyhow::bail!("kline row has {} fields, expected at least 6", arr.len());
    }

    let timestamp = arr[0].as_i64().context("kline open time is not an integer")?;

    Ok(Candle {
        timestamp,
        open: parse_string_f64(&arr[1], "open")?,
        high: parse_string_f64(&arr[2], "high")?,
        low: parse_string_f64(&arr[3], "low")?,
        close: parse_string_f64(&arr[4], "close")?,
        volume: parse_string_f64(&arr[5], "volume")?,
    })
}

/// Helper: the exchange sends numeric values as JSON strings inside kline
/// rows.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kline_row_ok() {
        let row = serde_json::json!([
            1700000000000_i64,
            "37000.00",
            "37050.00",
            "36990.00",
            "37020.00",
            "123.456",
            1700000059999_i64,
            "4567890.12",
            1500
        ]);
        let candle = parse_kline_row(&row).unwrap();
        assert_eq!(candle.timestamp, 1_700_000_000_000);
        assert!((candle.open - 37_000.0).abs() < f64::EPSILON);
        assert!((candle.close - 37_020.0).abs() < f64::EPSILON);
        assert!((candle.volume - 123.456).abs() < 1e-9);
        assert!(candle.validate().is_ok());
    }

    #[test]
    fn parse_kline_row_accepts_bare_numbers() {
        let row = serde_json::json!([1700000000000_i64, 1.0, 2.0, 0.5, 1.5, 10.0]);
        let candle = parse_kline_row(&row).unwrap();
        assert!((candle.high - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_kline_row_rejects_short_rows() {
        let row = serde_json::json!([1700000000000_i64, "1.0"]);
        assert!(parse_kline_row(&row).is_err());
    }

    #[test]
    fn parse_kline_row_rejects_non_array() {
        let row = serde_json::json!({ "open": "1.0" });
        assert!(parse_kline_row(&row).is_err());
    }

    #[test]
    fn parse_kline_row_rejects_garbage_price() {
        let row = serde_json::json!([1700000000000_i64, "abc", "2.0", "0.5", "1.5", "10"]);
        assert!(parse_kline_row(&row).is_err());
    }
}

// =============================================================================
// Relative Strength Index (RSI) — simple trailing averages
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Each value at candle index `i >= period` is computed independently from the
// `period` deltas trailing that candle:
//
//   avg_gain = mean of positive deltas   avg_loss = mean of |negative deltas|
//   RSI = 100                            when avg_loss == 0
//   RSI = 100 - 100 / (1 + avg_gain / avg_loss)   otherwise
//
// No Wilder smoothing: every value is a fresh window computation, so the
// series is a pure function of the closes it was given.
//
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

/// Compute the full RSI series for the given `closes` and `period`.
///
/// The returned vector has one value for each close starting at index
/// `period`; the first `period` closes produce no value.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec (need `period` deltas)
/// - Average loss of exactly zero clamps the value to 100.0.
/// - A window containing a non-finite delta stops the series.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut result = Vec::with_capacity(closes.len() - period);

    for i in period..closes.len() {
        // The `period` deltas ending at close index `i`.
        let window = &deltas[i - period..i];

        let (sum_gain, sum_loss) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l + d.abs())
            }
        });

        let avg_gain = sum_gain / period_f;
        let avg_loss = sum_loss / period_f;

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };

        if !rsi.is_finite() {
            break;
        }
        result.push(rsi);
    }

    result
}

/// Convenience function: return the most recent RSI value together with a
/// human-readable label.
pub fn current_rsi(closes: &[f64], period: usize) -> Option<(f64, &'static str)> {
    let series = calculate_rsi(closes, period);
    let value = *series.last()?;

    let label = if value >= 70.0 {
        "OVERBOUGHT"
    } else if value <= 30.0 {
        "OVERSOLD"
    } else {
        "NEUTRAL"
    };

    Some((value, label))
}

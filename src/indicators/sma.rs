// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// The unweighted mean of the trailing `period` closes. The series is sparse:
// the first `period - 1` closes produce no value, so the result is
// tail-aligned (output index 0 corresponds to close index `period - 1`).

/// Compute the SMA series for the given `closes` and `period`.
///
/// Returns `closes.len() - period + 1` values, or an empty vec when the
/// input is shorter than `period` or the period is zero. Values are never
/// zero-filled for the warm-up region.
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);

    // Rolling sum: seed with the first window, then slide.
    let mut sum: f64 = closes[..period].iter().sum();
    result.push(sum / period as f64);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result.push(sum / period as f64);
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_empty_input() {
        assert!(calculate_sma(&[], 20).is_empty());
    }

    #[test]
    fn sma_period_zero() {
        assert!(calculate_sma(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn sma_insufficient_data() {
        let closes: Vec<f64> = (1..=19).map(|x| x as f64).collect();
        assert!(calculate_sma(&closes, 20).is_empty());
    }

    #[test]
    fn sma_twenty_over_ascending_closes() {
        // closes = [1, 2, ..., 25]. Each value averages the 20 trailing
        // closes ending at its candle: index 19 -> mean(1..=20), index 24 ->
        // mean(6..=25).
        let closes: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        let sma = calculate_sma(&closes, 20);
        assert_eq!(sma.len(), 6); // candle indices 19..=24

        assert!((sma[0] - 10.5).abs() < 1e-10);
        assert!((sma[5] - 15.5).abs() < 1e-10);
    }

    #[test]
    fn sma_matches_naive_windows() {
        let closes: Vec<f64> = (0..40).map(|x| ((x * 37) % 11) as f64).collect();
        let sma = calculate_sma(&closes, 20);
        for (j, window) in closes.windows(20).enumerate() {
            let naive: f64 = window.iter().sum::<f64>() / 20.0;
            assert!((sma[j] - naive).abs() < 1e-9, "index {j}: {} vs {naive}", sma[j]);
        }
    }

    #[test]
    fn sma_period_one_is_identity() {
        let closes = vec![3.0, 1.0, 4.0];
        assert_eq!(calculate_sma(&closes, 1), closes);
    }
}

// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the population standard deviation
// of the same trailing closes used for that SMA value.
//
// The three series are index-aligned with the SMA: the first `period - 1`
// candles produce no bands.

use serde::Serialize;

use crate::indicators::sma::calculate_sma;

/// Band series, index-aligned with each other and with the SMA.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn len(&self) -> usize {
        self.middle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }
}

/// Calculate Bollinger Bands for the given closing prices.
///
/// Returns empty series when there are fewer than `period` closes or the
/// period is zero. `k` is the band width in standard deviations.
pub fn calculate_bollinger(closes: &[f64], period: usize, k: f64) -> BollingerBands {
    let middle = calculate_sma(closes, period);
    if middle.is_empty() {
        return BollingerBands::default();
    }

    let mut upper = Vec::with_capacity(middle.len());
    let mut lower = Vec::with_capacity(middle.len());

    for (j, window) in closes.windows(period).enumerate() {
        let mean = middle[j];
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();

        upper.push(mean + k * std_dev);
        lower.push(mean - k * std_dev);
    }

    BollingerBands { upper, middle, lower }
}

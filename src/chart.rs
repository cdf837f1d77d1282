// =============================================================================
// Chart presentation adapter
// =============================================================================
//
// Maps the candle window and the derived indicator series to render-ready,
// timestamp-tagged line series for the dashboard chart. Sparse series are
// tail-aligned: a series of length m over n candles pairs value j with
// candle n - m + j. Pairing here means the frontend never has to know each
// indicator's warm-up length.

use serde::Serialize;

use crate::indicators::IndicatorSeries;
use crate::market_data::Candle;

/// One point of a chart line series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// Everything the chart needs to draw one frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartSeries {
    pub candles: Vec<Candle>,
    pub sma: Vec<SeriesPoint>,
    pub ema: Vec<SeriesPoint>,
    pub rsi: Vec<SeriesPoint>,
    pub bollinger_upper: Vec<SeriesPoint>,
    pub bollinger_middle: Vec<SeriesPoint>,
    pub bollinger_lower: Vec<SeriesPoint>,
}

/// Build the render-ready series for one consistent (window, indicators)
/// snapshot pair.
pub fn build_chart_series(candles: Vec<Candle>, indicators: &IndicatorSeries) -> ChartSeries {
    let sma = tail_align(&candles, &indicators.sma);
    let ema = tail_align(&candles, &indicators.ema);
    let rsi = tail_align(&candles, &indicators.rsi);
    let bollinger_upper = tail_align(&candles, &indicators.bollinger.upper);
    let bollinger_middle = tail_align(&candles, &indicators.bollinger.middle);
    let bollinger_lower = tail_align(&candles, &indicators.bollinger.lower);

    ChartSeries {
        candles,
        sma,
        ema,
        rsi,
        bollinger_upper,
        bollinger_middle,
        bollinger_lower,
    }
}

/// Pair each value with the timestamp of the candle it was computed for,
/// aligning the end of the value series with the end of the candle series.
fn tail_align(candles: &[Candle], values: &[f64]) -> Vec<SeriesPoint> {
    if values.len() > candles.len() {
        // An indicator series can never outgrow its window; render nothing
        // rather than mislabel points.
        return Vec::new();
    }

    let offset = candles.len() - values.len();
    candles[offset..]
        .iter()
        .zip(values.iter())
        .map(|(candle, &value)| SeriesPoint {
            timestamp: candle.timestamp,
            value,
        })
        .collect()
}

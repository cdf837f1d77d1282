// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators backing the live
// chart. Derived series are recomputed in full from the current candle
// window on every update; there is no incremental state to drift. Short
// inputs yield empty series rather than errors, so callers must handle
// empty results instead of assuming fixed lengths.

pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;

use serde::Serialize;

use crate::market_data::Candle;

pub use bollinger::BollingerBands;

/// Look-back periods and band width for one full recompute.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorParams {
    pub sma_period: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub bollinger_k: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_period: 20,
            rsi_period: 14,
            bollinger_k: 2.0,
        }
    }
}

/// All derived series for one candle window snapshot.
///
/// Series lengths differ: `ema` covers every candle (seeded with the first
/// close), while `sma`, `rsi` and `bollinger` are tail-aligned sparse series
/// that skip their warm-up region. Callers pair values with candles by
/// offsetting from the tail, never by shared index.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndicatorSeries {
    pub sma: Vec<f64>,
    pub ema: Vec<f64>,
    pub rsi: Vec<f64>,
    pub bollinger: BollingerBands,
}

impl IndicatorSeries {
    /// Full recompute from a window snapshot. Deterministic and stateless:
    /// equal windows produce equal series.
    pub fn compute(candles: &[Candle], params: &IndicatorParams) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        Self {
            sma: sma::calculate_sma(&closes, params.sma_period),
            ema: ema::calculate_ema(&closes, params.ema_period),
            rsi: rsi::calculate_rsi(&closes, params.rsi_period),
            bollinger: bollinger::calculate_bollinger(
                &closes,
                params.sma_period,
                params.bollinger_k,
            ),
        }
    }
}

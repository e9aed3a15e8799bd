// =============================================================================
// IndicatorBundle - every series the rulebook and the report read
// =============================================================================
//
// Computed once per request from the normalised bars so that the signal
// evaluator, the regime detector and the report all see the same numbers.
// =============================================================================

use crate::market_data::bar::{closes, Bar};
use crate::runtime_config::IndicatorParams;

use super::adx::{adx, AdxSeries};
use super::atr::atr;
use super::bollinger::{bollinger, BollingerSeries};
use super::ichimoku::{ichimoku, IchimokuSeries};
use super::ma::sma;
use super::macd::{macd, MacdSeries};
use super::rsi::rsi;
use super::stochastic::{stochastic, StochasticSeries};
use super::supertrend::{supertrend, SuperTrendSeries};
use super::Series;

#[derive(Debug, Clone)]
pub struct IndicatorBundle {
    pub closes: Vec<f64>,
    pub ma_short: Series,
    pub ma_mid: Series,
    pub ma_long: Series,
    pub macd: MacdSeries,
    pub rsi: Series,
    pub kdj: StochasticSeries,
    pub bollinger: BollingerSeries,
    pub atr: Series,
    pub adx: AdxSeries,
    pub supertrend: SuperTrendSeries,
    pub ichimoku: IchimokuSeries,
}

impl IndicatorBundle {
    pub fn compute(bars: &[Bar], p: &IndicatorParams) -> Self {
        let closes = closes(bars);
        Self {
            ma_short: sma(&closes, p.ma_short),
            ma_mid: sma(&closes, p.ma_mid),
            ma_long: sma(&closes, p.ma_long),
            macd: macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal),
            rsi: rsi(&closes, p.rsi_period),
            kdj: stochastic(bars, p.kdj_period, p.kdj_smoothing),
            bollinger: bollinger(&closes, p.bollinger_period, p.bollinger_std),
            atr: atr(bars, p.atr_period),
            adx: adx(bars, p.adx_period),
            supertrend: supertrend(bars, p.supertrend_period, p.supertrend_multiplier),
            ichimoku: ichimoku(bars, p.ichimoku_tenkan, p.ichimoku_kijun, p.ichimoku_senkou),
            closes,
        }
    }

    /// Number of bars the bundle was computed from.
    pub fn len(&self) -> usize {
        self.closes.len()
    }
}

// =============================================================================
// AnalysisReport - the JSON record the dashboard renders
// =============================================================================
//
// Everything the chart, the signal cards and the PDF export need for one
// symbol/period: display metadata, the latest price and day change, the OHLCV
// series, every signal in rulebook order, the composite score, a snapshot of
// the latest indicator values, the configured MA levels and the chart overlays.
//
// Undefined values serialise as `null`; no NaN or infinity reaches the output.
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::indicators::ma::sma;
use crate::indicators::supertrend::SuperTrendPoint;
use crate::indicators::{finite, latest, IndicatorBundle, Series};
use crate::market_data::{Bar, StockInfo};
use crate::signals::{CompositeScore, Signal};
use crate::types::Period;

use super::pipeline::Analysis;

/// Latest bar plus the change against the previous close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub date: NaiveDate,
    pub latest_price: f64,
    pub prev_close: Option<f64>,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl PriceInfo {
    /// `None` for an empty series.
    pub fn from_bars(bars: &[Bar]) -> Option<Self> {
        let last = bars.last()?;
        let prev_close = bars.len().checked_sub(2).map(|i| bars[i].close);
        let change = prev_close.and_then(|p| finite(last.close - p));
        let change_pct = prev_close
            .filter(|p| *p > 0.0)
            .and_then(|p| finite((last.close - p) / p * 100.0));
        Some(Self {
            date: last.date,
            latest_price: last.close,
            prev_close,
            change,
            change_pct,
            open: last.open,
            high: last.high,
            low: last.low,
            volume: last.volume,
        })
    }
}

/// Latest value of every indicator shown in the summary panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyIndicators {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub kdj_k: Option<f64>,
    pub kdj_d: Option<f64>,
    pub kdj_j: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub bollinger_width_pct: Option<f64>,
    pub atr: Option<f64>,
    pub atr_pct: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub supertrend: Option<f64>,
    pub ichimoku_tenkan: Option<f64>,
    pub ichimoku_kijun: Option<f64>,
}

impl KeyIndicators {
    pub fn from_bundle(ind: &IndicatorBundle, atr_pct: Option<f64>) -> Self {
        Self {
            rsi: latest(&ind.rsi),
            macd: latest(&ind.macd.macd),
            macd_signal: latest(&ind.macd.signal),
            macd_histogram: latest(&ind.macd.histogram),
            kdj_k: latest(&ind.kdj.k),
            kdj_d: latest(&ind.kdj.d),
            kdj_j: latest(&ind.kdj.j),
            bollinger_upper: latest(&ind.bollinger.upper),
            bollinger_middle: latest(&ind.bollinger.middle),
            bollinger_lower: latest(&ind.bollinger.lower),
            bollinger_width_pct: latest(&ind.bollinger.width_pct),
            atr: latest(&ind.atr),
            atr_pct,
            adx: latest(&ind.adx.adx),
            plus_di: latest(&ind.adx.plus_di),
            minus_di: latest(&ind.adx.minus_di),
            supertrend: ind.supertrend.latest().map(|p| p.value),
            ichimoku_tenkan: latest(&ind.ichimoku.tenkan),
            ichimoku_kijun: latest(&ind.ichimoku.kijun),
        }
    }
}

/// Latest SMA for one configured window (MA5 … MA250).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaLevel {
    pub window: usize,
    pub value: Option<f64>,
}

/// Series drawn over the price chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlays {
    pub ma_short: Series,
    pub ma_mid: Series,
    pub ma_long: Series,
    pub bollinger_upper: Series,
    pub bollinger_lower: Series,
    /// Aligned with `ohlcv`.
    pub supertrend: Vec<Option<SuperTrendPoint>>,
    pub ichimoku_tenkan: Series,
    pub ichimoku_kijun: Series,
    /// `ohlcv.len() + displacement` entries; the tail projects past the last bar.
    pub ichimoku_span_a: Series,
    pub ichimoku_span_b: Series,
    pub ichimoku_chikou: Series,
    pub ichimoku_displacement: usize,
}

impl Overlays {
    fn from_bundle(ind: &IndicatorBundle) -> Self {
        Self {
            ma_short: ind.ma_short.clone(),
            ma_mid: ind.ma_mid.clone(),
            ma_long: ind.ma_long.clone(),
            bollinger_upper: ind.bollinger.upper.clone(),
            bollinger_lower: ind.bollinger.lower.clone(),
            supertrend: ind.supertrend.points.clone(),
            ichimoku_tenkan: ind.ichimoku.tenkan.clone(),
            ichimoku_kijun: ind.ichimoku.kijun.clone(),
            ichimoku_span_a: ind.ichimoku.span_a.clone(),
            ichimoku_span_b: ind.ichimoku.span_b.clone(),
            ichimoku_chikou: ind.ichimoku.chikou.clone(),
            ichimoku_displacement: ind.ichimoku.displacement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub stock_info: StockInfo,
    pub period: Period,
    pub price_info: PriceInfo,
    pub ohlcv: Vec<Bar>,
    /// One entry per rule that had enough history, in rulebook order.
    pub signals: Vec<Signal>,
    pub composite: CompositeScore,
    pub key_indicators: KeyIndicators,
    pub ma_levels: Vec<MaLevel>,
    pub overlays: Overlays,
}

impl AnalysisReport {
    /// Assemble the report.  `None` only when the analysis has no bars, which
    /// `run_pipeline` never produces.
    pub fn build(
        stock_info: StockInfo,
        period: Period,
        analysis: Analysis,
        ma_windows: &[usize],
    ) -> Option<Self> {
        let Analysis {
            bars,
            indicators,
            signals,
            composite,
        } = analysis;

        let price_info = PriceInfo::from_bars(&bars)?;
        let ma_levels = ma_windows
            .iter()
            .map(|&window| MaLevel {
                window,
                value: latest(&sma(&indicators.closes, window)),
            })
            .collect();

        Some(Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            stock_info,
            period,
            price_info,
            key_indicators: KeyIndicators::from_bundle(&indicators, composite.regime.atr_pct),
            overlays: Overlays::from_bundle(&indicators),
            ma_levels,
            signals: signals.signals,
            composite,
            ohlcv: bars,
        })
    }
}

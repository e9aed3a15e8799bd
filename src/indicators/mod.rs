// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the
// signal evaluator.  Every public function returns a full-length `Series`
// aligned with its input bars: `None` marks warm-up (or otherwise
// undefined) positions, so callers are forced to handle insufficient data
// instead of reading a spurious zero.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod bundle;
pub mod ichimoku;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod stochastic;
pub mod supertrend;

pub use bundle::IndicatorBundle;

/// One optional value per input bar.
pub type Series = Vec<Option<f64>>;

/// Value at the last position, if defined.
pub fn latest(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Value at the second-to-last position, if defined.
pub fn previous(series: &[Option<f64>]) -> Option<f64> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    series[n - 2]
}

/// `Some(v)` only for finite `v`.
pub(crate) fn finite(v: f64) -> Option<f64> {
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}

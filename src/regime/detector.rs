// =============================================================================
// Market Regime Detector
// =============================================================================
//
// Classifies the latest bar into a regime from two measures, independently
// of the buy/sell score:
//   - ATR as a percentage of price (volatility)
//   - ADX (trend strength)
//
// Detection hierarchy (evaluated top-to-bottom; first match wins):
//
//   1. VOLATILE  - ATR% >= volatile_atr_pct   (default 4.0)
//   2. TRENDING  - ADX  >= trending_adx       (default 25.0)
//   3. RANGING   - otherwise
//
// When neither measure is available (short history) the regime is MIXED.
// When only one is available the rules that need the missing one are skipped.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::indicators::atr::atr_pct;
use crate::indicators::{latest, IndicatorBundle};
use crate::market_data::Bar;
use crate::runtime_config::RegimeThresholds;

// =============================================================================
// Types
// =============================================================================

/// High-level market regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeLabel {
    /// Strong directional move.
    Trending,
    /// Sideways chop.
    Ranging,
    /// Wide swings relative to price.
    Volatile,
    /// Not enough history to tell.
    Mixed,
}

impl std::fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trending => write!(f, "trending"),
            Self::Ranging => write!(f, "ranging"),
            Self::Volatile => write!(f, "volatile"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

/// Detected regime plus the contributing metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub label: RegimeLabel,

    /// Average Directional Index (trend strength).
    pub adx: Option<f64>,

    /// ATR as a percentage of the latest close.
    pub atr_pct: Option<f64>,

    /// Confidence in the classification [0.0, 1.0].
    pub confidence: f64,
}

impl RegimeState {
    pub fn mixed() -> Self {
        Self {
            label: RegimeLabel::Mixed,
            adx: None,
            atr_pct: None,
            confidence: 0.0,
        }
    }
}

/// Detect the regime for the latest bar.
pub fn detect(bars: &[Bar], ind: &IndicatorBundle, th: &RegimeThresholds) -> RegimeState {
    let atr_pct = atr_pct(bars, &ind.atr);
    let adx = latest(&ind.adx.adx);
    let (label, confidence) = classify(atr_pct, adx, th);
    RegimeState {
        label,
        adx,
        atr_pct,
        confidence,
    }
}

// =============================================================================
// Classification logic
// =============================================================================

/// Determine the regime and a confidence score from the raw indicator values.
fn classify(atr_pct: Option<f64>, adx: Option<f64>, th: &RegimeThresholds) -> (RegimeLabel, f64) {
    if atr_pct.is_none() && adx.is_none() {
        return (RegimeLabel::Mixed, 0.0);
    }

    // 1. VOLATILE - wide bars relative to price.
    if let Some(pct) = atr_pct {
        if pct >= th.volatile_atr_pct {
            let confidence = remap(pct, th.volatile_atr_pct, th.volatile_atr_pct * 2.0, 0.60, 1.0);
            return (RegimeLabel::Volatile, confidence);
        }
    }

    let Some(adx) = adx else {
        // Calm, but trend strength unknown.
        return (RegimeLabel::Ranging, 0.30);
    };

    // 2. TRENDING - strong directional movement.
    if adx >= th.trending_adx {
        let confidence = remap(adx, th.trending_adx, th.trending_adx * 2.0, 0.60, 1.0);
        return (RegimeLabel::Trending, confidence);
    }

    // 3. RANGING - confidence rises as ADX falls.
    trace!(adx = format!("{:.2}", adx), "Regime: no trend, classifying as RANGING");
    let confidence = remap(adx, th.trending_adx, 0.0, 0.50, 1.0);
    (RegimeLabel::Ranging, confidence)
}

/// Linearly remap `value` from `[in_lo, in_hi]` to `[out_lo, out_hi]`, clamped
/// to the output range. Works regardless of whether `in_lo < in_hi` or vice
/// versa.
fn remap(value: f64, in_lo: f64, in_hi: f64, out_lo: f64, out_hi: f64) -> f64 {
    let t = if (in_hi - in_lo).abs() < f64::EPSILON {
        0.5
    } else {
        (value - in_lo) / (in_hi - in_lo)
    };
    let clamped = t.clamp(0.0, 1.0);
    out_lo + clamped * (out_hi - out_lo)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::bar::test_support::{bars_from_closes, flat_bars, rising_bars};
    use crate::runtime_config::IndicatorParams;

    fn th() -> RegimeThresholds {
        RegimeThresholds::default()
    }

    #[test]
    fn test_classify_volatile_has_priority() {
        let (label, conf) = classify(Some(6.0), Some(40.0), &th());
        assert_eq!(label, RegimeLabel::Volatile);
        assert!(conf > 0.6);
    }

    #[test]
    fn test_classify_trending() {
        let (label, _) = classify(Some(1.5), Some(30.0), &th());
        assert_eq!(label, RegimeLabel::Trending);
    }

    #[test]
    fn test_classify_ranging() {
        let (label, conf) = classify(Some(1.5), Some(10.0), &th());
        assert_eq!(label, RegimeLabel::Ranging);
        assert!((conf - 0.8).abs() < 1e-10);
    }

    #[test]
    fn test_classify_mixed_without_data() {
        let (label, conf) = classify(None, None, &th());
        assert_eq!(label, RegimeLabel::Mixed);
        assert_eq!(conf, 0.0);
    }

    #[test]
    fn test_classify_partial_data() {
        let (label, conf) = classify(Some(1.0), None, &th());
        assert_eq!(label, RegimeLabel::Ranging);
        assert!((conf - 0.30).abs() < 1e-10);
        let (label, _) = classify(None, Some(40.0), &th());
        assert_eq!(label, RegimeLabel::Trending);
    }

    #[test]
    fn test_detect_on_series() {
        let p = IndicatorParams::default();

        let rising = rising_bars(60);
        let state = detect(&rising, &IndicatorBundle::compute(&rising, &p), &th());
        assert_eq!(state.label, RegimeLabel::Trending);
        assert!((state.adx.unwrap() - 100.0).abs() < 1e-9);
        assert!(state.atr_pct.unwrap() < 4.0);

        let flat = flat_bars(100.0, 60);
        let state = detect(&flat, &IndicatorBundle::compute(&flat, &p), &th());
        assert_eq!(state.label, RegimeLabel::Ranging);

        let short = rising_bars(5);
        let state = detect(&short, &IndicatorBundle::compute(&short, &p), &th());
        assert_eq!(state.label, RegimeLabel::Mixed);
    }

    #[test]
    fn test_detect_volatile_series() {
        // Penny stock swinging 20% a day.
        let closes: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 5.0 } else { 6.0 }).collect();
        let bars = bars_from_closes(&closes);
        let state = detect(&bars, &IndicatorBundle::compute(&bars, &IndicatorParams::default()), &th());
        assert_eq!(state.label, RegimeLabel::Volatile);
    }

    #[test]
    fn test_regime_display() {
        assert_eq!(format!("{}", RegimeLabel::Trending), "trending");
        assert_eq!(format!("{}", RegimeLabel::Mixed), "mixed");
    }

    #[test]
    fn test_remap() {
        assert!((remap(0.5, 0.0, 1.0, 0.0, 10.0) - 5.0).abs() < 1e-10);
        // Clamping above.
        assert!((remap(2.0, 0.0, 1.0, 0.0, 10.0) - 10.0).abs() < 1e-10);
        // Clamping below.
        assert!((remap(-1.0, 0.0, 1.0, 0.0, 10.0) - 0.0).abs() < 1e-10);
    }
}

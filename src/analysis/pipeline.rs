// =============================================================================
// Analysis pipeline - bars → indicators → signals → regime → composite
// =============================================================================
//
// Pure and synchronous.  Every stage reads the same `IndicatorBundle`, so the
// signal cards, the regime label and the report overlays agree on the numbers.
// Short history suppresses individual rules; only an empty series is an error.
// =============================================================================

use tracing::debug;

use crate::error::{AppError, Result};
use crate::indicators::IndicatorBundle;
use crate::market_data::bar::{normalize, Bar};
use crate::regime;
use crate::runtime_config::RuntimeConfig;
use crate::signals::{self, CompositeScore, SignalSet};

/// Everything computed for one symbol and period.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub bars: Vec<Bar>,
    pub indicators: IndicatorBundle,
    pub signals: SignalSet,
    pub composite: CompositeScore,
}

/// Run the full pipeline over `bars`.
///
/// Bars are normalised first, so callers may pass provider rows as-is.
pub fn run_pipeline(symbol: &str, bars: Vec<Bar>, config: &RuntimeConfig) -> Result<Analysis> {
    let bars = normalize(bars);
    if bars.is_empty() {
        return Err(AppError::InsufficientData {
            symbol: symbol.to_string(),
        });
    }

    let indicators = IndicatorBundle::compute(&bars, &config.indicators);
    let signals = signals::evaluate(&indicators, &config.signals);
    let regime = regime::detect(&bars, &indicators, &config.regime);
    let composite = signals::score(&signals, &config.scoring, regime);

    debug!(
        symbol,
        bars = bars.len(),
        rules = signals.evaluated_rules,
        score = format!("{:.2}", composite.score),
        regime = %composite.regime.label,
        "pipeline complete"
    );

    Ok(Analysis {
        bars,
        indicators,
        signals,
        composite,
    })
}

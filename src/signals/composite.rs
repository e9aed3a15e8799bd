// =============================================================================
// Composite Scorer - category-weighted aggregation of the signal set
// =============================================================================
//
//   contribution_i = sign(direction_i) * strength_i * weight(category_i)
//   raw            = Σ contribution_i
//   slots          = RULEBOOK.len()
//   ratio          = raw / (slots * 100 * max_weight)
//   score          = clamp(ratio * 100 * gain, -100, 100)
//
// `slots` is fixed by the rulebook, so adding or strengthening a buy can only
// raise the score.  Rules without history count as zero.  The recommendation
// label comes from the configured breakpoints.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::regime::RegimeState;
use crate::runtime_config::{Breakpoints, ScoringConfig};
use crate::types::{Direction, SignalCategory};

use super::evaluator::RULEBOOK;
use super::signal::SignalSet;

/// Recommendation label derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Recommendation {
    pub fn from_score(score: f64, b: &Breakpoints) -> Self {
        if score >= b.strong_buy {
            Self::StrongBuy
        } else if score >= b.buy {
            Self::Buy
        } else if score <= b.strong_sell {
            Self::StrongSell
        } else if score <= b.sell {
            Self::Sell
        } else {
            Self::Hold
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBuy => write!(f, "Strong Buy"),
            Self::Buy => write!(f, "Buy"),
            Self::Hold => write!(f, "Hold"),
            Self::Sell => write!(f, "Sell"),
            Self::StrongSell => write!(f, "Strong Sell"),
        }
    }
}

/// The contribution of a single signal to the final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub name: String,
    pub category: SignalCategory,
    pub direction: Direction,
    pub strength: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// Result of the composite scoring pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// In [-100, 100].
    pub score: f64,
    pub recommendation: Recommendation,
    pub buy_count: usize,
    pub sell_count: usize,
    pub neutral_count: usize,
    pub regime: RegimeState,
    pub contributions: Vec<SignalContribution>,
}

/// Score a signal set.  The regime is computed independently and attached.
pub fn score(signals: &SignalSet, cfg: &ScoringConfig, regime: RegimeState) -> CompositeScore {
    let weights = &cfg.weights;

    let contributions: Vec<SignalContribution> = signals
        .signals
        .iter()
        .map(|s| {
            let weight = weights.weight(s.category);
            SignalContribution {
                name: s.name.clone(),
                category: s.category,
                direction: s.direction,
                strength: s.strength,
                weight,
                contribution: s.direction.sign() * s.strength * weight,
            }
        })
        .collect();

    let raw: f64 = contributions.iter().map(|c| c.contribution).sum();
    let slots = RULEBOOK.len();
    let denominator = slots as f64 * 100.0 * weights.max();

    let score = if denominator > 0.0 && raw.is_finite() {
        (raw / denominator * 100.0 * cfg.gain).clamp(-100.0, 100.0)
    } else {
        0.0
    };
    let recommendation = Recommendation::from_score(score, &cfg.breakpoints);

    debug!(
        score = format!("{:.2}", score),
        raw = format!("{:.2}", raw),
        signals = signals.len(),
        slots,
        recommendation = %recommendation,
        "composite scored"
    );

    CompositeScore {
        score,
        recommendation,
        buy_count: signals.count(Direction::Buy),
        sell_count: signals.count(Direction::Sell),
        neutral_count: signals.count(Direction::Neutral),
        regime,
        contributions,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::signal::Signal;

    fn signal(name: &str, direction: Direction, strength: f64, category: SignalCategory) -> Signal {
        Signal::new(name, direction, strength, category, "")
    }

    fn set(signals: Vec<Signal>) -> SignalSet {
        let mut s = SignalSet::new();
        for sig in signals {
            s.record(Some(sig));
        }
        s
    }

    fn run(signals: &SignalSet) -> CompositeScore {
        score(signals, &ScoringConfig::default(), RegimeState::mixed())
    }

    #[test]
    fn empty_set_scores_zero_hold() {
        let result = run(&SignalSet::new());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.recommendation, Recommendation::Hold);
        assert_eq!(result.regime.label, crate::regime::detector::RegimeLabel::Mixed);
    }

    #[test]
    fn all_neutral_scores_zero() {
        let s = set(vec![
            Signal::neutral("rsi", SignalCategory::Momentum, ""),
            Signal::neutral("dmi", SignalCategory::Trend, ""),
        ]);
        let result = run(&s);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.neutral_count, 2);
    }

    #[test]
    fn weighted_formula() {
        // raw = 80*1.0 - 50*0.8 = 40; slots 9 => ratio 40/900; score = 2.5 * 4.44..
        let s = set(vec![
            signal("dmi", Direction::Buy, 80.0, SignalCategory::Trend),
            signal("rsi", Direction::Sell, 50.0, SignalCategory::Momentum),
            Signal::neutral("bollinger", SignalCategory::Volatility, ""),
        ]);
        let result = run(&s);
        let expected = 40.0 / 900.0 * 100.0 * 2.5;
        assert!((result.score - expected).abs() < 1e-10);
        assert_eq!(result.recommendation, Recommendation::Hold);
        assert_eq!(result.buy_count, 1);
        assert_eq!(result.sell_count, 1);
        assert!((result.contributions[1].contribution + 40.0).abs() < 1e-10);
    }

    #[test]
    fn score_is_clamped() {
        let all = |d: Direction| {
            set(RULEBOOK
                .iter()
                .map(|(name, _)| signal(name, d, 100.0, SignalCategory::Trend))
                .collect())
        };
        let result = run(&all(Direction::Buy));
        assert_eq!(result.score, 100.0);
        assert_eq!(result.recommendation, Recommendation::StrongBuy);
        assert_eq!(run(&all(Direction::Sell)).score, -100.0);
    }

    #[test]
    fn appending_a_buy_never_lowers_the_score() {
        let base = vec![signal("dmi", Direction::Buy, 30.0, SignalCategory::Trend)];
        let score_a = run(&set(base.clone())).score;
        assert!(score_a > 0.0);

        for strength in [1.0, 5.0, 50.0, 100.0] {
            for category in [
                SignalCategory::Trend,
                SignalCategory::Momentum,
                SignalCategory::Volatility,
            ] {
                let mut b = base.clone();
                b.push(signal("rsi", Direction::Buy, strength, category));
                let score_b = run(&set(b)).score;
                assert!(
                    score_b >= score_a,
                    "score dropped from {score_a} to {score_b}"
                );
            }
        }
    }

    #[test]
    fn adding_a_buy_never_lowers_the_score() {
        let base = vec![
            signal("ma_trend", Direction::Buy, 45.0, SignalCategory::Trend),
            signal("rsi", Direction::Sell, 30.0, SignalCategory::Momentum),
            signal("kdj", Direction::Buy, 12.0, SignalCategory::Momentum),
            Signal::neutral("bollinger", SignalCategory::Volatility, ""),
            Signal::neutral("dmi", SignalCategory::Trend, ""),
        ];
        let a = set(base.clone());
        let score_a = run(&a).score;

        for strength in [1.0, 10.0, 55.0, 100.0] {
            for (i, category) in [(3, SignalCategory::Volatility), (4, SignalCategory::Trend)] {
                let mut b_signals = base.clone();
                b_signals[i] = signal(&base[i].name, Direction::Buy, strength, category);
                let score_b = run(&set(b_signals)).score;
                assert!(
                    score_b >= score_a,
                    "buy of strength {strength} lowered {score_a} to {score_b}"
                );
            }
        }
    }

    #[test]
    fn skipped_rules_count_as_zero() {
        let mut with_skips = SignalSet::new();
        with_skips.record(None);
        with_skips.record(Some(signal("dmi", Direction::Buy, 40.0, SignalCategory::Trend)));
        with_skips.record(None);
        let without = set(vec![signal("dmi", Direction::Buy, 40.0, SignalCategory::Trend)]);
        assert_eq!(run(&with_skips).score, run(&without).score);
    }

    #[test]
    fn recommendation_breakpoints() {
        let b = Breakpoints::default();
        assert_eq!(Recommendation::from_score(60.0, &b), Recommendation::StrongBuy);
        assert_eq!(Recommendation::from_score(59.9, &b), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(20.0, &b), Recommendation::Buy);
        assert_eq!(Recommendation::from_score(19.9, &b), Recommendation::Hold);
        assert_eq!(Recommendation::from_score(0.0, &b), Recommendation::Hold);
        assert_eq!(Recommendation::from_score(-20.0, &b), Recommendation::Sell);
        assert_eq!(Recommendation::from_score(-59.9, &b), Recommendation::Sell);
        assert_eq!(Recommendation::from_score(-60.0, &b), Recommendation::StrongSell);
    }

    #[test]
    fn recommendation_serde_and_display() {
        assert_eq!(
            serde_json::to_string(&Recommendation::StrongBuy).unwrap(),
            "\"strong_buy\""
        );
        assert_eq!(Recommendation::StrongSell.to_string(), "Strong Sell");
    }
}

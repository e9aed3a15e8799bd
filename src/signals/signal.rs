// =============================================================================
// Discrete signals emitted by the rulebook
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{Direction, SignalCategory};

/// One rule's verdict on the latest bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub direction: Direction,
    /// Always within [0, 100].
    pub strength: f64,
    pub category: SignalCategory,
    pub description: String,
}

impl Signal {
    pub fn new(
        name: &str,
        direction: Direction,
        strength: f64,
        category: SignalCategory,
        description: impl Into<String>,
    ) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            name: name.to_string(),
            direction,
            strength,
            category,
            description: description.into(),
        }
    }

    /// A rule that had data but did not fire.
    pub fn neutral(name: &str, category: SignalCategory, description: impl Into<String>) -> Self {
        Self::new(name, Direction::Neutral, 0.0, category, description)
    }
}

/// Every signal produced for one evaluation, in rulebook order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub signals: Vec<Signal>,
    /// Rules that had enough history to run (fired or not).
    pub evaluated_rules: usize,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rule outcome; `None` means the rule lacked history.
    pub fn record(&mut self, outcome: Option<Signal>) {
        if let Some(signal) = outcome {
            self.evaluated_rules += 1;
            self.signals.push(signal);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.signals
            .iter()
            .filter(|s| s.direction == direction)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }
}

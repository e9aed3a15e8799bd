// =============================================================================
// Signals Module
// =============================================================================
//
// Signal processing pipeline for the analysis backend:
// - Rulebook evaluation of the latest bar
// - Category-weighted composite scoring with a recommendation label

pub mod composite;
pub mod evaluator;
pub mod signal;

pub use composite::{score, CompositeScore};
pub use evaluator::evaluate;
pub use signal::{Signal, SignalSet};

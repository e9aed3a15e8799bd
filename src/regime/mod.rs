// =============================================================================
// Regime Detection Module
// =============================================================================
//
// Market regime classification from two measures:
// - ATR relative to price (volatility)
// - ADX (trend strength)

pub mod detector;

pub use detector::{detect, RegimeState};

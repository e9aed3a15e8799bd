// =============================================================================
// Relative Strength Index (RSI) - Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 - Compute price changes (deltas) from consecutive closes.
// Step 2 - Seed average gain / average loss with the SMA of the first `w`
//          gains / losses.
// Step 3 - Apply Wilder's smoothing:
//            avg_gain = (prev_avg_gain * (w - 1) + current_gain) / w
//            avg_loss = (prev_avg_loss * (w - 1) + current_loss) / w
// Step 4 - RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// The first value lands on close index `w` (w deltas need w + 1 closes).
// =============================================================================

use super::Series;

/// Compute the RSI series for `closes` with look-back `w`.
///
/// # Edge cases
/// - `w == 0` or fewer than `w + 1` closes => all `None`
/// - average loss zero with gains => 100.0
/// - no movement at all => 50.0
pub fn rsi(closes: &[f64], w: usize) -> Series {
    let n = closes.len();
    let mut out = vec![None; n];
    if w == 0 || n < w + 1 {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|p| p[1] - p[0]).collect();

    let (sum_gain, sum_loss) = deltas[..w].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let w_f = w as f64;
    let mut avg_gain = sum_gain / w_f;
    let mut avg_loss = sum_loss / w_f;
    out[w] = rsi_from_averages(avg_gain, avg_loss);

    // deltas[k] ends on close index k + 1.
    for (k, &delta) in deltas.iter().enumerate().skip(w) {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (w_f - 1.0) + gain) / w_f;
        avg_loss = (avg_loss * (w_f - 1.0) + loss) / w_f;

        out[k + 1] = rsi_from_averages(avg_gain, avg_loss);
    }

    out
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}

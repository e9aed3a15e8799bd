// =============================================================================
// MACD - Moving Average Convergence / Divergence
// =============================================================================
//
//   MACD line  = EMA(fast) - EMA(slow)            defined for i >= slow - 1
//   Signal     = EMA(signal) of the MACD line     defined for i >= slow + signal - 2
//   Histogram  = MACD line - Signal
//
// Both EMAs are seeded at index 0, so the first `slow - 1` MACD values are
// still dominated by the seed and are masked out.
// =============================================================================

use super::ma::{ema, ema_of_series};
use super::{finite, Series};

/// MACD line, signal line and histogram, each aligned with the input closes.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let n = closes.len();
    if fast == 0 || slow == 0 || signal == 0 {
        return MacdSeries {
            macd: vec![None; n],
            signal: vec![None; n],
            histogram: vec![None; n],
        };
    }

    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    let line_start = slow - 1;

    let line: Series = (0..n)
        .map(|i| {
            if i < line_start {
                return None;
            }
            finite(ema_fast[i]? - ema_slow[i]?)
        })
        .collect();

    let signal_start = slow + signal - 2;
    let signal_line: Series = ema_of_series(&line, signal)
        .into_iter()
        .enumerate()
        .map(|(i, v)| if i < signal_start { None } else { v })
        .collect();

    let histogram: Series = line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| finite((*m)? - (*s)?))
        .collect();

    MacdSeries {
        macd: line,
        signal: signal_line,
        histogram,
    }
}

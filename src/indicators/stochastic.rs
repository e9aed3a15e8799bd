// =============================================================================
// Stochastic Oscillator / KDJ
// =============================================================================
//
//   %K_t = (close_t - LL_w) / (HH_w - LL_w) * 100     defined for t >= w - 1
//   %D_t = SMA(%K, smoothing)
//   J_t  = 3 * %K_t - 2 * %D_t
//
// A zero-width window (HH == LL) yields %K = 50.
// =============================================================================

use crate::market_data::Bar;

use super::ma::sma_of_series;
use super::{finite, Series};

#[derive(Debug, Clone)]
pub struct StochasticSeries {
    pub k: Series,
    pub d: Series,
    pub j: Series,
}

pub fn stochastic(bars: &[Bar], w: usize, smoothing: usize) -> StochasticSeries {
    let n = bars.len();
    let mut k: Series = vec![None; n];

    if w > 0 && n >= w {
        for i in (w - 1)..n {
            let window = &bars[i + 1 - w..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = hh - ll;
            k[i] = if range > 0.0 {
                finite(((bars[i].close - ll) / range * 100.0).clamp(0.0, 100.0))
            } else {
                Some(50.0)
            };
        }
    }

    let d = sma_of_series(&k, smoothing);
    let j = k
        .iter()
        .zip(&d)
        .map(|(k, d)| finite(3.0 * (*k)? - 2.0 * (*d)?))
        .collect();

    StochasticSeries { k, d, j }
}

// =============================================================================
// Moving Averages - Simple (SMA) and Exponential (EMA)
// =============================================================================
//
// SMA_t = mean(values[t-w+1 ..= t]),   defined for t >= w - 1
//
// EMA gives more weight to recent prices:
//   multiplier = 2 / (w + 1)
//   EMA_0      = values[0]
//   EMA_t      = EMA_{t-1} + multiplier * (value_t - EMA_{t-1})
//
// (algebraically value * m + prev * (1 - m), but exact on a constant input)
//
// The EMA is seeded with the first value and therefore defined from index 0;
// consumers that need a settled EMA mask the warm-up themselves (see MACD).
// =============================================================================

use super::{finite, Series};

/// Simple moving average over `w` values.
///
/// `w == 0` or `values.len() < w` => all `None`.
pub fn sma(values: &[f64], w: usize) -> Series {
    let mut out = vec![None; values.len()];
    if w == 0 || values.len() < w {
        return out;
    }
    for i in (w - 1)..values.len() {
        let sum: f64 = values[i + 1 - w..=i].iter().sum();
        out[i] = finite(sum / w as f64);
    }
    out
}

/// SMA over an optional series; a window containing any `None` is `None`.
pub fn sma_of_series(series: &[Option<f64>], w: usize) -> Series {
    let mut out = vec![None; series.len()];
    if w == 0 || series.len() < w {
        return out;
    }
    for i in (w - 1)..series.len() {
        let window = &series[i + 1 - w..=i];
        let sum: Option<f64> = window.iter().copied().sum();
        out[i] = sum.and_then(|s| finite(s / w as f64));
    }
    out
}

/// Exponential moving average seeded with the first value.
///
/// `w == 0` => all `None`.
pub fn ema(values: &[f64], w: usize) -> Series {
    let wrapped: Series = values.iter().map(|&v| finite(v)).collect();
    ema_of_series(&wrapped, w)
}

/// EMA over an optional series.  The average starts at the first defined
/// value; undefined inputs produce `None` without resetting the average.
pub fn ema_of_series(series: &[Option<f64>], w: usize) -> Series {
    if w == 0 {
        return vec![None; series.len()];
    }
    let multiplier = 2.0 / (w as f64 + 1.0);
    let mut state: Option<f64> = None;

    series
        .iter()
        .map(|v| {
            let v = (*v)?;
            let next = match state {
                None => v,
                Some(prev) => prev + multiplier * (v - prev),
            };
            state = finite(next).or(state);
            state
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup_and_values() {
        let s = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(s.len(), 5);
        assert_eq!(s[0], None);
        assert_eq!(s[1], None);
        assert!((s[2].unwrap() - 2.0).abs() < 1e-10);
        assert!((s[4].unwrap() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn sma_degenerate_windows() {
        assert!(sma(&[1.0, 2.0], 0).iter().all(Option::is_none));
        assert!(sma(&[1.0, 2.0], 5).iter().all(Option::is_none));
        assert!(sma(&[], 3).is_empty());
    }

    #[test]
    fn sma_of_series_needs_full_window() {
        let s = sma_of_series(&[None, Some(2.0), Some(4.0), Some(6.0)], 2);
        assert_eq!(s[1], None);
        assert!((s[2].unwrap() - 3.0).abs() < 1e-10);
        assert!((s[3].unwrap() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of 1..=10, seeded with the first value; multiplier = 1/3.
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let e = ema(&closes, 5);
        assert_eq!(e.len(), 10);

        let mult = 2.0 / 6.0;
        let mut expected = 1.0;
        assert!((e[0].unwrap() - expected).abs() < 1e-10);
        for (i, &c) in closes.iter().enumerate().skip(1) {
            expected = c * mult + expected * (1.0 - mult);
            assert!((e[i].unwrap() - expected).abs() < 1e-10, "index {i}");
        }
    }

    #[test]
    fn ema_flat_series_is_flat() {
        let e = ema(&[100.0; 30], 12);
        assert!(e.iter().all(|v| (v.unwrap() - 100.0).abs() < 1e-10));
    }

    #[test]
    fn ema_of_series_starts_at_first_defined() {
        let e = ema_of_series(&[None, None, Some(4.0), Some(7.0)], 2);
        assert_eq!(e[0], None);
        assert_eq!(e[1], None);
        assert!((e[2].unwrap() - 4.0).abs() < 1e-10);
        // multiplier 2/3: 7*2/3 + 4/3 = 6
        assert!((e[3].unwrap() - 6.0).abs() < 1e-10);
    }

    #[test]
    fn ema_period_zero() {
        assert!(ema(&[1.0, 2.0, 3.0], 0).iter().all(Option::is_none));
    }
}

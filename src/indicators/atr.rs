// =============================================================================
// Average True Range (ATR) - Wilder's Smoothing Method
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR_0 = H_0 - L_0                                  (no previous close)
//   TR_t = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_{w-1} = SMA of the first `w` TR values
//   ATR_t     = (ATR_{t-1} * (w - 1) + TR_t) / w
// =============================================================================

use crate::market_data::Bar;

use super::{finite, Series};

/// True range per bar; the first bar uses its own high - low.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high - bar.low;
            if i == 0 {
                return hl;
            }
            let prev_close = bars[i - 1].close;
            hl.max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

/// ATR series, defined from index `w - 1`.
pub fn atr(bars: &[Bar], w: usize) -> Series {
    let n = bars.len();
    let mut out = vec![None; n];
    if w == 0 || n < w {
        return out;
    }

    let tr = true_range(bars);
    let w_f = w as f64;
    let mut value = tr[..w].iter().sum::<f64>() / w_f;
    out[w - 1] = finite(value);

    for i in w..n {
        value = (value * (w_f - 1.0) + tr[i]) / w_f;
        out[i] = finite(value);
    }
    out
}

/// Latest ATR as a percentage of the latest close.
pub fn atr_pct(bars: &[Bar], atr_series: &[Option<f64>]) -> Option<f64> {
    let atr = super::latest(atr_series)?;
    let last_close = bars.last()?.close;
    if last_close == 0.0 {
        return None;
    }
    finite(atr / last_close * 100.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::bar::test_support::{day, flat_bars, rising_bars};

    fn bar(i: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(day(i), close, high, low, close, 100.0)
    }

    #[test]
    fn true_range_uses_previous_close() {
        let bars = vec![
            bar(0, 102.0, 98.0, 101.0),
            // Gap up: |H - prevClose| = 9 dominates H - L = 3.
            bar(1, 110.0, 107.0, 108.0),
            // Gap down: |L - prevClose| = 13 dominates.
            bar(2, 97.0, 95.0, 96.0),
        ];
        let tr = true_range(&bars);
        assert!((tr[0] - 4.0).abs() < 1e-10);
        assert!((tr[1] - 9.0).abs() < 1e-10);
        assert!((tr[2] - 13.0).abs() < 1e-10);
    }

    #[test]
    fn atr_seed_and_smoothing() {
        let bars = vec![
            bar(0, 102.0, 98.0, 101.0),
            bar(1, 110.0, 107.0, 108.0),
            bar(2, 97.0, 95.0, 96.0),
            bar(3, 98.0, 96.0, 97.0),
        ];
        let a = atr(&bars, 3);
        assert_eq!(a.len(), 4);
        assert!(a[1].is_none());
        let seed = (4.0 + 9.0 + 13.0) / 3.0;
        assert!((a[2].unwrap() - seed).abs() < 1e-10);
        // TR_3 = max(2, |98-96|, |96-96|) = 2
        let next = (seed * 2.0 + 2.0) / 3.0;
        assert!((a[3].unwrap() - next).abs() < 1e-10);
    }

    #[test]
    fn atr_insufficient_and_zero_period() {
        assert!(atr(&rising_bars(5), 14).iter().all(Option::is_none));
        assert!(atr(&rising_bars(20), 0).iter().all(Option::is_none));
    }

    #[test]
    fn atr_constant_range() {
        // high - low = 2 and close moves 1 => TR = 2 on every bar.
        let a = atr(&rising_bars(30), 14);
        assert!(a[12].is_none());
        for v in a.into_iter().flatten() {
            assert!((v - 2.0).abs() < 1e-10);
        }
    }

    #[test]
    fn atr_pct_of_latest_close() {
        let bars = rising_bars(30);
        let a = atr(&bars, 14);
        let pct = atr_pct(&bars, &a).unwrap();
        assert!((pct - 2.0 / 129.0 * 100.0).abs() < 1e-10);

        let flat = flat_bars(10.0, 20);
        assert!(atr_pct(&flat, &atr(&flat, 14)).unwrap().abs() < 1e-10);
    }
}

// =============================================================================
// Average Directional Index (ADX) with +DI / -DI
// =============================================================================
//
// ADX quantifies trend **strength** regardless of direction; the DI lines
// give the direction.
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.
//   2. Compute True Range (TR) per bar.
//   3. Apply Wilder's smoothing (period) to +DM, -DM, and TR.
//   4. Derive +DI = smoothed(+DM) / smoothed(TR) * 100
//            -DI = smoothed(-DM) / smoothed(TR) * 100
//   5. DX  = |+DI - -DI| / (+DI + -DI) * 100
//   6. ADX = Wilder's smoothed average of DX over `period` bars.
//
// Alignment: bar 0 has no predecessor, so the first `w` transitions end on
// bar `w`.  +DI / -DI / DX are defined from bar `w`, ADX from bar `2w - 1`.
// A zero smoothed TR gives DI = DX = 0 rather than a division error.
// =============================================================================

use crate::market_data::Bar;

use super::{finite, Series};

#[derive(Debug, Clone)]
pub struct AdxSeries {
    pub adx: Series,
    pub plus_di: Series,
    pub minus_di: Series,
}

pub fn adx(bars: &[Bar], w: usize) -> AdxSeries {
    let n = bars.len();
    let mut out = AdxSeries {
        adx: vec![None; n],
        plus_di: vec![None; n],
        minus_di: vec![None; n],
    };
    if w == 0 || n < w + 1 {
        return out;
    }

    let w_f = w as f64;

    // ------------------------------------------------------------------
    // Step 1 & 2: raw +DM, -DM and TR; index t is the transition ending on bar t
    // ------------------------------------------------------------------
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    let mut tr_vals = vec![0.0; n];

    for t in 1..n {
        let (cur, prev) = (&bars[t], &bars[t - 1]);

        tr_vals[t] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());

        let up_move = cur.high - prev.high;
        let down_move = prev.low - cur.low;

        if up_move > down_move && up_move > 0.0 {
            plus_dm[t] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[t] = down_move;
        }
    }

    // ------------------------------------------------------------------
    // Step 3-5: Wilder-smoothed sums, DI and DX from bar `w`
    // ------------------------------------------------------------------
    let mut smooth_plus_dm: f64 = plus_dm[1..=w].iter().sum();
    let mut smooth_minus_dm: f64 = minus_dm[1..=w].iter().sum();
    let mut smooth_tr: f64 = tr_vals[1..=w].iter().sum();

    let mut dx: Series = vec![None; n];
    for t in w..n {
        if t > w {
            smooth_plus_dm = smooth_plus_dm - smooth_plus_dm / w_f + plus_dm[t];
            smooth_minus_dm = smooth_minus_dm - smooth_minus_dm / w_f + minus_dm[t];
            smooth_tr = smooth_tr - smooth_tr / w_f + tr_vals[t];
        }
        let (pdi, mdi, d) = directional_index(smooth_plus_dm, smooth_minus_dm, smooth_tr);
        out.plus_di[t] = pdi;
        out.minus_di[t] = mdi;
        dx[t] = d;
    }

    // ------------------------------------------------------------------
    // Step 6: ADX = Wilder's smoothed average of DX
    // ------------------------------------------------------------------
    let adx_start = 2 * w - 1;
    if n <= adx_start {
        return out;
    }
    let seed: Option<f64> = dx[w..=adx_start].iter().copied().sum();
    let Some(seed) = seed else {
        return out;
    };
    let mut value = seed / w_f;
    out.adx[adx_start] = finite(value);

    for t in (adx_start + 1)..n {
        let Some(d) = dx[t] else {
            break;
        };
        value = (value * (w_f - 1.0) + d) / w_f;
        out.adx[t] = finite(value);
    }

    out
}

// =============================================================================
// Internal helpers
// =============================================================================

/// +DI, -DI and DX from smoothed sums.
fn directional_index(
    smooth_plus_dm: f64,
    smooth_minus_dm: f64,
    smooth_tr: f64,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    if smooth_tr == 0.0 {
        return (Some(0.0), Some(0.0), Some(0.0));
    }

    let plus_di = (smooth_plus_dm / smooth_tr) * 100.0;
    let minus_di = (smooth_minus_dm / smooth_tr) * 100.0;

    let di_sum = plus_di + minus_di;
    let dx = if di_sum == 0.0 {
        // Both +DI and -DI are zero - no directional movement.
        0.0
    } else {
        ((plus_di - minus_di).abs() / di_sum) * 100.0
    };

    (finite(plus_di), finite(minus_di), finite(dx))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::bar::test_support::{day, flat_bars, rising_bars};

    fn bar(i: usize, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(day(i as i64), close, high, low, close, 1.0)
    }

    #[test]
    fn adx_period_zero() {
        let s = adx(&rising_bars(50), 0);
        assert!(s.adx.iter().all(Option::is_none));
    }

    #[test]
    fn adx_warmup_boundaries() {
        let s = adx(&rising_bars(40), 14);
        assert_eq!(s.adx.len(), 40);
        assert!(s.plus_di[13].is_none());
        assert!(s.plus_di[14].is_some());
        assert!(s.adx[26].is_none());
        assert!(s.adx[27].is_some());
    }

    #[test]
    fn adx_insufficient_data() {
        let s = adx(&rising_bars(20), 14);
        assert!(s.adx.iter().all(Option::is_none));
        assert!(s.plus_di[14].is_some());
    }

    #[test]
    fn adx_strong_uptrend() {
        // Every bar: up move 1, down move -1, TR 2 => +DI 50, -DI 0, DX 100.
        let s = adx(&rising_bars(60), 14);
        assert!((s.plus_di[59].unwrap() - 50.0).abs() < 1e-9);
        assert!(s.minus_di[59].unwrap().abs() < 1e-9);
        assert!((s.adx[59].unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn adx_downtrend_has_dominant_minus_di() {
        let bars: Vec<Bar> = (0..60)
            .map(|i| {
                let base = 200.0 - i as f64 * 2.0;
                bar(i, base + 0.5, base - 1.5, base - 1.0)
            })
            .collect();
        let s = adx(&bars, 14);
        assert!(s.minus_di[59].unwrap() > s.plus_di[59].unwrap());
        assert!(s.adx[59].unwrap() > 25.0);
    }

    #[test]
    fn zero_range_gives_zero_di() {
        let s = adx(&flat_bars(100.0, 40), 14);
        assert_eq!(s.plus_di[20], Some(0.0));
        assert_eq!(s.minus_di[20], Some(0.0));
        assert_eq!(s.adx[39], Some(0.0));
    }

    #[test]
    fn adx_result_range() {
        let bars: Vec<Bar> = (0..100)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                bar(i, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        for v in adx(&bars, 14).adx.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "ADX {v} out of [0,100] range");
        }
    }
}

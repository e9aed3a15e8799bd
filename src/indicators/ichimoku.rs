// =============================================================================
// Ichimoku Kinko Hyo
// =============================================================================
//
//   tenkan  = (HH_9  + LL_9)  / 2
//   kijun   = (HH_26 + LL_26) / 2
//   span A  = (tenkan + kijun) / 2      plotted `displacement` bars ahead
//   span B  = (HH_52 + LL_52) / 2       plotted `displacement` bars ahead
//   chikou  = close plotted `displacement` bars behind
//
// The leading spans are stored with length N + displacement so that the
// projected cloud past the last bar is kept: `span_a[i]` is the value that
// applies to bar i.  `chikou[i] = close[i + displacement]`.
// =============================================================================

use crate::market_data::Bar;

use super::{finite, Series};

#[derive(Debug, Clone)]
pub struct IchimokuSeries {
    pub tenkan: Series,
    pub kijun: Series,
    /// Length `N + displacement`.
    pub span_a: Series,
    /// Length `N + displacement`.
    pub span_b: Series,
    pub chikou: Series,
    pub displacement: usize,
}

impl IchimokuSeries {
    /// `(top, bottom)` of the cloud applying to bar `i`.
    pub fn cloud_at(&self, i: usize) -> Option<(f64, f64)> {
        let a = self.span_a.get(i).copied().flatten()?;
        let b = self.span_b.get(i).copied().flatten()?;
        Some((a.max(b), a.min(b)))
    }
}

/// Midpoint of the highest high and lowest low over the trailing `w` bars.
fn midpoint_channel(bars: &[Bar], w: usize) -> Series {
    let n = bars.len();
    let mut out = vec![None; n];
    if w == 0 || n < w {
        return out;
    }
    for i in (w - 1)..n {
        let window = &bars[i + 1 - w..=i];
        let hh = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let ll = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        out[i] = finite((hh + ll) / 2.0);
    }
    out
}

/// Ichimoku with the leading spans displaced by the kijun window.
pub fn ichimoku(bars: &[Bar], tenkan_w: usize, kijun_w: usize, senkou_w: usize) -> IchimokuSeries {
    let n = bars.len();
    let displacement = kijun_w;

    let tenkan = midpoint_channel(bars, tenkan_w);
    let kijun = midpoint_channel(bars, kijun_w);
    let span_b_basis = midpoint_channel(bars, senkou_w);

    let mut span_a = vec![None; n + displacement];
    let mut span_b = vec![None; n + displacement];
    for i in 0..n {
        span_a[i + displacement] = match (tenkan[i], kijun[i]) {
            (Some(t), Some(k)) => finite((t + k) / 2.0),
            _ => None,
        };
        span_b[i + displacement] = span_b_basis[i];
    }

    let chikou = (0..n)
        .map(|i| bars.get(i + displacement).map(|b| b.close))
        .collect();

    IchimokuSeries {
        tenkan,
        kijun,
        span_a,
        span_b,
        chikou,
        displacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::bar::test_support::{rising_bars, wavy_bars};

    #[test]
    fn lengths_and_warmup() {
        let ich = ichimoku(&rising_bars(100), 9, 26, 52);
        assert_eq!(ich.tenkan.len(), 100);
        assert_eq!(ich.kijun.len(), 100);
        assert_eq!(ich.span_a.len(), 126);
        assert_eq!(ich.span_b.len(), 126);
        assert_eq!(ich.chikou.len(), 100);

        assert!(ich.tenkan[7].is_none() && ich.tenkan[8].is_some());
        assert!(ich.kijun[24].is_none() && ich.kijun[25].is_some());
        // span A basis starts at 25, displaced by 26.
        assert!(ich.span_a[50].is_none() && ich.span_a[51].is_some());
        // span B basis starts at 51, displaced by 26.
        assert!(ich.span_b[76].is_none() && ich.span_b[77].is_some());
    }

    #[test]
    fn rising_values() {
        // close_i = 100 + i, high = close + 1, low = close - 1.
        let ich = ichimoku(&rising_bars(100), 9, 26, 52);
        // tenkan at 20: HH = 121, LL = 111 => 116
        assert!((ich.tenkan[20].unwrap() - 116.0).abs() < 1e-10);
        // kijun at 30: HH = 131, LL = 104 => 117.5
        assert!((ich.kijun[30].unwrap() - 117.5).abs() < 1e-10);
        let a_basis = (ich.tenkan[30].unwrap() + ich.kijun[30].unwrap()) / 2.0;
        assert!((ich.span_a[56].unwrap() - a_basis).abs() < 1e-10);
    }

    #[test]
    fn chikou_is_future_close() {
        let bars = wavy_bars(60);
        let ich = ichimoku(&bars, 9, 26, 52);
        assert_eq!(ich.chikou[0], Some(bars[26].close));
        assert_eq!(ich.chikou[33], Some(bars[59].close));
        assert_eq!(ich.chikou[34], None);
    }

    #[test]
    fn cloud_orders_top_and_bottom() {
        let ich = ichimoku(&wavy_bars(150), 9, 26, 52);
        for i in 0..ich.span_a.len() {
            if let Some((top, bottom)) = ich.cloud_at(i) {
                assert!(top >= bottom);
            }
        }
        assert!(ich.cloud_at(149).is_some());
        assert!(ich.cloud_at(10).is_none());
        assert!(ich.cloud_at(10_000).is_none());
    }
}

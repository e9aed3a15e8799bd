// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), with σ the population standard deviation over
// the same window.  The Band Width is the normalised distance:
//   width% = (upper - lower) / middle * 100

use super::{finite, Series};

#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
    /// `None` when the middle band is zero.
    pub width_pct: Series,
}

/// Bollinger Bands over `w` closes with `k` standard deviations.
///
/// A negative `k` is treated as its magnitude, so `upper >= middle >= lower`
/// always holds.
pub fn bollinger(closes: &[f64], w: usize, k: f64) -> BollingerSeries {
    let n = closes.len();
    let mut bands = BollingerSeries {
        upper: vec![None; n],
        middle: vec![None; n],
        lower: vec![None; n],
        width_pct: vec![None; n],
    };
    if w == 0 || n < w {
        return bands;
    }
    let k = k.abs();

    for i in (w - 1)..n {
        let window = &closes[i + 1 - w..=i];
        let middle = window.iter().sum::<f64>() / w as f64;
        let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / w as f64;
        let std_dev = variance.sqrt();

        let (Some(mid), Some(sd)) = (finite(middle), finite(std_dev)) else {
            continue;
        };
        let upper = mid + k * sd;
        let lower = mid - k * sd;

        bands.middle[i] = Some(mid);
        bands.upper[i] = finite(upper);
        bands.lower[i] = finite(lower);
        bands.width_pct[i] = if mid == 0.0 {
            None
        } else {
            finite((upper - lower) / mid * 100.0)
        };
    }

    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = bollinger(&closes, 20, 2.0);
        let (u, m, l) = (bb.upper[19].unwrap(), bb.middle[19].unwrap(), bb.lower[19].unwrap());
        assert!((m - 10.5).abs() < 1e-10);
        assert!(u > m && m > l);
        // population σ of 1..=20 = sqrt(33.25)
        assert!((u - m - 2.0 * 33.25_f64.sqrt()).abs() < 1e-10);
        assert!(bb.width_pct[19].unwrap() > 0.0);
        assert!(bb.middle[18].is_none());
    }

    #[test]
    fn bollinger_insufficient_data() {
        let bb = bollinger(&[1.0, 2.0, 3.0], 20, 2.0);
        assert_eq!(bb.middle.len(), 3);
        assert!(bb.middle.iter().all(Option::is_none));
    }

    #[test]
    fn bollinger_flat() {
        let bb = bollinger(&[100.0; 20], 20, 2.0);
        assert!(bb.width_pct[19].unwrap().abs() < 1e-10);
        assert!((bb.upper[19].unwrap() - bb.lower[19].unwrap()).abs() < 1e-10);
    }

    #[test]
    fn band_ordering_holds_for_negative_k() {
        let closes: Vec<f64> = (0..40).map(|i| 10.0 + (i as f64).sin()).collect();
        let bb = bollinger(&closes, 20, -2.0);
        for i in 19..40 {
            let (u, m, l) = (bb.upper[i].unwrap(), bb.middle[i].unwrap(), bb.lower[i].unwrap());
            assert!(u >= m && m >= l);
        }
    }
}

// =============================================================================
// SuperTrend - ATR band trailing stop with direction
// =============================================================================
//
// basic_upper = hl2 + m * ATR
// basic_lower = hl2 - m * ATR
//
// Final bands ratchet toward price and only loosen when price closes through
// them on the previous bar:
//   final_upper = basic_upper if basic_upper < prev_upper or prev_close > prev_upper
//   final_lower = basic_lower if basic_lower > prev_lower or prev_close < prev_lower
//
// Direction flips up → down only when close < final_lower, and down → up only
// when close > final_upper.  The reported value is the lower band in an
// uptrend and the upper band in a downtrend.
//
// The computation is an explicit fold over `BandState`, started at the first
// bar with a defined ATR: initial bands are the basic bands and the initial
// direction is up when close >= hl2.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::Bar;

use super::atr::atr;
use super::{finite, Series};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

/// SuperTrend output for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuperTrendPoint {
    pub value: f64,
    pub upper: f64,
    pub lower: f64,
    pub direction: TrendDirection,
    /// Direction differs from the previous bar's.
    pub flipped: bool,
}

#[derive(Debug, Clone)]
pub struct SuperTrendSeries {
    pub points: Vec<Option<SuperTrendPoint>>,
    /// ATR used to build the bands (same window).
    pub atr: Series,
}

impl SuperTrendSeries {
    pub fn latest(&self) -> Option<SuperTrendPoint> {
        self.points.last().copied().flatten()
    }
}

/// Carried between bars.
#[derive(Debug, Clone, Copy)]
struct BandState {
    upper: f64,
    lower: f64,
    direction: TrendDirection,
    close: f64,
}

impl BandState {
    fn start(bar: &Bar, atr: f64, multiplier: f64) -> Self {
        let hl2 = bar.hl2();
        let direction = if bar.close >= hl2 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        };
        Self {
            upper: hl2 + multiplier * atr,
            lower: hl2 - multiplier * atr,
            direction,
            close: bar.close,
        }
    }

    fn step(self, bar: &Bar, atr: f64, multiplier: f64) -> Self {
        let hl2 = bar.hl2();
        let basic_upper = hl2 + multiplier * atr;
        let basic_lower = hl2 - multiplier * atr;

        let upper = if basic_upper < self.upper || self.close > self.upper {
            basic_upper
        } else {
            self.upper
        };
        let lower = if basic_lower > self.lower || self.close < self.lower {
            basic_lower
        } else {
            self.lower
        };

        let direction = match self.direction {
            TrendDirection::Up if bar.close < lower => TrendDirection::Down,
            TrendDirection::Down if bar.close > upper => TrendDirection::Up,
            unchanged => unchanged,
        };

        Self {
            upper,
            lower,
            direction,
            close: bar.close,
        }
    }

    fn point(&self, flipped: bool) -> Option<SuperTrendPoint> {
        let value = match self.direction {
            TrendDirection::Up => self.lower,
            TrendDirection::Down => self.upper,
        };
        Some(SuperTrendPoint {
            value: finite(value)?,
            upper: finite(self.upper)?,
            lower: finite(self.lower)?,
            direction: self.direction,
            flipped,
        })
    }
}

pub fn supertrend(bars: &[Bar], w: usize, multiplier: f64) -> SuperTrendSeries {
    let atr_series = atr(bars, w);
    let mut state: Option<BandState> = None;

    let points = bars
        .iter()
        .zip(&atr_series)
        .map(|(bar, atr)| {
            let atr = (*atr)?;
            let (next, flipped) = match state {
                None => (BandState::start(bar, atr, multiplier), false),
                Some(prev) => {
                    let next = prev.step(bar, atr, multiplier);
                    (next, next.direction != prev.direction)
                }
            };
            state = Some(next);
            next.point(flipped)
        })
        .collect();

    SuperTrendSeries {
        points,
        atr: atr_series,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::bar::test_support::{bars_from_closes, rising_bars, wavy_bars};

    #[test]
    fn undefined_until_atr() {
        let st = supertrend(&rising_bars(15), 10, 3.0);
        assert_eq!(st.points.len(), 15);
        assert!(st.points[8].is_none());
        assert!(st.points[9].is_some());
        assert!(!st.points[9].unwrap().flipped);
    }

    #[test]
    fn rising_series_stays_up() {
        let st = supertrend(&rising_bars(60), 10, 3.0);
        for p in st.points.iter().flatten() {
            assert_eq!(p.direction, TrendDirection::Up);
            assert!(!p.flipped);
            assert!((p.value - p.lower).abs() < 1e-12);
        }
    }

    #[test]
    fn lower_band_ratchets_up_in_uptrend() {
        let st = supertrend(&rising_bars(60), 10, 3.0);
        let lowers: Vec<f64> = st.points.iter().flatten().map(|p| p.lower).collect();
        assert!(lowers.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn crash_flips_down() {
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        closes.extend([100.0, 90.0, 80.0]);
        let st = supertrend(&bars_from_closes(&closes), 10, 3.0);
        let flips: Vec<&SuperTrendPoint> =
            st.points.iter().flatten().filter(|p| p.flipped).collect();
        assert_eq!(flips.len(), 1);
        assert_eq!(flips[0].direction, TrendDirection::Down);
        assert_eq!(st.latest().unwrap().direction, TrendDirection::Down);
    }

    #[test]
    fn flip_flag_matches_direction_changes() {
        let bars = wavy_bars(200);
        let st = supertrend(&bars, 10, 3.0);
        let mut prev: Option<TrendDirection> = None;
        for (bar, p) in bars.iter().zip(&st.points) {
            let Some(p) = p else { continue };
            if let Some(d) = prev {
                assert_eq!(p.flipped, p.direction != d);
            }
            match p.direction {
                TrendDirection::Up => assert!(bar.close >= p.lower),
                TrendDirection::Down => assert!(bar.close <= p.upper),
            }
            prev = Some(p.direction);
        }
    }

    #[test]
    fn deterministic() {
        let bars = wavy_bars(120);
        let a = supertrend(&bars, 10, 3.0);
        let b = supertrend(&bars, 10, 3.0);
        assert_eq!(a.points, b.points);
    }
}

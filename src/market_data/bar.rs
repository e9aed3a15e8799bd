// =============================================================================
// OHLCV bars and series normalisation
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Market;

/// A single OHLCV bar for one trading period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Midpoint of the bar's range, `(high + low) / 2`.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    fn is_usable(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
            && self.close > 0.0
    }
}

/// Display metadata for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub code: String,
    pub name: String,
    pub market: Market,
}

impl StockInfo {
    /// Metadata for a symbol whose display name is unknown.
    pub fn from_symbol(symbol: &str) -> Self {
        Self {
            code: symbol.to_string(),
            name: symbol.to_string(),
            market: Market::detect(symbol),
        }
    }
}

/// Bring raw provider rows into canonical form:
/// - rows with non-finite values or a non-positive close are dropped
/// - rows are sorted by date
/// - duplicate dates keep the last row seen
pub fn normalize(mut bars: Vec<Bar>) -> Vec<Bar> {
    let raw_len = bars.len();
    bars.retain(Bar::is_usable);
    // Stable sort keeps provider order among equal dates, so "last wins" holds.
    bars.sort_by_key(|b| b.date);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }

    if out.len() != raw_len {
        debug!(raw = raw_len, kept = out.len(), "normalised bar series");
    }
    out
}

/// Extract closing prices in bar order.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    /// Bars with the given closes; high/low one point either side.
    pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(day(i as i64), c - 0.5, c + 1.0, c - 1.0, c, 1_000.0))
            .collect()
    }

    /// Bars where open = high = low = close.
    pub fn flat_bars(price: f64, n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::new(day(i as i64), price, price, price, price, 1_000.0))
            .collect()
    }

    /// Closes 100, 101, ... over `n` bars.
    pub fn rising_bars(n: usize) -> Vec<Bar> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        bars_from_closes(&closes)
    }

    /// Deterministic oscillating series (no RNG needed).
    pub fn wavy_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                let c = 100.0 + (x * 0.35).sin() * 8.0 + (x * 0.11).cos() * 3.0;
                let spread = 1.0 + (x * 0.7).sin().abs() * 2.0;
                Bar::new(day(i as i64), c - 0.3, c + spread, c - spread, c, 500.0 + x)
            })
            .collect()
    }
}

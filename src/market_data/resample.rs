// =============================================================================
// Resampling - daily bars into weekly / monthly bars
// =============================================================================
//
// Used for providers that only serve daily history.  Weeks end on Friday
// (a Saturday or Sunday bar belongs to the following Friday's week) and are
// labelled by that Friday; months are labelled by their last calendar day.
//
// Aggregation: open = first, high = max, low = min, close = last,
// volume = sum.  Periods with no bars produce no output.
// =============================================================================

use chrono::{Datelike, Duration, NaiveDate};

use crate::market_data::bar::Bar;
use crate::types::Period;

/// Resample a normalised daily series to the requested period.
///
/// `Period::Daily` returns the input unchanged.
pub fn resample(bars: Vec<Bar>, period: Period) -> Vec<Bar> {
    match period {
        Period::Daily => bars,
        Period::Weekly => aggregate(bars, week_ending_friday),
        Period::Monthly => aggregate(bars, month_end),
    }
}

/// Friday that closes the week containing `date`.
fn week_ending_friday(date: NaiveDate) -> NaiveDate {
    let weekday = i64::from(date.weekday().num_days_from_monday());
    let days_to_friday = (4 - weekday).rem_euclid(7);
    date + Duration::days(days_to_friday)
}

/// Last calendar day of the month containing `date`.
fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

fn aggregate(bars: Vec<Bar>, label: fn(NaiveDate) -> NaiveDate) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    let mut current: Option<(NaiveDate, Bar)> = None;

    for bar in bars {
        let key = label(bar.date);
        match current.as_mut() {
            Some((k, acc)) if *k == key => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume += bar.volume;
            }
            _ => {
                if let Some((k, mut acc)) = current.take() {
                    acc.date = k;
                    out.push(acc);
                }
                current = Some((key, bar));
            }
        }
    }
    if let Some((k, mut acc)) = current {
        acc.date = k;
        out.push(acc);
    }
    out
}

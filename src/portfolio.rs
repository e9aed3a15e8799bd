// =============================================================================
// Portfolio risk metrics - stateless analysis of a set of holdings
// =============================================================================
//
// Given each holding's share count and daily bars, simulate the historical
// value of the portfolio with today's share counts held constant:
//
//   1. Align closes on the union of dates, forward-filling gaps, then drop the
//      leading dates on which some holding has no price yet.
//   2. value_t = Σ close_i,t × shares_i
//   3. r_t = value_t / value_{t-1} - 1
//
// Metrics (252 trading days per year, risk-free rate 3%):
//   total return       value_last / value_first - 1
//   annualised return  (1 + total)^(252 / n_returns) - 1
//   volatility         sample std-dev of r × √252
//   Sharpe             (annualised - rf) / volatility   (0 for constant returns)
//   max drawdown       min_t (value_t - running_max_t) / running_max_t
//
// plus the Pearson correlation matrix of the individual holdings' returns.
//
// Valuation overview, from each holding's latest two closes:
//   market value   price × shares
//   unrealized P/L market value - cost_basis × shares
//   day P/L        (price - previous close) × shares
// Totals are reported in USD; A-share amounts convert at `CNY_PER_USD`.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::indicators::finite;
use crate::market_data::Bar;
use crate::types::{Currency, Market};

pub const TRADING_DAYS: f64 = 252.0;
pub const RISK_FREE_RATE: f64 = 0.03;

/// Returns needed before any metric is meaningful.
const MIN_RETURNS: usize = 10;

/// Below this the return series is treated as constant.
const VOLATILITY_EPSILON: f64 = 1e-12;

/// Fixed conversion rate for the USD totals.
pub const CNY_PER_USD: f64 = 7.1;

/// One line of the caller's portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub shares: f64,
    /// Average cost per share, in the holding's own currency.
    #[serde(default)]
    pub cost_basis: Option<f64>,
}

/// A holding together with its fetched daily bars.
#[derive(Debug, Clone)]
pub struct PricedHolding {
    pub symbol: String,
    pub shares: f64,
    pub cost_basis: Option<f64>,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub total_return_pct: f64,
    pub annual_return_pct: f64,
    pub volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Pairwise return correlations; `None` where a holding's returns are constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub matrix: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSummary {
    pub symbol: String,
    pub shares: f64,
    pub latest_price: f64,
    pub market_value: f64,
    pub weight_pct: f64,
}

/// Current value and P/L of one holding, in its own currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub symbol: String,
    pub currency: Currency,
    pub shares: f64,
    pub cost_basis: Option<f64>,
    pub current_price: f64,
    pub market_value: f64,
    /// `None` without a cost basis.
    pub unrealized_pl: Option<f64>,
    pub unrealized_pl_pct: Option<f64>,
    pub day_change_pct: f64,
    pub day_pl: f64,
}

/// Portfolio totals in USD.  Cost and P/L cover only holdings with a cost basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub total_market_value: f64,
    pub total_cost: f64,
    pub total_pl: f64,
    pub total_pl_pct: f64,
    pub day_pl: f64,
    pub currency: Currency,
    pub exchange_rate: f64,
    pub holdings: Vec<HoldingValuation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub overview: PortfolioOverview,
    pub metrics: PortfolioMetrics,
    pub value_curve: Vec<ValuePoint>,
    pub correlation: CorrelationMatrix,
    pub holdings: Vec<HoldingSummary>,
    /// Number of daily returns the metrics were computed from.
    pub period_days: usize,
}

/// Reject empty portfolios and non-positive share counts.
pub fn validate_holdings(holdings: &[Holding]) -> Result<()> {
    if holdings.is_empty() {
        return Err(AppError::InvalidRequest("portfolio is empty".into()));
    }
    for h in holdings {
        if h.symbol.trim().is_empty() {
            return Err(AppError::InvalidRequest("holding symbol must not be empty".into()));
        }
        if !h.shares.is_finite() || h.shares <= 0.0 {
            return Err(AppError::InvalidRequest(format!(
                "shares for {} must be a positive number",
                h.symbol
            )));
        }
        if let Some(cost) = h.cost_basis {
            if !cost.is_finite() || cost < 0.0 {
                return Err(AppError::InvalidRequest(format!(
                    "cost_basis for {} must be a non-negative number",
                    h.symbol
                )));
            }
        }
    }
    Ok(())
}

pub fn analyze(holdings: &[PricedHolding]) -> Result<PortfolioReport> {
    let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
    let (dates, prices) = align_closes(holdings);

    let value_curve: Vec<ValuePoint> = dates
        .iter()
        .zip(&prices)
        .map(|(&date, row)| ValuePoint {
            date,
            value: row.iter().zip(holdings).map(|(p, h)| p * h.shares).sum(),
        })
        .collect();
    let values: Vec<f64> = value_curve.iter().map(|p| p.value).collect();
    let returns = pct_change(&values);

    if returns.len() < MIN_RETURNS {
        return Err(AppError::InsufficientData {
            symbol: symbols.join(","),
        });
    }

    let total_return = values[values.len() - 1] / values[0] - 1.0;
    let years = returns.len() as f64 / TRADING_DAYS;
    let annual_return = (1.0 + total_return).powf(1.0 / years) - 1.0;
    let volatility = sample_std(&returns) * TRADING_DAYS.sqrt();
    let sharpe = if volatility > VOLATILITY_EPSILON {
        (annual_return - RISK_FREE_RATE) / volatility
    } else {
        0.0
    };

    let metrics = PortfolioMetrics {
        total_return_pct: finite(total_return * 100.0).unwrap_or(0.0),
        annual_return_pct: finite(annual_return * 100.0).unwrap_or(0.0),
        volatility_pct: finite(volatility * 100.0).unwrap_or(0.0),
        sharpe_ratio: finite(sharpe).unwrap_or(0.0),
        max_drawdown_pct: max_drawdown(&values) * 100.0,
    };

    let asset_returns: Vec<Vec<f64>> = (0..holdings.len())
        .map(|j| pct_change(&prices.iter().map(|row| row[j]).collect::<Vec<_>>()))
        .collect();
    let matrix = asset_returns
        .iter()
        .map(|a| asset_returns.iter().map(|b| correlation(a, b)).collect())
        .collect();

    let last_row = &prices[prices.len() - 1];
    let total_value = values[values.len() - 1];
    let summaries = holdings
        .iter()
        .zip(last_row)
        .map(|(h, &price)| {
            let market_value = price * h.shares;
            HoldingSummary {
                symbol: h.symbol.clone(),
                shares: h.shares,
                latest_price: price,
                market_value,
                weight_pct: finite(market_value / total_value * 100.0).unwrap_or(0.0),
            }
        })
        .collect();

    debug!(
        holdings = holdings.len(),
        days = returns.len(),
        total_return_pct = format!("{:.2}", metrics.total_return_pct),
        sharpe = format!("{:.2}", metrics.sharpe_ratio),
        "portfolio analysed"
    );

    Ok(PortfolioReport {
        overview: valuation(holdings),
        metrics,
        value_curve,
        correlation: CorrelationMatrix { symbols, matrix },
        holdings: summaries,
        period_days: returns.len(),
    })
}

/// Value every holding at its latest close and total the book in USD.
pub fn valuation(holdings: &[PricedHolding]) -> PortfolioOverview {
    let to_usd = |currency: Currency, amount: f64| match currency {
        Currency::Usd => amount,
        Currency::Cny => amount / CNY_PER_USD,
    };

    let mut total_market_value = 0.0;
    let mut total_cost = 0.0;
    let mut total_pl = 0.0;
    let mut day_pl = 0.0;
    let mut valued = Vec::with_capacity(holdings.len());

    for h in holdings {
        let currency = Market::detect(&h.symbol).currency();
        let latest = h.bars.last().map(|b| b.close).unwrap_or(0.0);
        let prev = h
            .bars
            .len()
            .checked_sub(2)
            .and_then(|i| h.bars.get(i))
            .map(|b| b.close)
            .unwrap_or(latest);

        let market_value = latest * h.shares;
        let holding_day_pl = (latest - prev) * h.shares;
        let day_change_pct = if prev > 0.0 {
            (latest / prev - 1.0) * 100.0
        } else {
            0.0
        };

        let cost_value = h.cost_basis.map(|c| c * h.shares);
        let unrealized_pl = cost_value.map(|cost| market_value - cost);
        let unrealized_pl_pct = cost_value
            .zip(unrealized_pl)
            .map(|(cost, pl)| if cost > 0.0 { pl / cost * 100.0 } else { 0.0 });

        total_market_value += to_usd(currency, market_value);
        day_pl += to_usd(currency, holding_day_pl);
        if let (Some(cost), Some(pl)) = (cost_value, unrealized_pl) {
            total_cost += to_usd(currency, cost);
            total_pl += to_usd(currency, pl);
        }

        valued.push(HoldingValuation {
            symbol: h.symbol.clone(),
            currency,
            shares: h.shares,
            cost_basis: h.cost_basis,
            current_price: latest,
            market_value,
            unrealized_pl,
            unrealized_pl_pct,
            day_change_pct,
            day_pl: holding_day_pl,
        });
    }

    PortfolioOverview {
        total_market_value,
        total_cost,
        total_pl,
        total_pl_pct: if total_cost > 0.0 {
            total_pl / total_cost * 100.0
        } else {
            0.0
        },
        day_pl,
        currency: Currency::Usd,
        exchange_rate: CNY_PER_USD,
        holdings: valued,
    }
}

/// Union of dates with forward fill; rows where any holding is still
/// unpriced are dropped.  Each returned row has one price per holding.
fn align_closes(holdings: &[PricedHolding]) -> (Vec<NaiveDate>, Vec<Vec<f64>>) {
    let by_date: Vec<BTreeMap<NaiveDate, f64>> = holdings
        .iter()
        .map(|h| h.bars.iter().map(|b| (b.date, b.close)).collect())
        .collect();
    let all_dates: BTreeSet<NaiveDate> = by_date.iter().flat_map(|m| m.keys().copied()).collect();

    let mut last: Vec<Option<f64>> = vec![None; holdings.len()];
    let mut dates = Vec::new();
    let mut rows = Vec::new();
    for date in all_dates {
        for (slot, series) in last.iter_mut().zip(&by_date) {
            if let Some(&close) = series.get(&date) {
                *slot = Some(close);
            }
        }
        let row: Option<Vec<f64>> = last.iter().copied().collect();
        if let Some(row) = row {
            dates.push(date);
            rows.push(row);
        }
    }
    (dates, rows)
}

fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Most negative drawdown as a fraction (<= 0).
fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst: f64 = 0.0;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min((v - peak) / peak);
        }
    }
    worst
}

fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va <= 0.0 || vb <= 0.0 {
        return None;
    }
    finite(cov / (va.sqrt() * vb.sqrt())).map(|c| c.clamp(-1.0, 1.0))
}

// =============================================================================
// Yahoo Finance chart client - US-stock daily bars
// =============================================================================
//
// GET {base}/v8/finance/chart/{SYMBOL}?period1=..&period2=..&interval=1d
//
// Only daily bars are requested.  Weekly and monthly series are produced by
// `resample` so that week/month boundaries follow our own calendar rules
// rather than Yahoo's (which labels weeks by their Monday).
// Timestamps are shifted by the exchange `gmtoffset` before taking the date.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{AppError, Result, UnavailableReason};
use crate::market_data::bar::{normalize, Bar, StockInfo};
use crate::market_data::resample::resample;
use crate::market_data::source::{
    classify_status, classify_transport, BarQuery, FetchedSeries, MarketDataSource, USER_AGENT,
};
use crate::runtime_config::FetchConfig;
use crate::types::Market;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    gmtoffset: i64,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Yahoo uses hyphens for share classes (`BRK-B`, not `BRK.B`).
fn normalize_yahoo_symbol(symbol: &str) -> String {
    symbol.to_uppercase().replace('.', "-")
}

/// Yahoo Finance client for US listings.
#[derive(Clone)]
pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl YahooSource {
    pub fn new(fetch: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build Yahoo HTTP client")?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: fetch.timeout_secs,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn chart_url(&self, query: &BarQuery) -> String {
        let period1 = query.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive; extend to the end of the requested day.
        let period2 = (query.end + chrono::Duration::days(1))
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&includePrePost=false",
            self.base_url,
            normalize_yahoo_symbol(&query.symbol),
            period1,
            period2,
        )
    }
}

#[async_trait]
impl MarketDataSource for YahooSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    #[instrument(skip(self), name = "yahoo::fetch_bars")]
    async fn fetch_bars(&self, query: &BarQuery) -> Result<FetchedSeries> {
        let url = self.chart_url(query);
        debug!(%url, "fetching Yahoo chart");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport(&query.symbol, e, self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(&query.symbol, status, self.name()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| classify_transport(&query.symbol, e, self.timeout_secs))?;

        let mut series = parse_chart_response(&query.symbol, &body)?;
        // Resampling assumes sorted, deduplicated input.
        series.bars = resample(normalize(series.bars), query.period);
        debug!(symbol = %query.symbol, count = series.bars.len(), "chart fetched");
        Ok(series)
    }
}

fn parse_chart_response(symbol: &str, body: &str) -> Result<FetchedSeries> {
    let parsed: ChartResponse = serde_json::from_str(body).map_err(|e| {
        AppError::unavailable(
            symbol,
            UnavailableReason::Rejected(format!("unparseable chart payload: {e}")),
        )
    })?;

    if let Some(err) = parsed.chart.error {
        let reason = if err.code.eq_ignore_ascii_case("not found") {
            UnavailableReason::NotFound
        } else {
            UnavailableReason::Rejected(format!("{}: {}", err.code, err.description))
        };
        return Err(AppError::unavailable(symbol, reason));
    }

    let result = parsed
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AppError::unavailable(symbol, UnavailableReason::NotFound))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let offset = result.meta.gmtoffset;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) else {
            continue;
        };
        let Some(date) = local_date(ts, offset) else {
            continue;
        };
        let volume = field(&quote.volume).unwrap_or(0.0);
        bars.push(Bar::new(date, open, high, low, close, volume));
    }

    let name = result
        .meta
        .long_name
        .or(result.meta.short_name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| result.meta.symbol.clone());

    Ok(FetchedSeries {
        info: StockInfo {
            code: symbol.to_string(),
            name,
            market: Market::UsStock,
        },
        bars,
    })
}

fn local_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

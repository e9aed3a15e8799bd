// =============================================================================
// Eastmoney kline client - China A-share daily / weekly / monthly bars
// =============================================================================
//
// Public endpoint, no signing:
//   GET {base}/api/qt/stock/kline/get?secid=1.600519&klt=101&fqt=1&beg=..&end=..
//
// `secid` prefixes the six-digit code with the exchange: 1 = Shanghai
// (codes starting 6 or 9), 0 = Shenzhen / Beijing.  `klt` selects the period
// natively (101 daily, 102 weekly, 103 monthly) so no local resampling is
// needed.  Each kline row is a comma-separated string:
//   [0] date, [1] open, [2] close, [3] high, [4] low, [5] volume, [6] amount, ...
// An unknown code comes back as HTTP 200 with `"data": null`.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{AppError, Result, UnavailableReason};
use crate::market_data::bar::{Bar, StockInfo};
use crate::market_data::source::{
    classify_status, classify_transport, BarQuery, FetchedSeries, MarketDataSource, USER_AGENT,
};
use crate::runtime_config::{FetchConfig, PriceAdjust};
use crate::types::{Market, Period};

const DEFAULT_BASE_URL: &str = "https://push2his.eastmoney.com";

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    klines: Vec<String>,
}

/// Eastmoney REST client for A-share history.
#[derive(Clone)]
pub struct EastmoneySource {
    client: reqwest::Client,
    base_url: String,
    adjust: PriceAdjust,
    timeout_secs: u64,
}

impl EastmoneySource {
    pub fn new(fetch: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build Eastmoney HTTP client")?;

        debug!(base_url = DEFAULT_BASE_URL, "EastmoneySource initialised");

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            adjust: fetch.adjust,
            timeout_secs: fetch.timeout_secs,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn kline_url(&self, query: &BarQuery) -> String {
        format!(
            "{}/api/qt/stock/kline/get?secid={}&fields1=f1,f2,f3,f4,f5,f6\
             &fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61\
             &klt={}&fqt={}&beg={}&end={}",
            self.base_url,
            secid(&query.symbol),
            period_code(query.period),
            adjust_code(self.adjust),
            query.start.format("%Y%m%d"),
            query.end.format("%Y%m%d"),
        )
    }
}

#[async_trait]
impl MarketDataSource for EastmoneySource {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    #[instrument(skip(self), name = "eastmoney::fetch_bars")]
    async fn fetch_bars(&self, query: &BarQuery) -> Result<FetchedSeries> {
        let url = self.kline_url(query);

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

        let series = parse_kline_response(&query.symbol, &body)?;
        debug!(symbol = %query.symbol, count = series.bars.len(), "klines fetched");
        Ok(series)
    }
}

/// Exchange-qualified security id, e.g. `1.600519` or `0.000001`.
fn secid(code: &str) -> String {
    let exchange = match code.chars().next() {
        Some('6') | Some('9') => 1,
        _ => 0,
    };
    format!("{exchange}.{code}")
}

fn period_code(period: Period) -> u32 {
    match period {
        Period::Daily => 101,
        Period::Weekly => 102,
        Period::Monthly => 103,
    }
}

fn adjust_code(adjust: PriceAdjust) -> u32 {
    match adjust {
        PriceAdjust::None => 0,
        PriceAdjust::Forward => 1,
        PriceAdjust::Backward => 2,
    }
}

fn parse_kline_response(symbol: &str, body: &str) -> Result<FetchedSeries> {
    let parsed: KlineResponse = serde_json::from_str(body).map_err(|e| {
        AppError::unavailable(
            symbol,
            UnavailableReason::Rejected(format!("unparseable kline payload: {e}")),
        )
    })?;

    let data = parsed
        .data
        .ok_or_else(|| AppError::unavailable(symbol, UnavailableReason::NotFound))?;

    let mut bars = Vec::with_capacity(data.klines.len());
    for row in &data.klines {
        match parse_kline_row(row) {
            Some(bar) => bars.push(bar),
            None => warn!(symbol, row = %row, "skipping malformed kline row"),
        }
    }

    let name = if data.name.trim().is_empty() {
        data.code.clone()
    } else {
        data.name
    };

    Ok(FetchedSeries {
        info: StockInfo {
            code: data.code,
            name,
            market: Market::AShare,
        },
        bars,
    })
}

fn parse_kline_row(row: &str) -> Option<Bar> {
    let fields: Vec<&str> = row.split(',').collect();
    if fields.len() < 6 {
        return None;
    }
    let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d").ok()?;
    let num = |i: usize| fields[i].trim().parse::<f64>().ok();
    Some(Bar::new(date, num(1)?, num(3)?, num(4)?, num(2)?, num(5)?))
}

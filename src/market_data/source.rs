// =============================================================================
// Market-data source seam - trait, market router, bounded retry
// =============================================================================
//
// Every provider implements `MarketDataSource`.  The `MarketRouter` picks the
// provider from the symbol shape (all digits → A-share, otherwise US), and
// `fetch_with_retry` adds the fetch timeout, the single retry on transient
// failures and normalisation of whatever rows the provider returned.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{AppError, Result, UnavailableReason};
use crate::market_data::bar::{normalize, Bar, StockInfo};
use crate::runtime_config::{FetchConfig, MAX_FETCH_RETRIES};
use crate::types::{Market, Period};

/// Browser-like user agent; both providers reject the reqwest default.
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// A resolved request for one symbol's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarQuery {
    pub symbol: String,
    pub period: Period,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BarQuery {
    /// Resolve an incoming request into a concrete date range.
    ///
    /// Missing bounds default to today and `end - lookback_days`.
    pub fn resolve(
        symbol: &str,
        period: Period,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        fetch: &FetchConfig,
    ) -> Result<Self> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AppError::InvalidRequest("symbol must not be empty".into()));
        }

        let end = end.unwrap_or_else(|| Utc::now().date_naive());
        let lookback = chrono::Duration::days(fetch.lookback_days.for_period(period).max(1));
        let start = start.unwrap_or(end - lookback);
        if start > end {
            return Err(AppError::InvalidRequest(format!(
                "start date {start} is after end date {end}"
            )));
        }

        Ok(Self {
            symbol,
            period,
            start,
            end,
        })
    }

    pub fn market(&self) -> Market {
        Market::detect(&self.symbol)
    }
}

/// Bars plus display metadata, as returned by a provider.
#[derive(Debug, Clone)]
pub struct FetchedSeries {
    pub info: StockInfo,
    pub bars: Vec<Bar>,
}

/// A provider of historical OHLCV bars.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch bars for `query`.  Rows may arrive unsorted or duplicated;
    /// callers normalise.
    async fn fetch_bars(&self, query: &BarQuery) -> Result<FetchedSeries>;
}

/// Dispatches each query to the provider for its market.
pub struct MarketRouter {
    a_share: Arc<dyn MarketDataSource>,
    us_stock: Arc<dyn MarketDataSource>,
}

impl MarketRouter {
    pub fn new(a_share: Arc<dyn MarketDataSource>, us_stock: Arc<dyn MarketDataSource>) -> Self {
        Self { a_share, us_stock }
    }

    fn source_for(&self, market: Market) -> &Arc<dyn MarketDataSource> {
        match market {
            Market::AShare => &self.a_share,
            Market::UsStock => &self.us_stock,
        }
    }
}

#[async_trait]
impl MarketDataSource for MarketRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    async fn fetch_bars(&self, query: &BarQuery) -> Result<FetchedSeries> {
        let source = self.source_for(query.market());
        debug!(symbol = %query.symbol, provider = source.name(), "routing fetch");
        source.fetch_bars(query).await
    }
}

/// Fetch with the configured timeout and retry limit, then normalise.
///
/// Only transient failures (timeout, connection error, 5xx) are retried, and
/// never more than `MAX_FETCH_RETRIES` times.
/// An empty series after normalisation is `InsufficientData`.
#[instrument(skip(source, fetch), fields(symbol = %query.symbol, period = %query.period))]
pub async fn fetch_with_retry(
    source: &dyn MarketDataSource,
    query: &BarQuery,
    fetch: &FetchConfig,
) -> Result<FetchedSeries> {
    let timeout = Duration::from_secs(fetch.timeout_secs);
    let max_retries = fetch.max_retries.min(MAX_FETCH_RETRIES);
    let mut attempt: u32 = 0;

    let mut series = loop {
        let outcome = match tokio::time::timeout(timeout, source.fetch_bars(query)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::unavailable(
                &query.symbol,
                UnavailableReason::Timeout {
                    secs: fetch.timeout_secs,
                },
            )),
        };

        match outcome {
            Ok(series) => break series,
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(error = %e, attempt, "transient fetch failure, retrying");
            }
            Err(e) => return Err(e),
        }
    };

    series.bars = normalize(series.bars);
    if series.bars.is_empty() {
        return Err(AppError::InsufficientData {
            symbol: query.symbol.clone(),
        });
    }

    debug!(bars = series.bars.len(), attempts = attempt + 1, "fetch complete");
    Ok(series)
}

// =============================================================================
// HTTP error classification shared by the providers
// =============================================================================

pub(crate) fn classify_status(symbol: &str, status: StatusCode, provider: &str) -> AppError {
    let reason = if status == StatusCode::TOO_MANY_REQUESTS {
        UnavailableReason::RateLimited
    } else if status == StatusCode::NOT_FOUND {
        UnavailableReason::NotFound
    } else if status.is_server_error() {
        UnavailableReason::Upstream(format!("{provider} returned {status}"))
    } else {
        UnavailableReason::Rejected(format!("{provider} returned {status}"))
    };
    AppError::unavailable(symbol, reason)
}

pub(crate) fn classify_transport(symbol: &str, err: reqwest::Error, timeout_secs: u64) -> AppError {
    let reason = if err.is_timeout() {
        UnavailableReason::Timeout { secs: timeout_secs }
    } else {
        UnavailableReason::Upstream(err.to_string())
    };
    AppError::unavailable(symbol, reason)
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedSource;
    use super::*;
    use crate::market_data::bar::test_support::rising_bars;

    fn query(symbol: &str) -> BarQuery {
        BarQuery::resolve(symbol, Period::Daily, None, None, &FetchConfig::default()).unwrap()
    }

    fn upstream(symbol: &str) -> AppError {
        AppError::unavailable(symbol, UnavailableReason::Upstream("503".into()))
    }

    #[test]
    fn resolve_applies_lookback() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let q = BarQuery::resolve(" aapl ", Period::Daily, None, Some(end), &FetchConfig::default())
            .unwrap();
        assert_eq!(q.symbol, "AAPL");
        assert_eq!(q.end, end);
        assert_eq!((q.end - q.start).num_days(), 400);
    }

    #[test]
    fn resolve_rejects_empty_symbol_and_inverted_range() {
        let cfg = FetchConfig::default();
        assert!(BarQuery::resolve("  ", Period::Daily, None, None, &cfg).is_err());
        let start = NaiveDate::from_ymd_opt(2024, 6, 2);
        let end = NaiveDate::from_ymd_opt(2024, 6, 1);
        let err = BarQuery::resolve("AAPL", Period::Daily, start, end, &cfg).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let source = ScriptedSource::new(vec![Err(upstream("AAPL"))], rising_bars(10));
        let series = fetch_with_retry(&source, &query("AAPL"), &FetchConfig::default())
            .await
            .unwrap();
        assert_eq!(series.bars.len(), 10);
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn retry_count_is_bounded() {
        let source = ScriptedSource::new(
            vec![Err(upstream("AAPL")), Err(upstream("AAPL")), Err(upstream("AAPL"))],
            rising_bars(10),
        );
        let err = fetch_with_retry(&source, &query("AAPL"), &FetchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "upstream_error");
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let source = ScriptedSource::new(
            vec![Err(AppError::unavailable("ZZZZ", UnavailableReason::NotFound))],
            rising_bars(10),
        );
        let err = fetch_with_retry(&source, &query("ZZZZ"), &FetchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "symbol_not_found");
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let mut source = ScriptedSource::always(rising_bars(10));
        source.delay = Some(Duration::from_secs(5));
        let cfg = FetchConfig {
            timeout_secs: 1,
            max_retries: 0,
            ..FetchConfig::default()
        };
        let err = fetch_with_retry(&source, &query("AAPL"), &cfg)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "fetch_timeout");
    }

    #[tokio::test]
    async fn empty_series_is_insufficient_data() {
        let source = ScriptedSource::always(Vec::new());
        let err = fetch_with_retry(&source, &query("AAPL"), &FetchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[tokio::test]
    async fn router_dispatches_by_market() {
        let a_share = Arc::new(ScriptedSource::always(rising_bars(3)));
        let us = Arc::new(ScriptedSource::always(rising_bars(4)));
        let router = MarketRouter::new(a_share.clone(), us.clone());

        let cn = router.fetch_bars(&query("600519")).await.unwrap();
        assert_eq!(cn.bars.len(), 3);
        let en = router.fetch_bars(&query("MSFT")).await.unwrap();
        assert_eq!(en.bars.len(), 4);
        assert_eq!(a_share.call_count(), 1);
        assert_eq!(us.call_count(), 1);
    }

    #[test]
    fn status_classification() {
        let limited = classify_status("X", StatusCode::TOO_MANY_REQUESTS, "yahoo");
        assert_eq!(limited.kind(), "rate_limited");
        assert!(!limited.is_transient());
        let missing = classify_status("X", StatusCode::NOT_FOUND, "yahoo");
        assert_eq!(missing.kind(), "symbol_not_found");
        let outage = classify_status("X", StatusCode::BAD_GATEWAY, "yahoo");
        assert!(outage.is_transient());
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let refused = classify_status("X", status, "yahoo");
            assert_eq!(refused.kind(), "upstream_rejected");
            assert!(!refused.is_transient());
        }
    }

    #[tokio::test]
    async fn forbidden_is_not_retried() {
        let source = ScriptedSource::new(
            vec![Err(classify_status("AAPL", StatusCode::FORBIDDEN, "yahoo"))],
            rising_bars(10),
        );
        let err = fetch_with_retry(&source, &query("AAPL"), &FetchConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "upstream_rejected");
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn oversized_retry_setting_still_retries_once() {
        let source = ScriptedSource::new(
            vec![Err(upstream("AAPL")), Err(upstream("AAPL")), Err(upstream("AAPL"))],
            rising_bars(10),
        );
        let cfg = FetchConfig {
            max_retries: 5,
            ..FetchConfig::default()
        };
        let err = fetch_with_retry(&source, &query("AAPL"), &cfg).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_error");
        assert_eq!(source.call_count(), 2);
    }
}

// =============================================================================
// Analysis service - async orchestration behind the REST handlers
// =============================================================================
//
//   request → BarQuery → fetch_with_retry → run_pipeline → AnalysisReport
//
// Each request works on a snapshot of the runtime config.  Failures are
// logged and pushed to the error ring before being returned.  Batch
// operations fetch concurrently and report failures per symbol.
// =============================================================================

use chrono::{Duration, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::app_state::AppState;
use crate::error::{AppError, Result};
use crate::market_data::{fetch_with_retry, BarQuery, StockInfo};
use crate::portfolio::{self, Holding, PortfolioReport, PricedHolding};
use crate::runtime_config::RuntimeConfig;
use crate::types::{Market, Period};

use super::pipeline::run_pipeline;
use super::report::{AnalysisReport, PriceInfo};

/// Upper bound on symbols per quotes call or portfolio.
pub const MAX_BATCH: usize = 50;

/// Enough calendar days to span a long holiday and still have two bars.
const QUOTE_LOOKBACK_DAYS: i64 = 14;

/// Raw analysis parameters as they arrive from the query string or body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl AnalyzeRequest {
    pub fn to_query(&self, config: &RuntimeConfig) -> Result<BarQuery> {
        let period: Period = self
            .period
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(AppError::InvalidRequest)?;
        let start = parse_date("start", self.start.as_deref())?;
        let end = parse_date("end", self.end.as_deref())?;
        BarQuery::resolve(&self.symbol, period, start, end, &config.fetch)
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::InvalidRequest(format!("{field} must be YYYY-MM-DD, got '{v}'"))),
    }
}

/// Log a failure and push it to the dashboard error ring.
fn record<T>(state: &AppState, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!(error = %e, kind = e.kind(), symbol = e.symbol().unwrap_or("-"), "request failed");
        state.push_error(e);
    }
    result
}

// =============================================================================
// Single-symbol analysis
// =============================================================================

#[instrument(skip(state), fields(symbol = %req.symbol), name = "service::analyze")]
pub async fn analyze(state: &AppState, req: &AnalyzeRequest) -> Result<AnalysisReport> {
    let result = analyze_inner(state, req).await;
    record(state, result)
}

async fn analyze_inner(state: &AppState, req: &AnalyzeRequest) -> Result<AnalysisReport> {
    let config = state.config_snapshot();
    let query = req.to_query(&config)?;

    let series = fetch_with_retry(state.source.as_ref(), &query, &config.fetch).await?;
    let analysis = run_pipeline(&query.symbol, series.bars, &config)?;
    let report = AnalysisReport::build(
        series.info,
        query.period,
        analysis,
        &config.indicators.ma_levels,
    )
    .ok_or_else(|| AppError::InsufficientData {
        symbol: query.symbol.clone(),
    })?;

    info!(
        symbol = %query.symbol,
        period = %query.period,
        bars = report.ohlcv.len(),
        score = format!("{:.2}", report.composite.score),
        recommendation = %report.composite.recommendation,
        regime = %report.composite.regime.label,
        "analysis complete"
    );
    Ok(report)
}

// =============================================================================
// Quotes batch
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub code: String,
    pub name: String,
    pub market: Market,
    #[serde(flatten)]
    pub price: PriceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolError {
    pub symbol: String,
    pub kind: String,
    pub error: String,
}

impl SymbolError {
    fn from_error(symbol: &str, e: &AppError) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind: e.kind().to_string(),
            error: e.to_string(),
        }
    }
}

/// Successes and failures are reported side by side.
#[derive(Debug, Clone, Serialize)]
pub struct QuotesResponse {
    pub quotes: Vec<Quote>,
    pub errors: Vec<SymbolError>,
}

/// Split `"aapl, 600519,,MSFT"` into distinct, upper-cased symbols.
pub fn parse_symbols(raw: &str) -> Result<Vec<String>> {
    let mut symbols: Vec<String> = Vec::new();
    for s in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !s.is_empty() && !symbols.contains(&s) {
            symbols.push(s);
        }
    }
    if symbols.is_empty() {
        return Err(AppError::InvalidRequest("at least one symbol is required".into()));
    }
    if symbols.len() > MAX_BATCH {
        return Err(AppError::InvalidRequest(format!(
            "at most {MAX_BATCH} symbols per request, got {}",
            symbols.len()
        )));
    }
    Ok(symbols)
}

#[instrument(skip(state), fields(count = symbols.len()), name = "service::quotes")]
pub async fn quotes(state: &AppState, symbols: &[String]) -> QuotesResponse {
    let config = state.config_snapshot();
    let end = Utc::now().date_naive();
    let start = end - Duration::days(QUOTE_LOOKBACK_DAYS);

    let fetches = symbols.iter().map(|symbol| {
        let config = &config;
        async move {
            let outcome = async {
                let query =
                    BarQuery::resolve(symbol, Period::Daily, Some(start), Some(end), &config.fetch)?;
                let series = fetch_with_retry(state.source.as_ref(), &query, &config.fetch).await?;
                let price = PriceInfo::from_bars(&series.bars).ok_or_else(|| {
                    AppError::InsufficientData {
                        symbol: query.symbol.clone(),
                    }
                })?;
                Ok::<_, AppError>(quote(series.info, price))
            }
            .await;
            (symbol, record(state, outcome))
        }
    });

    let mut response = QuotesResponse {
        quotes: Vec::new(),
        errors: Vec::new(),
    };
    for (symbol, outcome) in join_all(fetches).await {
        match outcome {
            Ok(q) => response.quotes.push(q),
            Err(e) => response.errors.push(SymbolError::from_error(symbol, &e)),
        }
    }
    info!(
        ok = response.quotes.len(),
        failed = response.errors.len(),
        "quotes batch complete"
    );
    response
}

fn quote(info: StockInfo, price: PriceInfo) -> Quote {
    Quote {
        code: info.code,
        name: info.name,
        market: info.market,
        price,
    }
}

// =============================================================================
// Portfolio
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioRequest {
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioResponse {
    #[serde(flatten)]
    pub report: PortfolioReport,
    /// Holdings left out because their history could not be fetched.
    pub skipped: Vec<SymbolError>,
}

/// Fetch daily history for every holding and compute the risk metrics.
///
/// Holdings whose fetch fails are skipped and listed; the request fails only
/// when no holding could be priced, with the first holding's error.
#[instrument(skip(state, req), fields(holdings = req.holdings.len()), name = "service::portfolio")]
pub async fn portfolio(state: &AppState, req: &PortfolioRequest) -> Result<PortfolioResponse> {
    let result = portfolio_inner(state, req).await;
    record(state, result)
}

async fn portfolio_inner(state: &AppState, req: &PortfolioRequest) -> Result<PortfolioResponse> {
    portfolio::validate_holdings(&req.holdings)?;
    if req.holdings.len() > MAX_BATCH {
        return Err(AppError::InvalidRequest(format!(
            "at most {MAX_BATCH} holdings per request"
        )));
    }
    let config = state.config_snapshot();

    let fetches = req.holdings.iter().map(|h| {
        let config = &config;
        async move {
            let outcome = async {
                let query = BarQuery::resolve(&h.symbol, Period::Daily, None, None, &config.fetch)?;
                fetch_with_retry(state.source.as_ref(), &query, &config.fetch).await
            }
            .await;
            (h, record(state, outcome))
        }
    });

    let mut priced = Vec::new();
    let mut skipped = Vec::new();
    let mut first_error = None;
    for (holding, outcome) in join_all(fetches).await {
        match outcome {
            Ok(series) => priced.push(PricedHolding {
                symbol: series.info.code,
                shares: holding.shares,
                cost_basis: holding.cost_basis,
                bars: series.bars,
            }),
            Err(e) => {
                skipped.push(SymbolError::from_error(&holding.symbol, &e));
                first_error.get_or_insert(e);
            }
        }
    }

    if priced.is_empty() {
        return Err(first_error.unwrap_or_else(|| {
            AppError::InvalidRequest("could not fetch history for any holding".into())
        }));
    }

    let report = portfolio::analyze(&priced)?;
    Ok(PortfolioResponse { report, skipped })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::UnavailableReason;
    use crate::market_data::bar::test_support::{rising_bars, wavy_bars};
    use crate::market_data::source::test_support::ScriptedSource;

    fn state(source: ScriptedSource) -> AppState {
        let path = std::env::temp_dir().join(format!("stockscope_svc_{}.json", uuid::Uuid::new_v4()));
        AppState::new(RuntimeConfig::default(), path, Arc::new(source))
    }

    fn request(symbol: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            symbol: symbol.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn request_parsing() {
        let config = RuntimeConfig::default();
        let req = AnalyzeRequest {
            symbol: " aapl ".into(),
            period: Some("weekly".into()),
            start: Some("2024-01-01".into()),
            end: Some("2024-06-30".into()),
        };
        let q = req.to_query(&config).unwrap();
        assert_eq!(q.symbol, "AAPL");
        assert_eq!(q.period, Period::Weekly);
        assert_eq!(q.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let bad_period = AnalyzeRequest {
            period: Some("hourly".into()),
            ..request("AAPL")
        };
        assert!(matches!(bad_period.to_query(&config), Err(AppError::InvalidRequest(_))));

        let bad_date = AnalyzeRequest {
            start: Some("01/02/2024".into()),
            ..request("AAPL")
        };
        assert!(matches!(bad_date.to_query(&config), Err(AppError::InvalidRequest(_))));

        let blank_dates = AnalyzeRequest {
            start: Some("".into()),
            end: Some(" ".into()),
            ..request("AAPL")
        };
        assert!(blank_dates.to_query(&config).is_ok());
    }

    #[test]
    fn symbol_list_parsing() {
        assert_eq!(
            parse_symbols("aapl, 600519,,AAPL ,msft").unwrap(),
            vec!["AAPL", "600519", "MSFT"]
        );
        assert!(parse_symbols(" , ").is_err());
        let many: Vec<String> = (0..=MAX_BATCH).map(|i| format!("S{i}")).collect();
        assert!(parse_symbols(&many.join(",")).is_err());
    }

    #[tokio::test]
    async fn analyze_builds_report() {
        let st = state(ScriptedSource::always(rising_bars(60)));
        let report = analyze(&st, &request("aapl")).await.unwrap();
        assert_eq!(report.stock_info.code, "AAPL");
        assert_eq!(report.ohlcv.len(), 60);
        assert!(report.composite.score > 20.0);
        assert!(st.recent_errors().is_empty());
    }

    #[tokio::test]
    async fn analyze_failure_is_recorded() {
        let source = ScriptedSource::new(
            vec![Err(AppError::unavailable("ZZZZ", UnavailableReason::NotFound))],
            Vec::new(),
        );
        let st = state(source);
        let err = analyze(&st, &request("ZZZZ")).await.unwrap_err();
        assert_eq!(err.kind(), "symbol_not_found");
        let errors = st.recent_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].symbol.as_deref(), Some("ZZZZ"));
    }

    #[tokio::test]
    async fn analyze_empty_series_is_insufficient() {
        let st = state(ScriptedSource::always(Vec::new()));
        let err = analyze(&st, &request("AAPL")).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn quotes_report_failures_per_symbol() {
        let source = ScriptedSource::new(
            vec![
                Ok(rising_bars(5)),
                Err(AppError::unavailable("BAD", UnavailableReason::NotFound)),
            ],
            rising_bars(5),
        );
        let st = state(source);
        let symbols = vec!["AAPL".to_string(), "BAD".to_string()];
        let response = quotes(&st, &symbols).await;
        assert_eq!(response.quotes.len() + response.errors.len(), 2);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].kind, "symbol_not_found");
        let q = &response.quotes[0];
        assert!((q.price.latest_price - 104.0).abs() < 1e-10);
        assert!((q.price.change.unwrap() - 1.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn portfolio_analysis_end_to_end() {
        let st = state(ScriptedSource::always(wavy_bars(80)));
        let req = PortfolioRequest {
            holdings: vec![
                Holding {
                    symbol: "AAPL".into(),
                    shares: 10.0,
                    cost_basis: Some(90.0),
                },
                Holding {
                    symbol: "MSFT".into(),
                    shares: 4.0,
                    cost_basis: None,
                },
            ],
        };
        let response = portfolio(&st, &req).await.unwrap();
        assert!(response.skipped.is_empty());
        assert_eq!(response.report.period_days, 79);
        assert_eq!(response.report.correlation.symbols, vec!["AAPL", "MSFT"]);

        let overview = &response.report.overview;
        assert_eq!(overview.holdings.len(), 2);
        assert!(overview.holdings[0].unrealized_pl.is_some());
        assert!(overview.holdings[1].unrealized_pl.is_none());
        assert!((overview.total_cost - 900.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn portfolio_outage_surfaces_the_fetch_error() {
        let timeout = || AppError::unavailable("AAPL", UnavailableReason::Timeout { secs: 15 });
        let source = ScriptedSource::new(
            vec![Err(timeout()), Err(timeout()), Err(timeout()), Err(timeout())],
            wavy_bars(80),
        );
        let st = state(source);
        let req = PortfolioRequest {
            holdings: vec![
                Holding {
                    symbol: "AAPL".into(),
                    shares: 1.0,
                    cost_basis: None,
                },
                Holding {
                    symbol: "MSFT".into(),
                    shares: 1.0,
                    cost_basis: None,
                },
            ],
        };
        let err = portfolio(&st, &req).await.unwrap_err();
        assert_eq!(err.kind(), "fetch_timeout");
        assert_eq!(err.status_code(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn portfolio_rejects_empty_holdings() {
        let st = state(ScriptedSource::always(wavy_bars(80)));
        let err = portfolio(&st, &PortfolioRequest { holdings: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(st.recent_errors().len(), 1);
    }
}

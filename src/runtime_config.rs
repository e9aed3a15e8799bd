// =============================================================================
// Runtime Configuration - analysis parameters with atomic save
// =============================================================================
//
// Central configuration hub for the analysis backend.  Every indicator
// window, signal threshold, scoring weight and recommendation breakpoint
// lives here so that the pipeline has no magic numbers of its own.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry serde defaults so that adding new fields never
// breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Period, SignalCategory};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

/// Upstream fetches are retried at most once.
pub const MAX_FETCH_RETRIES: u32 = 1;

fn default_max_retries() -> u32 {
    MAX_FETCH_RETRIES
}

fn default_ma_levels() -> Vec<usize> {
    vec![5, 10, 20, 60, 120, 250]
}

// =============================================================================
// Server & fetch
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the REST API binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Price adjustment applied by providers that support it (A-shares).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceAdjust {
    /// Forward-adjusted (qfq).
    Forward,
    /// Backward-adjusted (hfq).
    Backward,
    None,
}

impl Default for PriceAdjust {
    fn default() -> Self {
        Self::Forward
    }
}

/// Calendar days of history fetched when the caller gives no range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookbackDays {
    pub daily: i64,
    pub weekly: i64,
    pub monthly: i64,
}

impl Default for LookbackDays {
    fn default() -> Self {
        // 400 calendar days covers MA250 on daily bars.
        Self {
            daily: 400,
            weekly: 2500,
            monthly: 6000,
        }
    }
}

impl LookbackDays {
    pub fn for_period(&self, period: Period) -> i64 {
        match period {
            Period::Daily => self.daily,
            Period::Weekly => self.weekly,
            Period::Monthly => self.monthly,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound on a single upstream fetch.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on transient failure (timeout / connection / 5xx), 0 or 1.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub lookback_days: LookbackDays,

    #[serde(default)]
    pub adjust: PriceAdjust,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            lookback_days: LookbackDays::default(),
            adjust: PriceAdjust::default(),
        }
    }
}

// =============================================================================
// Indicator parameters
// =============================================================================

/// Look-back windows and smoothing constants for every indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ma_short: usize,
    pub ma_mid: usize,
    pub ma_long: usize,
    /// Moving averages reported as price levels (not used for signals).
    #[serde(default = "default_ma_levels")]
    pub ma_levels: Vec<usize>,

    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,

    pub rsi_period: usize,

    pub kdj_period: usize,
    pub kdj_smoothing: usize,

    pub bollinger_period: usize,
    pub bollinger_std: f64,

    pub atr_period: usize,
    pub adx_period: usize,

    pub supertrend_period: usize,
    pub supertrend_multiplier: f64,

    pub ichimoku_tenkan: usize,
    pub ichimoku_kijun: usize,
    pub ichimoku_senkou: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_short: 5,
            ma_mid: 10,
            ma_long: 20,
            ma_levels: default_ma_levels(),
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            kdj_period: 9,
            kdj_smoothing: 3,
            bollinger_period: 20,
            bollinger_std: 2.0,
            atr_period: 14,
            adx_period: 14,
            supertrend_period: 10,
            supertrend_multiplier: 3.0,
            ichimoku_tenkan: 9,
            ichimoku_kijun: 26,
            ichimoku_senkou: 52,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let windows = [
            ("ma_short", self.ma_short),
            ("ma_mid", self.ma_mid),
            ("ma_long", self.ma_long),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("rsi_period", self.rsi_period),
            ("kdj_period", self.kdj_period),
            ("kdj_smoothing", self.kdj_smoothing),
            ("bollinger_period", self.bollinger_period),
            ("atr_period", self.atr_period),
            ("adx_period", self.adx_period),
            ("supertrend_period", self.supertrend_period),
            ("ichimoku_tenkan", self.ichimoku_tenkan),
            ("ichimoku_kijun", self.ichimoku_kijun),
            ("ichimoku_senkou", self.ichimoku_senkou),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return Err(format!("indicator window '{name}' must be at least 1"));
        }
        if !(self.ma_short < self.ma_mid && self.ma_mid < self.ma_long) {
            return Err("moving averages must satisfy ma_short < ma_mid < ma_long".to_string());
        }
        if self.macd_fast >= self.macd_slow {
            return Err("macd_fast must be shorter than macd_slow".to_string());
        }
        if !self.bollinger_std.is_finite() || !self.supertrend_multiplier.is_finite() {
            return Err("band multipliers must be finite".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Signal thresholds
// =============================================================================

/// Every threshold and strength constant used by the signal rulebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Strength per point of RSI distance from 50.
    pub rsi_strength_gain: f64,

    pub kdj_overbought: f64,
    pub kdj_oversold: f64,
    /// Strength per point of %K distance from 50.
    pub kdj_strength_gain: f64,

    /// ADX at or above which the DMI rule fires.
    pub adx_trend: f64,

    pub macd_cross_strength: f64,
    pub macd_trend_strength: f64,

    pub ma_cross_base_strength: f64,
    /// Strength per percent of moving-average spread.
    pub spread_gain: f64,

    pub ichimoku_kijun_strength: f64,
    pub ichimoku_cloud_base_strength: f64,

    pub bollinger_base_strength: f64,

    /// Strength per ATR of distance between close and the new SuperTrend band.
    pub supertrend_atr_gain: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_strength_gain: 1.0,
            kdj_overbought: 80.0,
            kdj_oversold: 20.0,
            kdj_strength_gain: 1.0,
            adx_trend: 25.0,
            macd_cross_strength: 70.0,
            macd_trend_strength: 30.0,
            ma_cross_base_strength: 60.0,
            spread_gain: 10.0,
            ichimoku_kijun_strength: 40.0,
            ichimoku_cloud_base_strength: 50.0,
            bollinger_base_strength: 50.0,
            supertrend_atr_gain: 50.0,
        }
    }
}

// =============================================================================
// Composite scoring
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            trend: 1.0,
            momentum: 0.8,
            volatility: 0.6,
        }
    }
}

impl CategoryWeights {
    pub fn weight(&self, category: SignalCategory) -> f64 {
        match category {
            SignalCategory::Trend => self.trend,
            SignalCategory::Momentum => self.momentum,
            SignalCategory::Volatility => self.volatility,
        }
    }

    pub fn max(&self) -> f64 {
        self.trend.max(self.momentum).max(self.volatility)
    }
}

/// Score breakpoints for the recommendation label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Breakpoints {
    /// score >= strong_buy => Strong Buy
    pub strong_buy: f64,
    /// score >= buy => Buy
    pub buy: f64,
    /// score <= sell => Sell
    pub sell: f64,
    /// score <= strong_sell => Strong Sell
    pub strong_sell: f64,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            strong_buy: 60.0,
            buy: 20.0,
            sell: -20.0,
            strong_sell: -60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: CategoryWeights,
    pub breakpoints: Breakpoints,
    /// Multiplier applied to the normalised ratio before clamping to ±100.
    pub gain: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            breakpoints: Breakpoints::default(),
            gain: 2.5,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let w = &self.weights;
        for (name, value) in [
            ("trend", w.trend),
            ("momentum", w.momentum),
            ("volatility", w.volatility),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("weight '{name}' must be a finite non-negative number"));
            }
        }
        if w.max() <= 0.0 {
            return Err("at least one category weight must be positive".to_string());
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err("gain must be a positive number".to_string());
        }
        let b = &self.breakpoints;
        let ordered = b.strong_sell < b.sell && b.sell < b.buy && b.buy < b.strong_buy;
        let bounded = b.strong_sell >= -100.0 && b.strong_buy <= 100.0;
        if !ordered || !bounded {
            return Err(
                "breakpoints must satisfy -100 <= strong_sell < sell < buy < strong_buy <= 100"
                    .to_string(),
            );
        }
        Ok(())
    }
}

// =============================================================================
// Regime
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    /// ATR as a percentage of price at or above which the market is volatile.
    pub volatile_atr_pct: f64,
    /// ADX at or above which the market is trending.
    pub trending_adx: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            volatile_atr_pct: 4.0,
            trending_adx: 25.0,
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub indicators: IndicatorParams,

    #[serde(default)]
    pub signals: SignalThresholds,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub regime: RegimeThresholds,
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid runtime config in {}: {e}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.server.bind_addr,
            timeout_secs = config.fetch.timeout_secs,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        self.indicators.validate()?;
        self.scoring.validate()?;
        if self.fetch.timeout_secs == 0 {
            return Err("fetch.timeout_secs must be at least 1".to_string());
        }
        if self.fetch.max_retries > MAX_FETCH_RETRIES {
            return Err(format!(
                "fetch.max_retries must be at most {MAX_FETCH_RETRIES}"
            ));
        }
        Ok(())
    }
}

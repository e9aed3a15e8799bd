// =============================================================================
// Central Application State - stockscope
// =============================================================================
//
// Shared by every request handler via `Arc<AppState>`.  Requests are otherwise
// independent; the only mutable shared state is:
//   - the runtime configuration (tunable scoring weights/breakpoints)
//   - a bounded ring of recent request failures for the dashboard
//
// Thread safety:
//   - parking_lot::RwLock for the config and the error ring.
//   - Atomic counter for the config version.
//   - The market-data source is immutable and shared behind an Arc.
// =============================================================================

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::market_data::MarketDataSource;
use crate::runtime_config::{RuntimeConfig, ScoringConfig};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded request failure for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error kind (e.g. `symbol_not_found`).
    pub code: Option<String>,
    pub symbol: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    /// Where runtime updates are persisted.
    pub config_path: PathBuf,
    /// Incremented on every accepted runtime update.
    pub config_version: AtomicU64,

    // ── Market Data ─────────────────────────────────────────────────────
    pub source: Arc<dyn MarketDataSource>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<VecDeque<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        config_path: impl Into<PathBuf>,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self {
            runtime_config: Arc::new(RwLock::new(config)),
            config_path: config_path.into(),
            config_version: AtomicU64::new(1),
            source,
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
            start_time: std::time::Instant::now(),
        }
    }

    /// Clone of the current configuration.  Requests work on a snapshot so a
    /// concurrent runtime update never changes parameters mid-analysis.
    pub fn config_snapshot(&self) -> RuntimeConfig {
        self.runtime_config.read().clone()
    }

    pub fn current_config_version(&self) -> u64 {
        self.config_version.load(Ordering::SeqCst)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    // ── Runtime tuning ──────────────────────────────────────────────────

    /// Validate and apply new scoring parameters, then persist the whole
    /// config atomically.  The in-memory update stands even if persisting
    /// fails; the error is returned so the caller can report it.
    pub fn update_scoring(&self, scoring: ScoringConfig) -> Result<RuntimeConfig, AppError> {
        scoring.validate().map_err(AppError::InvalidRequest)?;

        let updated = {
            let mut config = self.runtime_config.write();
            config.scoring = scoring;
            config.clone()
        };
        let version = self.config_version.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            version,
            gain = updated.scoring.gain,
            trend = updated.scoring.weights.trend,
            momentum = updated.scoring.weights.momentum,
            volatility = updated.scoring.weights.volatility,
            "scoring config updated"
        );

        updated.save(&self.config_path)?;
        Ok(updated)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record a request failure.
    pub fn push_error(&self, err: &AppError) {
        self.push_error_with_code(
            err.to_string(),
            Some(err.kind().to_string()),
            err.symbol().map(str::to_string),
        );
    }

    /// Record an error with an optional machine-readable code.  The ring
    /// is capped at [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error_with_code(&self, message: String, code: Option<String>, symbol: Option<String>) {
        let record = ErrorRecord {
            message,
            code,
            symbol,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push_back(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.pop_front();
        }
    }

    /// Most recent first.
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().iter().rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnavailableReason;
    use crate::market_data::source::test_support::ScriptedSource;

    fn state_at(path: PathBuf) -> AppState {
        AppState::new(
            RuntimeConfig::default(),
            path,
            Arc::new(ScriptedSource::always(Vec::new())),
        )
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stockscope_{name}_{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn error_ring_is_bounded_and_newest_first() {
        let state = state_at(temp_path("ring"));
        for i in 0..(MAX_RECENT_ERRORS + 7) {
            state.push_error_with_code(format!("e{i}"), None, None);
        }
        let errors = state.recent_errors();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, format!("e{}", MAX_RECENT_ERRORS + 6));
        assert_eq!(errors.last().unwrap().message, "e7");
    }

    #[test]
    fn push_error_records_kind_and_symbol() {
        let state = state_at(temp_path("kind"));
        state.push_error(&AppError::unavailable("AAPL", UnavailableReason::RateLimited));
        let errors = state.recent_errors();
        assert_eq!(errors[0].code.as_deref(), Some("rate_limited"));
        assert_eq!(errors[0].symbol.as_deref(), Some("AAPL"));
    }

    #[test]
    fn update_scoring_validates_persists_and_bumps_version() {
        let path = temp_path("scoring");
        let state = state_at(path.clone());

        let mut scoring = ScoringConfig::default();
        scoring.gain = 3.0;
        let updated = state.update_scoring(scoring).unwrap();
        assert_eq!(updated.scoring.gain, 3.0);
        assert_eq!(state.current_config_version(), 2);
        assert_eq!(state.config_snapshot().scoring.gain, 3.0);

        let reloaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(reloaded.scoring.gain, 3.0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn update_scoring_rejects_unordered_breakpoints() {
        let state = state_at(temp_path("reject"));
        let mut scoring = ScoringConfig::default();
        scoring.breakpoints.buy = 80.0;
        let err = state.update_scoring(scoring).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(state.current_config_version(), 1);
        assert_eq!(state.config_snapshot().scoring.breakpoints.buy, 20.0);
    }
}

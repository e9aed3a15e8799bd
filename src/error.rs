// =============================================================================
// Error taxonomy
// =============================================================================
//
// Three families of failure reach a caller:
//   - upstream data errors (unknown symbol, timeout, rate limit, outage)
//   - insufficient data (the fetched series is empty)
//   - invalid requests
// Short history for an individual indicator is NOT an error; it only
// suppresses that indicator's signal.
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why an upstream market-data fetch could not produce a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The provider does not know the symbol (or returned no rows for it).
    NotFound,
    /// The request exceeded the bounded fetch timeout.
    Timeout { secs: u64 },
    /// The provider throttled us.
    RateLimited,
    /// Connection failure or 5xx.
    Upstream(String),
    /// The provider refused the request (4xx) or sent a payload we cannot read.
    Rejected(String),
}

impl UnavailableReason {
    /// Transient failures get a single bounded retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Upstream(_))
    }
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "symbol not found"),
            Self::Timeout { secs } => write!(f, "fetch timed out after {secs}s"),
            Self::RateLimited => write!(f, "rate limited by data provider"),
            Self::Upstream(detail) => write!(f, "upstream error: {detail}"),
            Self::Rejected(detail) => write!(f, "provider rejected request: {detail}"),
        }
    }
}

/// Application error type shared by the data layer, the pipeline and the API.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        reason: UnavailableReason,
    },

    #[error("insufficient data for {symbol}: no bars in the requested range")]
    InsufficientData { symbol: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unavailable(symbol: impl Into<String>, reason: UnavailableReason) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason,
        }
    }

    /// Stable machine-readable error kind for API consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { reason, .. } => match reason {
                UnavailableReason::NotFound => "symbol_not_found",
                UnavailableReason::Timeout { .. } => "fetch_timeout",
                UnavailableReason::RateLimited => "rate_limited",
                UnavailableReason::Upstream(_) => "upstream_error",
                UnavailableReason::Rejected(_) => "upstream_rejected",
            },
            Self::InsufficientData { .. } => "insufficient_data",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Symbol the error pertains to, when there is one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::DataUnavailable { symbol, .. } | Self::InsufficientData { symbol } => {
                Some(symbol)
            }
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            Self::DataUnavailable { reason, .. } => reason.is_transient(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DataUnavailable { reason, .. } => match reason {
                UnavailableReason::NotFound => StatusCode::NOT_FOUND,
                UnavailableReason::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                UnavailableReason::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                UnavailableReason::Upstream(_) | UnavailableReason::Rejected(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let (Some(symbol), Some(obj)) = (self.symbol(), body.as_object_mut()) {
            obj.insert("symbol".to_string(), json!(symbol));
        }
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Shared types used across the stockscope analysis backend
// =============================================================================

use serde::{Deserialize, Serialize};

/// Bar granularity requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Default for Period {
    fn default() -> Self {
        Self::Daily
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "daily" | "day" | "d" => Ok(Self::Daily),
            "weekly" | "week" | "w" => Ok(Self::Weekly),
            "monthly" | "month" | "m" => Ok(Self::Monthly),
            other => Err(format!(
                "invalid period '{other}'. Use 'daily', 'weekly' or 'monthly'."
            )),
        }
    }
}

/// Exchange family a symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    /// Mainland China A-shares, six-digit numeric codes (e.g. `600519`).
    AShare,
    /// US-listed stocks and ETFs, ticker symbols (e.g. `AAPL`).
    UsStock,
}

impl Market {
    /// An all-digit symbol is an A-share code; anything else is a US ticker.
    pub fn detect(symbol: &str) -> Self {
        if !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_digit()) {
            Self::AShare
        } else {
            Self::UsStock
        }
    }
}

impl Market {
    /// Currency the market quotes prices in.
    pub fn currency(self) -> Currency {
        match self {
            Self::AShare => Currency::Cny,
            Self::UsStock => Currency::Usd,
        }
    }
}

/// Quote currency of a holding or a portfolio total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Cny,
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AShare => write!(f, "A-Share"),
            Self::UsStock => write!(f, "US-Stock"),
        }
    }
}

/// Direction of a discrete signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
    Neutral,
}

impl Direction {
    /// +1.0 for buy, -1.0 for sell, 0.0 for neutral.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
            Self::Neutral => 0.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Category tag used by the composite scorer to weight a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalCategory {
    Trend,
    Momentum,
    Volatility,
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trend => write!(f, "trend"),
            Self::Momentum => write!(f, "momentum"),
            Self::Volatility => write!(f, "volatility"),
        }
    }
}

use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Horizon every model is asked to predict over.
pub const TIMEFRAME: &str = "1 Week";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    /// Case-insensitive match on the three labels. Anything else is `None`.
    pub fn parse_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" => Some(Self::Bullish),
            "bearish" => Some(Self::Bearish),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
            Self::Neutral => "Neutral",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

/// Input to one prediction fan-out. Built per user action and dropped afterwards.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    symbol: String,
    current_price: f64,
    market_context: String,
}

impl PredictionRequest {
    pub fn try_new(
        symbol: &str,
        current_price: f64,
        market_context: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let symbol = symbol.trim().to_ascii_uppercase();
        ensure!(!symbol.is_empty(), "symbol must be non-empty");
        ensure!(
            !symbol.chars().any(char::is_whitespace),
            "symbol must be a single token (got {symbol:?})"
        );
        ensure!(
            current_price.is_finite() && current_price > 0.0,
            "current price must be a positive number (got {current_price})"
        );

        Ok(Self {
            symbol,
            current_price,
            market_context: market_context.into(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn market_context(&self) -> &str {
        &self.market_context
    }
}

/// The uniform per-model record, produced for every queried model whether or not its
/// endpoint answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPrediction {
    pub model: String,
    pub direction: Direction,
    pub confidence: u8,
    pub target_price: f64,
    pub timeframe: String,
    pub reasoning: String,
    pub risk_level: RiskLevel,
}

impl NormalizedPrediction {
    /// Percent move from `current_price` to the target.
    pub fn upside_pct(&self, current_price: f64) -> f64 {
        (self.target_price / current_price - 1.0) * 100.0
    }
}

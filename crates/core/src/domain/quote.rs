use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockData {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
}

impl StockData {
    /// Default market context handed to the models when the caller supplies none.
    pub fn market_context(&self) -> String {
        format!(
            "Current market conditions for {} ({}). Recent change: {:.2}%",
            self.name, self.symbol, self.change_percent
        )
    }
}

/// One OHLCV bar. `timestamp` keeps the upstream text form (`YYYY-MM-DD` or
/// `YYYY-MM-DD HH:MM:SS`), which sorts chronologically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1min")]
    Min1,
    #[serde(rename = "5min")]
    Min5,
    #[serde(rename = "15min")]
    Min15,
    #[serde(rename = "30min")]
    Min30,
    #[serde(rename = "60min")]
    Min60,
    #[default]
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
}

impl Interval {
    /// Unknown names fall back to daily bars.
    pub fn parse_or_daily(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "1min" => Self::Min1,
            "5min" => Self::Min5,
            "15min" => Self::Min15,
            "30min" => Self::Min30,
            "60min" => Self::Min60,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            _ => Self::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min1 => "1min",
            Self::Min5 => "5min",
            Self::Min15 => "15min",
            Self::Min30 => "30min",
            Self::Min60 => "60min",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Self::Min1 | Self::Min5 | Self::Min15 | Self::Min30 | Self::Min60
        )
    }

    /// Bar width in minutes; months are approximated as 30 days.
    pub fn minutes(&self) -> i64 {
        match self {
            Self::Min1 => 1,
            Self::Min5 => 5,
            Self::Min15 => 15,
            Self::Min30 => 30,
            Self::Min60 => 60,
            Self::Daily => 24 * 60,
            Self::Weekly => 7 * 24 * 60,
            Self::Monthly => 30 * 24 * 60,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_interval_is_daily() {
        assert_eq!(Interval::parse_or_daily("5MIN"), Interval::Min5);
        assert_eq!(Interval::parse_or_daily("weekly"), Interval::Weekly);
        assert_eq!(Interval::parse_or_daily("hourly"), Interval::Daily);
        assert_eq!(Interval::parse_or_daily(""), Interval::Daily);
    }

    #[test]
    fn market_context_mentions_change() {
        let s = StockData {
            symbol: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            price: 182.52,
            change: 2.34,
            change_percent: 1.3,
            high: 185.23,
            low: 180.15,
            volume: 45_200_000,
            market_cap: None,
            pe_ratio: None,
        };
        assert_eq!(
            s.market_context(),
            "Current market conditions for Apple Inc. (AAPL). Recent change: 1.30%"
        );
    }
}

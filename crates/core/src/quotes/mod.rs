pub mod alpha_vantage;
pub mod fallback;

use crate::domain::quote::{Interval, StockData, TimeSeriesPoint};
use std::fmt;

/// Quote, series and search lookups. Only `get_quote` can fail, and only with
/// [`SymbolNotFound`] when neither the live source nor the local table knows the symbol.
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn get_quote(&self, symbol: &str) -> anyhow::Result<StockData>;

    /// Chronological bars. Never empty.
    async fn get_time_series(&self, symbol: &str, interval: Interval) -> Vec<TimeSeriesPoint>;

    async fn search_symbols(&self, query: &str) -> Vec<StockData>;
}

#[derive(Debug, Clone)]
pub struct SymbolNotFound {
    pub symbol: String,
    pub detail: String,
}

impl fmt::Display for SymbolNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol not found: {} ({})", self.symbol, self.detail)
    }
}

impl std::error::Error for SymbolNotFound {}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

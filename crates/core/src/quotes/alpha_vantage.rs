use crate::config::{env_parse, Settings};
use crate::domain::quote::{Interval, StockData, TimeSeriesPoint};
use crate::quotes::fallback::{self, SYNTHETIC_POINTS};
use crate::quotes::{normalize_symbol, QuoteProvider, SymbolNotFound};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const SERIES_LIMIT: usize = 100;
const SEARCH_LIMIT: usize = 5;

/// Keys Alpha Vantage puts in a 200 body instead of data when a call is rejected or throttled.
const SENTINEL_KEYS: &[&str] = &["Error Message", "Note", "Information"];

/// Alpha Vantage backed provider. Without a usable key every call is answered from the local
/// fallback table and synthetic series.
#[derive(Debug, Clone)]
pub struct AlphaVantageProvider {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout_secs =
            env_parse::<u64>("ALPHA_VANTAGE_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build Alpha Vantage http client")?;

        Ok(Self {
            http,
            api_key: settings.live_alpha_vantage_key().map(str::to_string),
            base_url: settings
                .alpha_vantage_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn is_live(&self) -> bool {
        self.api_key.is_some()
    }

    async fn query(&self, api_key: &str, params: &[(&str, &str)]) -> Result<Value> {
        let res = self
            .http
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await
            .context("Alpha Vantage request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Alpha Vantage response")?;
        if !status.is_success() {
            anyhow::bail!("Alpha Vantage HTTP {status}");
        }

        let raw = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("Alpha Vantage response is not valid JSON: {text}"))?;
        check_sentinels(&raw)?;
        Ok(raw)
    }

    async fn fetch_quote(&self, api_key: &str, symbol: &str) -> Result<StockData> {
        let raw = self
            .query(api_key, &[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        parse_global_quote(&raw, symbol)
    }

    async fn fetch_series(
        &self,
        api_key: &str,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let mut params = vec![("function", series_function(interval)), ("symbol", symbol)];
        if interval.is_intraday() {
            params.push(("interval", interval.as_str()));
        }
        let raw = self.query(api_key, &params).await?;
        parse_time_series(&raw, interval)
    }

    async fn fetch_search(&self, api_key: &str, query: &str) -> Result<Vec<String>> {
        let raw = self
            .query(api_key, &[("function", "SYMBOL_SEARCH"), ("keywords", query)])
            .await?;
        let symbols = parse_search_matches(&raw);
        anyhow::ensure!(!symbols.is_empty(), "no matches for {query:?}");
        Ok(symbols)
    }

    fn synthetic(&self, symbol: &str, interval: Interval) -> Vec<TimeSeriesPoint> {
        fallback::synthetic_series(
            symbol,
            interval,
            SYNTHETIC_POINTS,
            chrono::Utc::now(),
            &mut rand::rng(),
        )
    }
}

fn fallback_or_not_found(symbol: &str, reason: &str) -> Result<StockData> {
    match fallback::fallback_quote(symbol) {
        Some(q) => Ok(q),
        None => Err(SymbolNotFound {
            symbol: symbol.to_string(),
            detail: reason.to_string(),
        }
        .into()),
    }
}

#[async_trait::async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn provider_name(&self) -> &'static str {
        "alpha_vantage"
    }

    async fn get_quote(&self, symbol: &str) -> Result<StockData> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return fallback_or_not_found(&symbol, "empty symbol");
        }

        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!(%symbol, "Alpha Vantage key not configured; using fallback quote");
            return fallback_or_not_found(&symbol, "no live data source configured");
        };

        match self.fetch_quote(api_key, &symbol).await {
            Ok(quote) => Ok(quote),
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "live quote unavailable; using fallback quote");
                fallback_or_not_found(&symbol, &format!("{err:#}"))
            }
        }
    }

    async fn get_time_series(&self, symbol: &str, interval: Interval) -> Vec<TimeSeriesPoint> {
        let symbol = normalize_symbol(symbol);
        let Some(api_key) = self.api_key.as_deref() else {
            return self.synthetic(&symbol, interval);
        };

        match self.fetch_series(api_key, &symbol, interval).await {
            Ok(series) => series,
            Err(err) => {
                tracing::warn!(
                    %symbol,
                    %interval,
                    error = %err,
                    "live series unavailable; using synthetic series"
                );
                self.synthetic(&symbol, interval)
            }
        }
    }

    async fn search_symbols(&self, query: &str) -> Vec<StockData> {
        let Some(api_key) = self.api_key.as_deref() else {
            return fallback::search_local(query);
        };

        let symbols = match self.fetch_search(api_key, query.trim()).await {
            Ok(symbols) => symbols,
            Err(err) => {
                tracing::warn!(query, error = %err, "live search unavailable; using local search");
                return fallback::search_local(query);
            }
        };

        let lookups = symbols.iter().map(|s| self.get_quote(s));
        futures::future::join_all(lookups)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }
}

fn check_sentinels(raw: &Value) -> Result<()> {
    for key in SENTINEL_KEYS {
        if let Some(msg) = raw.get(*key) {
            anyhow::bail!("Alpha Vantage {key}: {msg}");
        }
    }
    Ok(())
}

fn series_function(interval: Interval) -> &'static str {
    match interval {
        Interval::Daily => "TIME_SERIES_DAILY",
        Interval::Weekly => "TIME_SERIES_WEEKLY",
        Interval::Monthly => "TIME_SERIES_MONTHLY",
        _ => "TIME_SERIES_INTRADAY",
    }
}

fn series_key(interval: Interval) -> String {
    match interval {
        Interval::Daily => "Time Series (Daily)".to_string(),
        Interval::Weekly => "Weekly Time Series".to_string(),
        Interval::Monthly => "Monthly Time Series".to_string(),
        other => format!("Time Series ({other})"),
    }
}

/// Values come as strings such as `"182.5200"` or `"1.3000%"`.
fn field_f64(obj: &Map<String, Value>, key: &str) -> Result<f64> {
    let s = obj
        .get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing field {key:?}"))?;
    s.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .with_context(|| format!("field {key:?} is not numeric: {s:?}"))
}

fn field_u64(obj: &Map<String, Value>, key: &str) -> Result<u64> {
    let v = field_f64(obj, key)?;
    anyhow::ensure!(v >= 0.0, "field {key:?} is negative");
    Ok(v.round() as u64)
}

fn parse_global_quote(raw: &Value, requested: &str) -> Result<StockData> {
    let quote = raw
        .get("Global Quote")
        .and_then(Value::as_object)
        .filter(|q| !q.is_empty())
        .context("empty Global Quote")?;

    let symbol = quote
        .get("01. symbol")
        .and_then(Value::as_str)
        .map(normalize_symbol)
        .unwrap_or_else(|| requested.to_string());

    Ok(StockData {
        name: fallback::company_name(&symbol),
        price: field_f64(quote, "05. price")?,
        change: field_f64(quote, "09. change")?,
        change_percent: field_f64(quote, "10. change percent")?,
        high: field_f64(quote, "03. high")?,
        low: field_f64(quote, "04. low")?,
        volume: field_u64(quote, "06. volume")?,
        symbol,
        market_cap: None,
        pe_ratio: None,
    })
}

/// Most recent `SERIES_LIMIT` bars, oldest first.
fn parse_time_series(raw: &Value, interval: Interval) -> Result<Vec<TimeSeriesPoint>> {
    let key = series_key(interval);
    let series = raw
        .get(&key)
        .and_then(Value::as_object)
        .with_context(|| format!("missing {key:?}"))?;

    let mut points = series
        .iter()
        .map(|(timestamp, values)| {
            let bar = values
                .as_object()
                .with_context(|| format!("bar {timestamp} is not an object"))?;
            Ok(TimeSeriesPoint {
                timestamp: timestamp.clone(),
                open: field_f64(bar, "1. open")?,
                high: field_f64(bar, "2. high")?,
                low: field_f64(bar, "3. low")?,
                close: field_f64(bar, "4. close")?,
                volume: field_u64(bar, "5. volume")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!points.is_empty(), "{key:?} has no bars");

    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let skip = points.len().saturating_sub(SERIES_LIMIT);
    Ok(points.split_off(skip))
}

fn parse_search_matches(raw: &Value) -> Vec<String> {
    raw.get("bestMatches")
        .and_then(Value::as_array)
        .map(|matches| {
            matches
                .iter()
                .filter_map(|m| m.get("1. symbol").and_then(Value::as_str))
                .map(normalize_symbol)
                .filter(|s| !s.is_empty())
                .take(SEARCH_LIMIT)
                .collect()
        })
        .unwrap_or_default()
}

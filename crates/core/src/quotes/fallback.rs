use crate::domain::quote::{Interval, StockData, TimeSeriesPoint};
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;

pub const SYNTHETIC_POINTS: usize = 30;
const UNKNOWN_BASE_PRICE: f64 = 100.0;

// symbol, name, price, change, change %, high, low, volume
const QUOTES: &[(&str, &str, f64, f64, f64, f64, f64, u64)] = &[
    ("AAPL", "Apple Inc.", 182.52, 2.34, 1.3, 185.23, 180.15, 45_200_000),
    ("GOOGL", "Alphabet Inc.", 2847.34, -15.67, -0.55, 2865.12, 2820.45, 28_500_000),
    ("MSFT", "Microsoft Corporation", 378.85, 4.21, 1.12, 382.15, 375.30, 32_100_000),
    ("TSLA", "Tesla Inc.", 248.42, -8.93, -3.47, 255.67, 245.12, 67_800_000),
];

const COMPANY_NAMES: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("GOOGL", "Alphabet Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("AMZN", "Amazon.com Inc."),
    ("TSLA", "Tesla Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("META", "Meta Platforms Inc."),
    ("NFLX", "Netflix Inc."),
    ("AMD", "Advanced Micro Devices Inc."),
    ("INTC", "Intel Corporation"),
];

fn all_quotes() -> impl Iterator<Item = StockData> {
    QUOTES.iter().map(
        |&(symbol, name, price, change, change_percent, high, low, volume)| StockData {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
            change,
            change_percent,
            high,
            low,
            volume,
            market_cap: None,
            pe_ratio: None,
        },
    )
}

/// Expects an already normalized (upper-case) symbol.
pub fn fallback_quote(symbol: &str) -> Option<StockData> {
    all_quotes().find(|q| q.symbol == symbol)
}

pub fn company_name(symbol: &str) -> String {
    COMPANY_NAMES
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("{symbol} Corporation"))
}

/// Case-insensitive substring match over symbol and name.
pub fn search_local(query: &str) -> Vec<StockData> {
    let q = query.trim().to_lowercase();
    all_quotes()
        .filter(|s| s.symbol.to_lowercase().contains(&q) || s.name.to_lowercase().contains(&q))
        .collect()
}

/// Random walk ending exactly at the fallback price (100.0 for unknown symbols), one bar per
/// `interval` step back from `now`.
pub fn synthetic_series(
    symbol: &str,
    interval: Interval,
    points: usize,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Vec<TimeSeriesPoint> {
    let base = fallback_quote(symbol)
        .map(|q| q.price)
        .unwrap_or(UNKNOWN_BASE_PRICE);

    // Walk backwards from the anchor so the latest close is the known price.
    let mut closes = Vec::with_capacity(points + 1);
    let mut price = base;
    closes.push(price);
    for _ in 0..points {
        let step: f64 = rng.random_range(-0.02..=0.02);
        price = (price / (1.0 + step)).max(0.01);
        closes.push(price);
    }
    closes.reverse();

    let format = if interval.is_intraday() {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%Y-%m-%d"
    };

    (0..points)
        .map(|i| {
            let open = closes[i];
            let close = closes[i + 1];
            let high = open.max(close) * (1.0 + rng.random_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.random_range(0.0..0.01));
            let back = (points - 1 - i) as i64;
            let ts = now - TimeDelta::minutes(interval.minutes() * back);

            TimeSeriesPoint {
                timestamp: ts.format(format).to_string(),
                open,
                high,
                low,
                close,
                volume: rng.random_range(10_000_000..60_000_000),
            }
        })
        .collect()
}

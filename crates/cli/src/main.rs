use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockcast_core::domain::quote::{Interval, StockData, TimeSeriesPoint};
use stockcast_core::llm::openrouter::OpenRouterClient;
use stockcast_core::llm::{select_models, DEFAULT_MODELS};
use stockcast_core::predict::{self, PredictionReport};
use stockcast_core::quotes::alpha_vantage::AlphaVantageProvider;
use stockcast_core::quotes::QuoteProvider;

#[derive(Debug, Parser)]
#[command(name = "stockcast")]
struct Args {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Latest quote for one symbol.
    Quote { symbol: String },

    /// OHLCV series, oldest first.
    Series {
        symbol: String,
        /// 1min, 5min, 15min, 30min, 60min, daily, weekly or monthly.
        #[arg(long, default_value = "daily")]
        interval: String,
    },

    /// Symbol search by ticker or company name.
    Search { query: String },

    /// Ask every configured model for a one-week call and print the consensus.
    Predict {
        symbol: String,
        /// Skip the quote lookup and use this price.
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        context: Option<String>,
        /// Comma-separated model ids (default: all).
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let quotes = AlphaVantageProvider::from_settings(&settings)?;

    let result = run(&args, &settings, &quotes).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "command failed");
    }
    result
}

async fn run(
    args: &Args,
    settings: &stockcast_core::config::Settings,
    quotes: &AlphaVantageProvider,
) -> anyhow::Result<()> {
    match &args.command {
        Command::Quote { symbol } => {
            let quote = quotes.get_quote(symbol).await?;
            emit(args.json, &quote, render_quote)
        }
        Command::Series { symbol, interval } => {
            let interval = Interval::parse_or_daily(interval);
            let series = quotes.get_time_series(symbol, interval).await;
            emit(args.json, &series, |s| render_series(s, interval))
        }
        Command::Search { query } => {
            anyhow::ensure!(!query.trim().is_empty(), "query must be non-empty");
            let matches = quotes.search_symbols(query).await;
            emit(args.json, &matches, |m| {
                m.iter().map(render_quote).collect::<Vec<_>>().join("\n")
            })
        }
        Command::Predict {
            symbol,
            price,
            context,
            models,
        } => {
            let endpoints = if models.is_empty() {
                DEFAULT_MODELS.to_vec()
            } else {
                select_models(DEFAULT_MODELS, models)?
            };
            if let Err(err) = settings.require_openrouter_api_key() {
                tracing::warn!(error = %err, "every prediction will come back degraded");
            }

            let request = predict::build_request(quotes, symbol, *price, context.clone()).await?;
            let client = OpenRouterClient::from_settings(settings)?;
            let report = predict::generate_report(&client, &request, &endpoints).await;
            emit(args.json, &report, render_report)
        }
    }
}

fn emit<T: serde::Serialize + ?Sized>(
    json: bool,
    value: &T,
    render: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render(value));
    }
    Ok(())
}

fn render_quote(q: &StockData) -> String {
    format!(
        "{:<6} {:<28} {:>10.2} {:>+8.2} ({:+.2}%)  H {:.2}  L {:.2}  Vol {}",
        q.symbol, q.name, q.price, q.change, q.change_percent, q.high, q.low, q.volume
    )
}

fn render_series(series: &[TimeSeriesPoint], interval: Interval) -> String {
    let mut out = format!("{} bars ({interval})", series.len());
    for p in series {
        out.push_str(&format!(
            "\n{:<19} O {:>10.2} H {:>10.2} L {:>10.2} C {:>10.2} V {}",
            p.timestamp, p.open, p.high, p.low, p.close, p.volume
        ));
    }
    out
}

fn render_report(report: &PredictionReport) -> String {
    let mut out = format!(
        "{} @ {:.2}  (run {})",
        report.symbol, report.current_price, report.run_id
    );
    for p in &report.predictions {
        out.push_str(&format!(
            "\n\n{}: {} {}% -> {:.2} ({:+.2}%), risk {}, {}\n  {}",
            p.model,
            p.direction,
            p.confidence,
            p.target_price,
            p.upside_pct(report.current_price),
            p.risk_level,
            p.timeframe,
            p.reasoning
        ));
    }
    if let Some(c) = &report.consensus {
        out.push_str(&format!(
            "\n\nConsensus: {} ({} bullish / {} bearish / {} neutral of {}), avg confidence {:.1}%, avg target {:.2}",
            c.direction,
            c.bullish,
            c.bearish,
            c.neutral,
            c.models,
            c.average_confidence,
            c.average_target_price
        ));
    }
    out
}

fn init_sentry(settings: &stockcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockcast_core::domain::quote::{Interval, StockData, TimeSeriesPoint};
use stockcast_core::llm::openrouter::OpenRouterClient;
use stockcast_core::llm::{select_models, ChatCompletionClient, ModelDescriptor, DEFAULT_MODELS};
use stockcast_core::predict::{self, PredictionReport};
use stockcast_core::quotes::alpha_vantage::AlphaVantageProvider;
use stockcast_core::quotes::{QuoteProvider, SymbolNotFound};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if let Err(err) = settings.require_openrouter_api_key() {
        tracing::warn!(error = %err, "every prediction will come back degraded");
    }

    let quotes = AlphaVantageProvider::from_settings(&settings)?;
    if !quotes.is_live() {
        tracing::warn!("ALPHA_VANTAGE_API_KEY missing or demo; serving fallback market data");
    }

    let state = AppState {
        llm: Arc::new(OpenRouterClient::from_settings(&settings)?),
        quotes: Arc::new(quotes),
        models: DEFAULT_MODELS,
    };

    let quote_provider = state.quotes.provider_name();
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/models", get(list_models))
        .route("/quotes/:symbol", get(get_quote))
        .route("/quotes/:symbol/series", get(get_series))
        .route("/search", get(search))
        .route("/predictions", post(create_predictions))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, quote_provider, models = DEFAULT_MODELS.len(), "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    llm: Arc<dyn ChatCompletionClient>,
    quotes: Arc<dyn QuoteProvider>,
    models: &'static [ModelDescriptor],
}

type ApiError = (StatusCode, String);

/// Unknown symbols are the only quote error callers are expected to handle.
fn quote_error(e: anyhow::Error) -> ApiError {
    if e.downcast_ref::<SymbolNotFound>().is_some() {
        return (StatusCode::NOT_FOUND, e.to_string());
    }
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "quote lookup failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
}

async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelDescriptor>> {
    Json(state.models.to_vec())
}

async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StockData>, ApiError> {
    let quote = state.quotes.get_quote(&symbol).await.map_err(quote_error)?;
    Ok(Json(quote))
}

#[derive(Debug, Deserialize)]
struct SeriesParams {
    interval: Option<String>,
}

async fn get_series(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<SeriesParams>,
) -> Json<Vec<TimeSeriesPoint>> {
    let interval = params
        .interval
        .as_deref()
        .map(Interval::parse_or_daily)
        .unwrap_or_default();
    Json(state.quotes.get_time_series(&symbol, interval).await)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<StockData>>, ApiError> {
    if params.q.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query must be non-empty".to_string()));
    }
    Ok(Json(state.quotes.search_symbols(&params.q).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionBody {
    symbol: String,
    current_price: Option<f64>,
    market_context: Option<String>,
    /// Model ids; all configured models when absent.
    models: Option<Vec<String>>,
}

async fn create_predictions(
    State(state): State<AppState>,
    Json(body): Json<PredictionBody>,
) -> Result<Json<PredictionReport>, ApiError> {
    let endpoints = match &body.models {
        Some(ids) => select_models(state.models, ids)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => state.models.to_vec(),
    };

    let request = predict::build_request(
        state.quotes.as_ref(),
        &body.symbol,
        body.current_price,
        body.market_context,
    )
    .await
    .map_err(request_error)?;

    let report = predict::generate_report(state.llm.as_ref(), &request, &endpoints).await;
    Ok(Json(report))
}

/// `build_request` only fails on an unknown symbol or on input it rejects.
fn request_error(e: anyhow::Error) -> ApiError {
    match e.downcast_ref::<SymbolNotFound>() {
        Some(_) => (StatusCode::NOT_FOUND, e.to_string()),
        None => (StatusCode::BAD_REQUEST, format!("{e:#}")),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

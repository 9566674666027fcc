//! Prediction fan-out: one request per model, joined, each outcome normalized on its own.

pub mod prompt;

use crate::domain::consensus::{derive_consensus, ConsensusSummary};
use crate::domain::contract::LlmPrediction;
use crate::domain::prediction::{
    Direction, NormalizedPrediction, PredictionRequest, RiskLevel, TIMEFRAME,
};
use crate::llm::error::EndpointError;
use crate::llm::json;
use crate::llm::{ChatCompletionClient, ModelDescriptor};
use crate::quotes::{normalize_symbol, QuoteProvider};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

/// What came back from one endpoint, before it is mapped onto the uniform record.
#[derive(Debug, Clone)]
pub enum EndpointOutcome {
    Success(LlmPrediction),
    /// No usable answer: status, network, timeout, credential or envelope failure.
    TransportFailure(String),
    /// An answer arrived but it is not a prediction object.
    ParseFailure(String),
}

impl EndpointOutcome {
    pub fn from_completion(result: anyhow::Result<String>) -> Self {
        match result {
            Ok(text) => match json::parse_prediction(&text) {
                Ok(raw) => Self::Success(raw),
                Err(err) => Self::ParseFailure(format!("{err:#}")),
            },
            Err(err) => Self::TransportFailure(describe_transport_error(&err)),
        }
    }
}

fn describe_transport_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<EndpointError>() {
        Some(diag) => {
            if let Some(raw) = diag.raw_output.as_deref() {
                tracing::debug!(model = diag.model, stage = diag.stage, raw, "endpoint raw output");
            }
            diag.detail.clone()
        }
        None => format!("{err:#}"),
    }
}

pub fn normalize(
    model: &ModelDescriptor,
    request: &PredictionRequest,
    outcome: EndpointOutcome,
) -> NormalizedPrediction {
    let degraded = |confidence: u8, risk_level: RiskLevel, reasoning: String| {
        NormalizedPrediction {
            model: model.name.to_string(),
            direction: Direction::Neutral,
            confidence,
            target_price: request.current_price(),
            timeframe: TIMEFRAME.to_string(),
            reasoning,
            risk_level,
        }
    };

    match outcome {
        EndpointOutcome::Success(raw) => raw.into_normalized(model.name, request.current_price()),
        EndpointOutcome::TransportFailure(reason) => degraded(
            0,
            RiskLevel::High,
            format!("Error: Unable to get prediction from {}. {reason}", model.name),
        ),
        EndpointOutcome::ParseFailure(reason) => degraded(
            50,
            RiskLevel::Medium,
            format!("Unable to parse AI response from {} properly. {reason}", model.name),
        ),
    }
}

async fn query_endpoint(
    client: &dyn ChatCompletionClient,
    model: &ModelDescriptor,
    request: &PredictionRequest,
    prompt: &str,
) -> NormalizedPrediction {
    let outcome = EndpointOutcome::from_completion(client.complete(model, prompt).await);

    match &outcome {
        EndpointOutcome::Success(_) => {
            tracing::debug!(
                model = model.name,
                symbol = request.symbol(),
                "prediction received"
            );
        }
        EndpointOutcome::TransportFailure(reason) => {
            tracing::warn!(
                model = model.name,
                symbol = request.symbol(),
                error = %reason,
                "prediction endpoint failed; using degraded record"
            );
        }
        EndpointOutcome::ParseFailure(reason) => {
            tracing::warn!(
                model = model.name,
                symbol = request.symbol(),
                error = %reason,
                "prediction response unparseable; using degraded record"
            );
        }
    }

    normalize(model, request, outcome)
}

/// Queries every endpoint concurrently and waits for all of them. Always returns exactly one
/// record per endpoint; failures are folded into degraded records rather than returned.
/// Callers should match records to models by name, not position.
pub async fn request_predictions(
    client: &dyn ChatCompletionClient,
    request: &PredictionRequest,
    endpoints: &[ModelDescriptor],
) -> Vec<NormalizedPrediction> {
    let prompt = prompt::prediction_prompt(request);
    let calls = endpoints
        .iter()
        .map(|model| query_endpoint(client, model, request, &prompt));
    futures::future::join_all(calls).await
}

/// Builds the fan-out input from what a caller supplied. Without a price the live quote is
/// looked up (which fails only for unknown symbols) and its change feeds the market context.
pub async fn build_request(
    quotes: &dyn QuoteProvider,
    symbol: &str,
    current_price: Option<f64>,
    market_context: Option<String>,
) -> anyhow::Result<PredictionRequest> {
    anyhow::ensure!(!symbol.trim().is_empty(), "symbol must be non-empty");

    let market_context = market_context
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    match current_price {
        Some(price) => {
            let context = market_context
                .unwrap_or_else(|| {
                    format!("Current market conditions for {}.", normalize_symbol(symbol))
                });
            PredictionRequest::try_new(symbol, price, context)
        }
        None => {
            let quote = quotes.get_quote(symbol).await?;
            let context = market_context.unwrap_or_else(|| quote.market_context());
            PredictionRequest::try_new(&quote.symbol, quote.price, context)
        }
    }
}

/// One complete fan-out result as handed to a display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub symbol: String,
    pub current_price: f64,
    pub predictions: Vec<NormalizedPrediction>,
    pub consensus: Option<ConsensusSummary>,
}

pub async fn generate_report(
    client: &dyn ChatCompletionClient,
    request: &PredictionRequest,
    endpoints: &[ModelDescriptor],
) -> PredictionReport {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "prediction_run",
        %run_id,
        provider = ?client.provider(),
        symbol = request.symbol()
    );

    async move {
        let started = std::time::Instant::now();
        let predictions = request_predictions(client, request, endpoints).await;
        let consensus = derive_consensus(&predictions);

        tracing::info!(
            models = predictions.len(),
            consensus = ?consensus.as_ref().map(|c| c.direction),
            elapsed_ms = started.elapsed().as_millis(),
            "prediction fan-out complete"
        );

        PredictionReport {
            run_id,
            generated_at: Utc::now(),
            symbol: request.symbol().to_string(),
            current_price: request.current_price(),
            predictions,
            consensus,
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consensus::ConsensusLabel;
    use crate::llm::{Provider, DEFAULT_MODELS};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    enum Script {
        Reply(&'static str),
        Fail(&'static str),
    }

    /// Scripted stand-in for the network, keyed by model id. Every call waits `delay` so that
    /// the in-flight high-water mark shows whether calls overlap.
    struct FakeClient {
        scripts: HashMap<&'static str, Script>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(scripts: &[(&'static str, Script)]) -> Self {
            Self {
                scripts: scripts.iter().cloned().collect(),
                delay: Duration::from_millis(20),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatCompletionClient for FakeClient {
        fn provider(&self) -> Provider {
            Provider::OpenRouter
        }

        async fn complete(&self, model: &ModelDescriptor, prompt: &str) -> anyhow::Result<String> {
            assert!(prompt.contains("Stock Symbol:"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.scripts.get(model.id) {
                Some(Script::Reply(text)) => Ok((*text).to_string()),
                Some(Script::Fail(reason)) => Err(anyhow::anyhow!(*reason)),
                None => Err(anyhow::anyhow!("no script for {}", model.id)),
            }
        }
    }

    #[tokio::test]
    async fn build_request_fills_price_and_context_from_quote() {
        let quotes = crate::quotes::alpha_vantage::AlphaVantageProvider::from_settings(
            &crate::config::Settings::default(),
        )
        .unwrap();

        let req = build_request(&quotes, "msft", None, None).await.unwrap();
        assert_eq!(req.symbol(), "MSFT");
        assert_eq!(req.current_price(), 378.85);
        assert_eq!(
            req.market_context(),
            "Current market conditions for Microsoft Corporation (MSFT). Recent change: 1.12%"
        );

        let req = build_request(&quotes, "ZZZZ", Some(12.5), Some("  ".to_string()))
            .await
            .unwrap();
        assert_eq!(req.current_price(), 12.5);
        assert_eq!(req.market_context(), "Current market conditions for ZZZZ.");

        let err = build_request(&quotes, "ZZZZ", None, None).await.unwrap_err();
        assert!(err.downcast_ref::<crate::quotes::SymbolNotFound>().is_some());

        assert!(build_request(&quotes, "AAPL", Some(-1.0), None).await.is_err());
    }

    #[tokio::test]
    async fn blank_symbol_is_rejected_before_quote_lookup() {
        let quotes = crate::quotes::alpha_vantage::AlphaVantageProvider::from_settings(
            &crate::config::Settings::default(),
        )
        .unwrap();

        for symbol in ["", "   "] {
            let err = build_request(&quotes, symbol, None, None).await.unwrap_err();
            assert!(err.downcast_ref::<crate::quotes::SymbolNotFound>().is_none());
            assert!(err.to_string().contains("symbol must be non-empty"));
        }
    }

    const VALID_BULLISH: &str = r#"{"direction":"Bullish","confidence":85,"targetPrice":190,"riskLevel":"Low","reasoning":"Services revenue keeps compounding."}"#;

    fn aapl() -> PredictionRequest {
        PredictionRequest::try_new("AAPL", 182.52, "Recent change: 1.30%").unwrap()
    }

    fn by_model<'a>(preds: &'a [NormalizedPrediction], name: &str) -> &'a NormalizedPrediction {
        preds.iter().find(|p| p.model == name).unwrap()
    }

    #[tokio::test]
    async fn mixed_outcomes_end_to_end() {
        let client = FakeClient::new(&[
            ("gpt-oss-120b", Script::Reply(VALID_BULLISH)),
            ("gemini-2.5-flash", Script::Fail("operation timed out")),
            (
                "mistral-small",
                Script::Reply("I think Apple will probably go up, but who knows."),
            ),
        ]);

        let report = generate_report(&client, &aapl(), DEFAULT_MODELS).await;
        let preds = &report.predictions;
        assert_eq!(preds.len(), 3);
        assert_eq!(report.symbol, "AAPL");

        let a = by_model(preds, "GPT OSS 120B");
        assert_eq!(a.direction, Direction::Bullish);
        assert_eq!(a.confidence, 85);
        assert_eq!(a.target_price, 190.0);
        assert_eq!(a.risk_level, RiskLevel::Low);
        assert_eq!(a.reasoning, "Services revenue keeps compounding.");

        let b = by_model(preds, "Gemini 2.5 Flash");
        assert_eq!(
            (b.direction, b.confidence, b.risk_level),
            (Direction::Neutral, 0, RiskLevel::High)
        );
        assert_eq!(b.target_price, 182.52);
        assert!(b.reasoning.contains("Gemini 2.5 Flash"));
        assert!(b.reasoning.contains("operation timed out"));

        let c = by_model(preds, "Mistral Small 3.2");
        assert_eq!(
            (c.direction, c.confidence, c.risk_level),
            (Direction::Neutral, 50, RiskLevel::Medium)
        );
        assert_eq!(c.target_price, 182.52);

        let consensus = report.consensus.unwrap();
        assert_eq!(consensus.direction, ConsensusLabel::Mixed);
        assert_eq!(consensus.average_confidence, 45.0);
    }

    #[tokio::test]
    async fn total_outage_still_yields_full_set() {
        let client = FakeClient::new(&[]);
        let preds = request_predictions(&client, &aapl(), DEFAULT_MODELS).await;
        assert_eq!(preds.len(), DEFAULT_MODELS.len());
        for p in &preds {
            assert_eq!(p.direction, Direction::Neutral);
            assert_eq!(p.confidence, 0);
            assert_eq!(p.risk_level, RiskLevel::High);
            assert!(p.reasoning.starts_with("Error: Unable to get prediction from"));
        }
    }

    #[tokio::test]
    async fn one_record_per_endpoint_for_any_subset() {
        let client = FakeClient::new(&[
            ("gpt-oss-120b", Script::Reply(VALID_BULLISH)),
            ("mistral-small", Script::Reply("```json\n{\"confidence\": 250}\n```")),
        ]);

        for n in 0..=DEFAULT_MODELS.len() {
            let endpoints = &DEFAULT_MODELS[..n];
            let preds = request_predictions(&client, &aapl(), endpoints).await;
            assert_eq!(preds.len(), n);
            for (p, m) in preds.iter().zip(endpoints) {
                assert!(endpoints.iter().any(|e| e.name == p.model));
                assert!(p.confidence <= 100, "confidence out of range for {}", m.name);
            }
        }
    }

    #[tokio::test]
    async fn endpoints_are_queried_concurrently() {
        let client = FakeClient::new(&[
            ("gpt-oss-120b", Script::Reply(VALID_BULLISH)),
            ("gemini-2.5-flash", Script::Reply(VALID_BULLISH)),
            ("mistral-small", Script::Reply(VALID_BULLISH)),
        ]);
        let preds = request_predictions(&client, &aapl(), DEFAULT_MODELS).await;
        assert_eq!(preds.len(), 3);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn parse_and_transport_tiers_differ() {
        let model = &DEFAULT_MODELS[0];
        let req = aapl();

        let parse = normalize(
            model,
            &req,
            EndpointOutcome::from_completion(Ok("not json at all".to_string())),
        );
        let transport = normalize(
            model,
            &req,
            EndpointOutcome::from_completion(Err(anyhow::anyhow!("connection refused"))),
        );

        assert_eq!((parse.confidence, parse.risk_level), (50, RiskLevel::Medium));
        assert_eq!(
            (transport.confidence, transport.risk_level),
            (0, RiskLevel::High)
        );
        assert_eq!(parse.direction, Direction::Neutral);
        assert_eq!(transport.direction, Direction::Neutral);
    }

    #[test]
    fn endpoint_diagnostics_surface_their_detail() {
        let err: anyhow::Error = EndpointError {
            provider: Provider::OpenRouter,
            model: "GPT OSS 120B",
            stage: "http",
            detail: "API request failed: 429 Too Many Requests".to_string(),
            raw_output: None,
        }
        .into();
        let p = normalize(
            &DEFAULT_MODELS[0],
            &aapl(),
            EndpointOutcome::from_completion(Err(err)),
        );
        assert_eq!(
            p.reasoning,
            "Error: Unable to get prediction from GPT OSS 120B. API request failed: 429 Too Many Requests"
        );
    }

    #[test]
    fn answer_echoing_both_direction_keys_is_a_success() {
        let p = normalize(
            &DEFAULT_MODELS[0],
            &aapl(),
            EndpointOutcome::from_completion(Ok(r#"{"prediction":"Bullish","direction":"Bullish","confidence":85,"targetPrice":190,"riskLevel":"Low","reasoning":"ok"}"#.to_string())),
        );
        assert_eq!(p.direction, Direction::Bullish);
        assert_eq!(p.confidence, 85);
        assert_eq!(p.target_price, 190.0);
        assert_eq!(p.risk_level, RiskLevel::Low);
        assert_eq!(p.reasoning, "ok");
    }

    #[test]
    fn partial_payload_uses_field_defaults() {
        let p = normalize(
            &DEFAULT_MODELS[1],
            &aapl(),
            EndpointOutcome::from_completion(Ok(
                r#"{"prediction":"Bearish","confidence":-12}"#.to_string()
            )),
        );
        assert_eq!(p.direction, Direction::Bearish);
        assert_eq!(p.confidence, 0);
        assert_eq!(p.target_price, 182.52);
        assert_eq!(p.risk_level, RiskLevel::Medium);
        assert_eq!(p.model, "Gemini 2.5 Flash");
    }
}

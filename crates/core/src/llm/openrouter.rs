use crate::config::{env_parse, Settings};
use crate::llm::error::EndpointError;
use crate::llm::{ChatCompletionClient, ModelDescriptor, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_ORIGIN: &str = "http://localhost:5173";
const APP_TITLE: &str = "AI Stock Predictor";
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const TEMPERATURE: f32 = 0.3;

/// Chat-completions client for OpenRouter. One instance serves every model in the table; the
/// model is chosen per call.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    origin: String,
    max_tokens: u32,
}

impl OpenRouterClient {
    /// A missing API key is not an error here: every call then fails at the transport stage and
    /// the fan-out degrades those records instead.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout_secs =
            env_parse::<u64>("OPENROUTER_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS);
        let max_tokens = env_parse::<u32>("OPENROUTER_MAX_TOKENS").unwrap_or(DEFAULT_MAX_TOKENS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: settings.openrouter_api_key.clone(),
            base_url: settings
                .openrouter_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            origin: settings
                .app_origin
                .clone()
                .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            max_tokens,
        })
    }

    fn headers(&self, model: &ModelDescriptor) -> anyhow::Result<HeaderMap> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(EndpointError {
                provider: Provider::OpenRouter,
                model: model.name,
                stage: "config",
                detail: "OPENROUTER_API_KEY is not configured".to_string(),
                raw_output: None,
            }
            .into());
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))?,
        );
        headers.insert("http-referer", HeaderValue::from_str(&self.origin)?);
        headers.insert("x-title", HeaderValue::from_static(APP_TITLE));
        Ok(headers)
    }

    fn request_body(&self, model: &ModelDescriptor, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.endpoint.to_string(),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: TEMPERATURE,
        }
    }

    async fn create_completion(
        &self,
        model: &ModelDescriptor,
        req: ChatCompletionRequest,
    ) -> anyhow::Result<String> {
        let headers = self.headers(model)?;
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("OpenRouter request for {} failed", model.name))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read OpenRouter response body")?;
        if !status.is_success() {
            return Err(EndpointError {
                provider: Provider::OpenRouter,
                model: model.name,
                stage: "http",
                detail: format!("API request failed: {status}"),
                raw_output: Some(text),
            }
            .into());
        }

        Self::response_text(model, &text)
    }

    /// Pulls `choices[0].message.content` out of a completion envelope.
    fn response_text(model: &ModelDescriptor, body: &str) -> anyhow::Result<String> {
        let diag = |stage: &'static str, detail: String| EndpointError {
            provider: Provider::OpenRouter,
            model: model.name,
            stage,
            detail,
            raw_output: Some(body.to_string()),
        };

        let parsed = serde_json::from_str::<ChatCompletionResponse>(body)
            .map_err(|e| diag("envelope", format!("unexpected response envelope: {e}")))?;

        // OpenRouter reports some upstream failures inside a 200 body.
        if let Some(err) = parsed.error {
            return Err(diag("upstream", format!("upstream error: {}", err.message)).into());
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty());

        content.ok_or_else(|| {
            diag("empty_content", "No response content received".to_string()).into()
        })
    }
}

#[async_trait::async_trait]
impl ChatCompletionClient for OpenRouterClient {
    fn provider(&self) -> Provider {
        Provider::OpenRouter
    }

    async fn complete(&self, model: &ModelDescriptor, prompt: &str) -> anyhow::Result<String> {
        let req = self.request_body(model, prompt);
        self.create_completion(model, req).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,

    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: String,
}

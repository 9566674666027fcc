use crate::llm::Provider;
use std::fmt;

#[derive(Debug, Clone)]
pub struct EndpointError {
    pub provider: Provider,
    pub model: &'static str,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, model={}, stage={}): {}",
            self.provider, self.model, self.stage, self.detail
        )
    }
}

impl std::error::Error for EndpointError {}

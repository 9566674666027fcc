pub mod error;
pub mod json;
pub mod openrouter;

use serde::Serialize;

/// One upstream model the fan-out can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub endpoint: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "gpt-oss-120b",
        name: "GPT OSS 120B",
        endpoint: "openai/gpt-oss-120b:free",
        description: "Advanced language model for financial analysis",
    },
    ModelDescriptor {
        id: "gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        endpoint: "google/gemini-2.5-flash-image-preview:free",
        description: "Google's latest multimodal AI for market insights",
    },
    ModelDescriptor {
        id: "mistral-small",
        name: "Mistral Small 3.2",
        endpoint: "mistralai/mistral-small-3.2-24b-instruct:free",
        description: "Efficient model for quick financial predictions",
    },
];

/// Resolves `ids` against `table`, keeping table order. Fails on unknown ids or an empty
/// selection.
pub fn select_models<S: AsRef<str>>(
    table: &[ModelDescriptor],
    ids: &[S],
) -> anyhow::Result<Vec<ModelDescriptor>> {
    anyhow::ensure!(!ids.is_empty(), "at least one model must be selected");

    let unknown: Vec<&str> = ids
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| !table.iter().any(|m| m.id == *id))
        .collect();
    anyhow::ensure!(
        unknown.is_empty(),
        "unknown model id(s): {}",
        unknown.join(", ")
    );

    Ok(table
        .iter()
        .filter(|m| ids.iter().any(|id| id.as_ref() == m.id))
        .copied()
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
}

/// Seam between the fan-out and the network: returns the raw completion text for one prompt.
///
/// Any `Err` is a transport-level failure (status, network, timeout, unusable envelope).
/// Interpreting the text is the caller's job.
#[async_trait::async_trait]
pub trait ChatCompletionClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, model: &ModelDescriptor, prompt: &str) -> anyhow::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_unique_ids() {
        let mut ids: Vec<_> = DEFAULT_MODELS.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), DEFAULT_MODELS.len());
    }

    #[test]
    fn select_keeps_table_order() {
        let picked = select_models(DEFAULT_MODELS, &["mistral-small", "gpt-oss-120b"]).unwrap();
        let names: Vec<_> = picked.iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["GPT OSS 120B", "Mistral Small 3.2"]);
    }

    #[test]
    fn select_rejects_unknown_and_empty() {
        let err = select_models(DEFAULT_MODELS, &["gpt-4", "mistral-small"]).unwrap_err();
        assert!(err.to_string().contains("gpt-4"));

        let none: [&str; 0] = [];
        assert!(select_models(DEFAULT_MODELS, &none).is_err());
    }
}

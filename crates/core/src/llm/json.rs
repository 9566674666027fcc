use crate::domain::contract::LlmPrediction;
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.split_once('\n').map(|(_, rest)| rest) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Reads a model's completion text as a prediction object. Missing keys are fine; anything
/// that is not a JSON object is an error.
pub fn parse_prediction(text: &str) -> anyhow::Result<LlmPrediction> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let value = serde_json::from_str::<serde_json::Value>(&json_str)
        .with_context(|| format!("model output is not valid JSON: {}", preview(&json_str)))?;
    anyhow::ensure!(
        value.is_object(),
        "model output is JSON but not an object: {}",
        preview(&json_str)
    );
    serde_json::from_value::<LlmPrediction>(value)
        .context("model output does not match the prediction shape")
}

fn preview(s: &str) -> String {
    const MAX: usize = 120;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "Sure! Here it is: {\"a\":1} Hope that helps.";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn extract_json_none_without_braces() {
        assert_eq!(extract_json("I cannot predict markets."), None);
    }

    #[test]
    fn parse_prediction_accepts_full_object() {
        let text = json!({
            "direction": "Bullish",
            "confidence": 85,
            "targetPrice": 190.0,
            "riskLevel": "Medium",
            "reasoning": "Earnings momentum."
        })
        .to_string();
        let p = parse_prediction(&text).unwrap();
        assert_eq!(p.direction, Some(json!("Bullish")));
        assert_eq!(p.confidence, Some(json!(85)));
        assert_eq!(p.target_price, Some(json!(190.0)));
    }

    #[test]
    fn parse_prediction_accepts_legacy_and_snake_case_keys() {
        let text = r#"{"prediction":"Bearish","target_price":"170.5","risk_level":"High"}"#;
        let p = parse_prediction(text).unwrap();
        assert_eq!(p.direction, Some(json!("Bearish")));
        assert_eq!(p.target_price, Some(json!("170.5")));
        assert_eq!(p.risk_level, Some(json!("High")));
        assert_eq!(p.reasoning, None);
    }

    #[test]
    fn parse_prediction_rejects_prose_and_non_objects() {
        assert!(parse_prediction("The stock looks fine to me.").is_err());
        assert!(parse_prediction("[1, 2, 3]").is_err());
        assert!(parse_prediction("42").is_err());
        assert!(parse_prediction("").is_err());
    }
}

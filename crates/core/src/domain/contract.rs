use crate::domain::prediction::{Direction, NormalizedPrediction, RiskLevel, TIMEFRAME};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CONFIDENCE: u8 = 50;
pub const DEFAULT_REASONING: &str = "Analysis completed.";

/// What a model is asked to return. Every key is optional and loosely typed: models send
/// numbers as strings, use the older `prediction` key, or drop fields entirely.
///
/// The alternate spellings are separate fields, so an answer that carries both spellings of a
/// key still decodes. The camelCase key wins when both are usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmPrediction {
    #[serde(default)]
    pub direction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Value>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub target_price: Option<Value>,
    #[serde(default, rename = "target_price", skip_serializing_if = "Option::is_none")]
    pub target_price_snake: Option<Value>,
    #[serde(default)]
    pub risk_level: Option<Value>,
    #[serde(default, rename = "risk_level", skip_serializing_if = "Option::is_none")]
    pub risk_level_snake: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<Value>,
}

impl LlmPrediction {
    /// Field-level defaults: absent or unusable values are replaced, out-of-range confidence is
    /// clamped. Never fails.
    pub fn into_normalized(self, model: &str, current_price: f64) -> NormalizedPrediction {
        let confidence = self
            .confidence
            .as_ref()
            .and_then(value_as_f64)
            .map(|c| c.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(DEFAULT_CONFIDENCE);

        let target_price = [&self.target_price, &self.target_price_snake]
            .into_iter()
            .filter_map(|v| v.as_ref().and_then(value_as_f64))
            .find(|p| *p > 0.0)
            .unwrap_or(current_price);

        let direction = [&self.direction, &self.prediction]
            .into_iter()
            .find_map(|v| v.as_ref().and_then(Value::as_str).and_then(Direction::parse_loose))
            .unwrap_or(Direction::Neutral);

        let risk_level = [&self.risk_level, &self.risk_level_snake]
            .into_iter()
            .find_map(|v| v.as_ref().and_then(Value::as_str).and_then(RiskLevel::parse_loose))
            .unwrap_or(RiskLevel::Medium);

        let reasoning = self
            .reasoning
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_REASONING)
            .to_string();

        NormalizedPrediction {
            model: model.to_string(),
            direction,
            confidence,
            target_price,
            timeframe: TIMEFRAME.to_string(),
            reasoning,
            risk_level,
        }
    }
}

/// Numbers, or strings like `"85"`, `"85%"`, `"$190.50"`. Non-finite values are rejected.
fn value_as_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .trim_end_matches('%')
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

use crate::domain::prediction::{Direction, NormalizedPrediction};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusLabel {
    Bullish,
    Bearish,
    Mixed,
}

impl fmt::Display for ConsensusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
            Self::Mixed => "Mixed",
        };
        f.write_str(s)
    }
}

/// Aggregate view over one prediction set. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusSummary {
    pub direction: ConsensusLabel,
    pub average_confidence: f64,
    pub average_target_price: f64,
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    pub models: usize,
}

/// Majority vote plus unweighted means. Degraded records count like any other.
///
/// Returns `None` for an empty set; there is nothing to average.
pub fn derive_consensus(predictions: &[NormalizedPrediction]) -> Option<ConsensusSummary> {
    if predictions.is_empty() {
        return None;
    }

    let count = |d: Direction| predictions.iter().filter(|p| p.direction == d).count();
    let bullish = count(Direction::Bullish);
    let bearish = count(Direction::Bearish);
    let neutral = count(Direction::Neutral);

    // Only a strict winner over both other buckets counts. A Neutral winner is reported as
    // Mixed: it carries no directional call.
    let direction = if bullish > bearish && bullish > neutral {
        ConsensusLabel::Bullish
    } else if bearish > bullish && bearish > neutral {
        ConsensusLabel::Bearish
    } else {
        ConsensusLabel::Mixed
    };

    let n = predictions.len() as f64;
    let average_confidence = predictions
        .iter()
        .map(|p| f64::from(p.confidence))
        .sum::<f64>()
        / n;
    let average_target_price = predictions.iter().map(|p| p.target_price).sum::<f64>() / n;

    Some(ConsensusSummary {
        direction,
        average_confidence,
        average_target_price,
        bullish,
        bearish,
        neutral,
        models: predictions.len(),
    })
}

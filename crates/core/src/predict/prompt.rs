use crate::domain::prediction::PredictionRequest;

pub fn prediction_prompt(request: &PredictionRequest) -> String {
    let head = format!(
        "You are a professional financial analyst AI. Analyze the following stock and provide a prediction.\n\n\
Stock Symbol: {}\n\
Current Price: ${:.2}\n\
Market Context: {}\n",
        request.symbol(),
        request.current_price(),
        request.market_context().trim(),
    );

    let body = [
        "",
        "Based on the provided information, please provide:",
        "1. Your direction call (Bullish/Bearish/Neutral)",
        "2. Confidence level (0-100)",
        "3. Target price for next week",
        "4. Risk level (Low/Medium/High)",
        "5. Brief reasoning (2-3 sentences)",
        "",
        "Respond in this exact JSON format:",
        "{",
        "  \"direction\": \"Bullish|Bearish|Neutral\",",
        "  \"confidence\": 85,",
        "  \"targetPrice\": 185.50,",
        "  \"riskLevel\": \"Low|Medium|High\",",
        "  \"reasoning\": \"Your analysis here...\"",
        "}",
        "",
        "Important: Only respond with valid JSON. Do not include any other text.",
    ]
    .join("\n");

    head + &body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_request_fields_and_schema() {
        let req = PredictionRequest::try_new("aapl", 182.5, "Recent change: 1.30%").unwrap();
        let prompt = prediction_prompt(&req);
        assert!(prompt.contains("Stock Symbol: AAPL"));
        assert!(prompt.contains("Current Price: $182.50"));
        assert!(prompt.contains("Market Context: Recent change: 1.30%"));
        assert!(prompt.contains("\"targetPrice\""));
        assert!(prompt.ends_with("Do not include any other text."));
    }
}

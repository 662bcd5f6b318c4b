//! Forecaster backed by an OpenAI-compatible chat-completions endpoint.
//!
//! The model is prompted with the snapshot JSON and must answer with JSON only:
//!
//! ```json
//! {"predictions":[{"product_id":"TEL-4567","prediction_date":"14.01.2025",
//!   "days_until_stockout":4,"recommended_order":65,"confidence_score":0.8}],
//!  "confidence":0.8}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use smartwh_core::ProductId;

use crate::model::{Forecast, ForecastBatch, ForecastModel};
use crate::request::InventorySnapshot;
use crate::result::AiError;

const SYSTEM_PROMPT: &str = "You are an AI assistant analysing warehouse stock. \
Analyse the inventory data and forecast stock levels. Reply with JSON ONLY.";

#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ChatCompletionConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: "GigaChat".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatCompletionForecaster {
    client: reqwest::Client,
    config: ChatCompletionConfig,
}

impl ChatCompletionForecaster {
    pub fn new(config: ChatCompletionConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct WireBatch {
    predictions: Vec<WirePrediction>,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    product_id: ProductId,
    prediction_date: String,
    days_until_stockout: i64,
    recommended_order: i64,
    confidence_score: f64,
}

fn user_prompt(snapshot: &InventorySnapshot) -> Result<String, AiError> {
    let data = serde_json::to_string(snapshot)
        .map_err(|e| AiError::invalid_input(format!("snapshot not serializable: {e}")))?;
    Ok(format!(
        "Analyse the warehouse stock data in this JSON {data} and forecast stock for the next {days} days. \
For each product analyse the consumption trend and forecast:\n\
1. Days until the stock runs out (days_until_stockout)\n\
2. Recommended order quantity (recommended_order)\n\
3. Forecast confidence from 0.0 to 1.0 (confidence_score)\n\
Answer in this JSON format, with prediction_date as dd.mm.yyyy:\n\
{{\"predictions\":[{{\"product_id\":string,\"prediction_date\":string,\"days_until_stockout\":int,\
\"recommended_order\":int,\"confidence_score\":float}}],\"confidence\":float}}\n\
JSON only, no additional text.",
        days = snapshot.period_days,
    ))
}

/// Accepts `dd.mm.yyyy` (what the model is asked for) and ISO `yyyy-mm-dd`.
pub(crate) fn parse_prediction_date(raw: &str) -> Result<NaiveDate, AiError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| AiError::malformed(format!("unparseable prediction_date {raw:?}")))
}

/// Parse the assistant message content, tolerating a markdown code fence.
pub(crate) fn parse_content(content: &str) -> Result<ForecastBatch, AiError> {
    let body = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let wire: WireBatch =
        serde_json::from_str(body).map_err(|e| AiError::malformed(e.to_string()))?;

    let forecasts = wire
        .predictions
        .into_iter()
        .map(|p| {
            Ok(Forecast {
                predicted_date: parse_prediction_date(&p.prediction_date)?,
                product_id: p.product_id,
                days_until_stockout: p.days_until_stockout,
                recommended_order: p.recommended_order.max(0),
                confidence: p.confidence_score.clamp(0.0, 1.0),
            })
        })
        .collect::<Result<Vec<_>, AiError>>()?;

    Ok(ForecastBatch {
        forecasts,
        confidence: wire.confidence.clamp(0.0, 1.0),
    })
}

#[async_trait]
impl ForecastModel for ChatCompletionForecaster {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn forecast(&self, snapshot: &InventorySnapshot) -> Result<ForecastBatch, AiError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(snapshot)?,
                },
            ],
            temperature: 0.2,
            top_p: 0.2,
            max_tokens: 2000,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::malformed(e.to_string()))?;
        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::malformed("empty choices"))?;

        let batch = parse_content(&choice.message.content)?;
        tracing::debug!(
            model = %self.config.model,
            forecasts = batch.forecasts.len(),
            "chat-completions forecast parsed"
        );
        Ok(batch)
    }
}

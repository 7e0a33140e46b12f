use crate::config::ServiceConfig;
use crate::tasks::prompts::GenerationRequest;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

/// Remote model that turns a prompt (and optional attachment) into text.
#[async_trait]
pub trait StudyGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;
}

/// Gemini `generateContent` REST client. Built once at startup and shared.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.gemini_api_key.clone(),
            config.model.clone(),
            config.gemini_base_url.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

fn build_payload(request: &GenerationRequest) -> Value {
    let mut parts = vec![json!({ "text": request.prompt() })];

    if let Some(attachment) = request.attachment() {
        parts.push(json!({
            "inline_data": {
                "mime_type": attachment.mime_type,
                "data": attachment.data,
            }
        }));
    }

    json!({
        "contents": [
            {
                "role": "user",
                "parts": parts
            }
        ]
    })
}

fn response_text(response_json: &Value) -> anyhow::Result<String> {
    let parts = response_json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| anyhow!("Invalid response format from model"))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        return Err(anyhow!("Model returned no text"));
    }
    Ok(text)
}

#[async_trait]
impl StudyGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY environment variable not set"))?;

        info!(
            "Calling {} (prompt {} chars, attachment: {})",
            self.model,
            request.prompt().len(),
            request.attachment().is_some()
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&build_payload(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Model API request failed: {} {}", status, body));
        }

        let response_json: Value = response.json().await?;
        let text = response_text(&response_json)?;

        info!("Model produced {} characters", text.len());
        Ok(text)
    }
}

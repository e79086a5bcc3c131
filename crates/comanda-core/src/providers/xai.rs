//! xAI adapter — Grok models, served over an OpenAI-compatible
//! `/v1/chat/completions` endpoint.

use crate::config::{ModelEntry, ModelKind, ModelMode};
use crate::error::ComandaError;

use super::{FilePayload, ProviderAdapter, ProviderResponse};

pub struct XaiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl XaiAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: std::env::var("XAI_BASE_URL").unwrap_or_else(|_| "https://api.x.ai".to_string()),
            api_key: String::new(),
        }
    }

    async fn call(
        &self,
        model: &str,
        system_prompt: &str,
        user_content: serde_json::Value,
    ) -> Result<ProviderResponse, ComandaError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let mut messages = vec![];
        if !system_prompt.is_empty() {
            messages.push(serde_json::json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": user_content }));

        let body = serde_json::json!({ "model": model, "messages": messages });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ComandaError::Upstream(format!("xai request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ComandaError::Upstream(format!("reading xai response: {e}")))?;

        if !status.is_success() {
            return Err(ComandaError::Upstream(format!("xai returned {status}: {text}")));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ComandaError::Upstream(format!("parsing xai response: {e}")))?;

        let content = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        let usage = json.get("usage");
        Ok(ProviderResponse {
            text: content,
            input_tokens: usage.and_then(|u| u.get("prompt_tokens")).and_then(|v| v.as_u64()),
            output_tokens: usage.and_then(|u| u.get("completion_tokens")).and_then(|v| v.as_u64()),
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for XaiAdapter {
    fn name(&self) -> &'static str {
        "xai"
    }

    fn configure(&mut self, api_key: String) {
        self.api_key = api_key;
    }

    fn static_models(&self) -> Vec<ModelEntry> {
        vec![ModelEntry {
            name: "grok-2".to_string(),
            kind: ModelKind::External,
            modes: vec![ModelMode::Text, ModelMode::Vision],
        }]
    }

    async fn send_text_prompt(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<ProviderResponse, ComandaError> {
        self.call(model, system_prompt, serde_json::Value::String(prompt.to_string()))
            .await
    }

    async fn send_prompt_with_file(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
        file: &FilePayload,
    ) -> Result<ProviderResponse, ComandaError> {
        let mut parts = vec![serde_json::json!({ "type": "text", "text": prompt })];
        if let Some(data_uri) = &file.data_uri {
            parts.push(serde_json::json!({
                "type": "image_url",
                "image_url": { "url": data_uri },
            }));
        }
        self.call(model, system_prompt, serde_json::Value::Array(parts)).await
    }
}

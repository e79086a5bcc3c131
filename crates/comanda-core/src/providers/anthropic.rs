//! Anthropic adapter — calls the Messages API (`POST /v1/messages`).

use crate::config::{ModelEntry, ModelKind, ModelMode};
use crate::error::ComandaError;

use super::{FilePayload, ProviderAdapter, ProviderResponse};

pub struct AnthropicAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            api_key: String::new(),
        }
    }

    async fn call(
        &self,
        model: &str,
        system_prompt: &str,
        content: serde_json::Value,
    ) -> Result<ProviderResponse, ComandaError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": 8192,
            "messages": [{ "role": "user", "content": content }],
        });
        if !system_prompt.is_empty() {
            body["system"] = serde_json::Value::String(system_prompt.to_string());
        }

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ComandaError::Upstream(format!("anthropic request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ComandaError::Upstream(format!("reading anthropic response: {e}")))?;

        if !status.is_success() {
            return Err(ComandaError::Upstream(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ComandaError::Upstream(format!("parsing anthropic response: {e}")))?;

        let content_text = json
            .get("content")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block.get("text").and_then(|t| t.as_str())
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let usage = json.get("usage");
        Ok(ProviderResponse {
            text: content_text,
            input_tokens: usage.and_then(|u| u.get("input_tokens")).and_then(|v| v.as_u64()),
            output_tokens: usage.and_then(|u| u.get("output_tokens")).and_then(|v| v.as_u64()),
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn configure(&mut self, api_key: String) {
        self.api_key = api_key;
    }

    fn static_models(&self) -> Vec<ModelEntry> {
        vec![
            ModelEntry {
                name: "claude-opus-4".to_string(),
                kind: ModelKind::External,
                modes: vec![ModelMode::Text, ModelMode::Vision, ModelMode::Multi],
            },
            ModelEntry {
                name: "claude-sonnet-4".to_string(),
                kind: ModelKind::External,
                modes: vec![ModelMode::Text, ModelMode::Vision, ModelMode::Multi],
            },
        ]
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
        let mut blocks = vec![serde_json::json!({ "type": "text", "text": prompt })];

        if let Some(data_uri) = &file.data_uri {
            if let Some((mime, data)) = split_data_uri(data_uri) {
                blocks.push(serde_json::json!({
                    "type": "image",
                    "source": { "type": "base64", "media_type": mime, "data": data },
                }));
            }
        } else if let Some(bytes) = &file.bytes {
            use base64::Engine;
            let data = base64::engine::general_purpose::STANDARD.encode(bytes);
            blocks.push(serde_json::json!({
                "type": "document",
                "source": { "type": "base64", "media_type": file.mime, "data": data },
            }));
        }

        self.call(model, system_prompt, serde_json::Value::Array(blocks)).await
    }
}

fn split_data_uri(data_uri: &str) -> Option<(&str, &str)> {
    let rest = data_uri.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    Some((mime, data))
}

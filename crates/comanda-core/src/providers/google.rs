//! Google adapter — calls the Gemini `generateContent` API.

use crate::config::{ModelEntry, ModelKind, ModelMode};
use crate::error::ComandaError;

use super::{FilePayload, ProviderAdapter, ProviderResponse};

pub struct GoogleAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: std::env::var("GOOGLE_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            api_key: String::new(),
        }
    }

    async fn call(
        &self,
        model: &str,
        system_prompt: &str,
        parts: Vec<serde_json::Value>,
    ) -> Result<ProviderResponse, ComandaError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            model,
            self.api_key
        );

        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if !system_prompt.is_empty() {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system_prompt }] });
        }

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ComandaError::Upstream(format!("google request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ComandaError::Upstream(format!("reading google response: {e}")))?;

        if !status.is_success() {
            return Err(ComandaError::Upstream(format!("google returned {status}: {text}")));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ComandaError::Upstream(format!("parsing google response: {e}")))?;

        let content = json
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|cand| cand.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let usage = json.get("usageMetadata");
        Ok(ProviderResponse {
            text: content,
            input_tokens: usage.and_then(|u| u.get("promptTokenCount")).and_then(|v| v.as_u64()),
            output_tokens: usage
                .and_then(|u| u.get("candidatesTokenCount"))
                .and_then(|v| v.as_u64()),
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn name(&self) -> &'static str {
        "google"
    }

    fn configure(&mut self, api_key: String) {
        self.api_key = api_key;
    }

    fn static_models(&self) -> Vec<ModelEntry> {
        vec![ModelEntry {
            name: "gemini-2.0-flash".to_string(),
            kind: ModelKind::External,
            modes: vec![ModelMode::Text, ModelMode::Vision, ModelMode::Multi],
        }]
    }

    async fn send_text_prompt(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<ProviderResponse, ComandaError> {
        self.call(model, system_prompt, vec![serde_json::json!({ "text": prompt })])
            .await
    }

    async fn send_prompt_with_file(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
        file: &FilePayload,
    ) -> Result<ProviderResponse, ComandaError> {
        let mut parts = vec![serde_json::json!({ "text": prompt })];
        if let Some(data_uri) = &file.data_uri {
            if let Some((mime, data)) = data_uri
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(";base64,"))
            {
                parts.push(serde_json::json!({
                    "inlineData": { "mimeType": mime, "data": data },
                }));
            }
        }
        self.call(model, system_prompt, parts).await
    }
}

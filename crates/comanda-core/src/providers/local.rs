//! Local adapter — talks to a local model daemon (e.g. Ollama) over HTTP.
//! Credential-less: `configure` is a no-op.

use crate::config::{ModelEntry, ModelKind, ModelMode};
use crate::error::ComandaError;

use super::{FilePayload, ProviderAdapter, ProviderResponse};

pub struct LocalAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: std::env::var("LOCAL_MODEL_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
        }
    }

    async fn call(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
        images: Vec<String>,
    ) -> Result<ProviderResponse, ComandaError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));

        let full_prompt = if system_prompt.is_empty() {
            prompt.to_string()
        } else {
            format!("{system_prompt}\n\n{prompt}")
        };

        let mut body = serde_json::json!({
            "model": model,
            "prompt": full_prompt,
            "stream": false,
        });
        if !images.is_empty() {
            body["images"] = serde_json::Value::Array(
                images.into_iter().map(serde_json::Value::String).collect(),
            );
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ComandaError::Upstream(format!("local model request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ComandaError::Upstream(format!("reading local model response: {e}")))?;

        if !status.is_success() {
            return Err(ComandaError::Upstream(format!("local model returned {status}: {text}")));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ComandaError::Upstream(format!("parsing local model response: {e}")))?;

        let content = json.get("response").and_then(|r| r.as_str()).unwrap_or("").to_string();
        Ok(ProviderResponse {
            text: content,
            input_tokens: json.get("prompt_eval_count").and_then(|v| v.as_u64()),
            output_tokens: json.get("eval_count").and_then(|v| v.as_u64()),
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for LocalAdapter {
    fn name(&self) -> &'static str {
        "local"
    }

    fn configure(&mut self, _api_key: String) {
        // credential-less
    }

    fn static_models(&self) -> Vec<ModelEntry> {
        vec![ModelEntry {
            name: "llama3".to_string(),
            kind: ModelKind::Local,
            modes: vec![ModelMode::Text],
        }]
    }

    async fn list_models(&self) -> Result<Vec<ModelEntry>, ComandaError> {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ComandaError::Upstream(format!("local model tags request failed: {e}")))?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ComandaError::Upstream(format!("parsing local model tags: {e}")))?;

        let models = json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                    .map(|name| ModelEntry {
                        name: name.to_string(),
                        kind: ModelKind::Local,
                        modes: vec![ModelMode::Text],
                    })
                    .collect()
            })
            .unwrap_or_else(|| self.static_models());
        Ok(models)
    }

    async fn send_text_prompt(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<ProviderResponse, ComandaError> {
        self.call(model, system_prompt, prompt, vec![]).await
    }

    async fn send_prompt_with_file(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
        file: &FilePayload,
    ) -> Result<ProviderResponse, ComandaError> {
        let images = file
            .data_uri
            .as_ref()
            .and_then(|uri| uri.split_once(";base64,"))
            .map(|(_, data)| vec![data.to_string()])
            .unwrap_or_default();
        self.call(model, system_prompt, prompt, images).await
    }
}

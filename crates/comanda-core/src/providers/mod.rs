//! Provider Registry — a pluggable set of provider adapters, each exposing a
//! uniform capability interface: name, configure-with-credential,
//! model-supports?, list-models, send-text-prompt, send-prompt-with-file.
//!
//! Model dispatch picks one adapter per model by exact-match prefix
//! detection (`gemini-*` → Google, `grok-*` → xAI, `claude-*` → Anthropic,
//! `gpt-*` → OpenAI; anything the local model daemon reports → the local
//! adapter). This is deliberately a small map plus a detection function
//! rather than an inheritance hierarchy — providers share no state.

mod anthropic;
mod google;
mod local;
mod openai;
mod xai;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::config::{ModelEntry, ModelMode};
use crate::error::ComandaError;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use local::LocalAdapter;
pub use openai::OpenAiAdapter;
pub use xai::XaiAdapter;

/// An opaque file/image payload passed out-of-band to a capability-specific
/// provider call.
#[derive(Debug, Clone)]
pub struct FilePayload {
    /// `data:<mime>;base64,...` for images, or raw bytes for opaque files.
    pub data_uri: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub mime: String,
}

/// The text (and optional usage) result of a single provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Uniform capability surface every provider adapter implements.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider name (e.g. "anthropic", "openai").
    fn name(&self) -> &'static str;

    /// Install the credential for this adapter. A no-op for credential-less
    /// adapters (e.g. the local model daemon).
    fn configure(&mut self, api_key: String);

    /// Static fallback model list, used when live discovery is unavailable.
    fn static_models(&self) -> Vec<ModelEntry>;

    /// Live model discovery; adapters that can't discover return their
    /// static list directly.
    async fn list_models(&self) -> Result<Vec<ModelEntry>, ComandaError> {
        Ok(self.static_models())
    }

    async fn send_text_prompt(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<ProviderResponse, ComandaError>;

    async fn send_prompt_with_file(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
        file: &FilePayload,
    ) -> Result<ProviderResponse, ComandaError>;
}

/// Detect which provider owns a model name by prefix.
pub fn detect_provider(model: &str) -> &'static str {
    if model.starts_with("gemini-") {
        "google"
    } else if model.starts_with("grok-") {
        "xai"
    } else if model.starts_with("claude-") {
        "anthropic"
    } else if model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3") {
        "openai"
    } else {
        "local"
    }
}

/// The name→adapter map. Constructed fresh per workflow run, configured from
/// the loaded `Config`'s provider credentials.
pub struct ProviderRegistry {
    adapters: HashMap<&'static str, Box<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        let mut adapters: HashMap<&'static str, Box<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert("anthropic", Box::new(AnthropicAdapter::new()));
        adapters.insert("openai", Box::new(OpenAiAdapter::new()));
        adapters.insert("google", Box::new(GoogleAdapter::new()));
        adapters.insert("xai", Box::new(XaiAdapter::new()));
        adapters.insert("local", Box::new(LocalAdapter::new()));
        Self { adapters }
    }

    /// Configure every adapter from the loaded config's provider credentials.
    /// Missing credentials simply leave an adapter unconfigured (the local
    /// adapter never needs one).
    pub fn configure_from(&mut self, providers: &HashMap<String, crate::config::ProviderEntry>) {
        for (name, entry) in providers {
            if let Some(adapter) = self.adapters.get_mut(name.as_str()) {
                adapter.configure(entry.api_key.clone());
            }
        }
    }

    /// Resolve the adapter for `model` by prefix detection.
    pub fn resolve(&self, model: &str) -> Result<&dyn ProviderAdapter, ComandaError> {
        let provider_name = detect_provider(model);
        self.adapters
            .get(provider_name)
            .map(|b| b.as_ref())
            .ok_or_else(|| ComandaError::Validation(format!("unknown provider for model '{model}'")))
    }

    /// List models for every known provider, using the 1-hour TTL discovery
    /// cache, falling back to the adapter's static list on fetch failure.
    pub async fn list_all_models(
        &self,
        credential_prefixes: &HashMap<String, String>,
    ) -> HashMap<&'static str, Vec<ModelEntry>> {
        let mut out = HashMap::new();
        for (name, adapter) in &self.adapters {
            let prefix = credential_prefixes
                .get(*name)
                .cloned()
                .unwrap_or_default();
            let models = cached_list_models(name, &prefix, adapter.as_ref()).await;
            out.insert(*name, models);
        }
        out
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Model-discovery memoization: 1-hour TTL keyed by (provider, credential
// prefix). Falls back to the adapter's static list on a discovery failure —
// this is the one permitted silent-recovery path (spec §7).
// ---------------------------------------------------------------------------

struct CacheEntry {
    models: Vec<ModelEntry>,
    fetched_at: Instant,
}

static MODEL_CACHE: Lazy<Mutex<HashMap<String, CacheEntry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

const MODEL_CACHE_TTL: Duration = Duration::from_secs(3600);

async fn cached_list_models(
    provider: &str,
    credential_prefix: &str,
    adapter: &dyn ProviderAdapter,
) -> Vec<ModelEntry> {
    let key = format!("{provider}:{credential_prefix}");

    if let Some(entry) = MODEL_CACHE.lock().unwrap().get(&key) {
        if entry.fetched_at.elapsed() < MODEL_CACHE_TTL {
            return entry.models.clone();
        }
    }

    let models = match adapter.list_models().await {
        Ok(models) => models,
        Err(e) => {
            tracing::warn!("model discovery failed for {provider}: {e}; using static list");
            adapter.static_models()
        }
    };

    MODEL_CACHE.lock().unwrap().insert(
        key,
        CacheEntry {
            models: models.clone(),
            fetched_at: Instant::now(),
        },
    );
    models
}

pub fn credential_prefix(api_key: &str) -> String {
    api_key.chars().take(8).collect()
}

/// Check whether `model` declares `mode`, falling back to a permissive
/// default for models not present in the config's static list (callers that
/// pass a full `ModelEntry` should use `ModelEntry::supports` directly).
pub fn model_supports(model: &ModelEntry, mode: ModelMode) -> bool {
    model.supports(mode)
}

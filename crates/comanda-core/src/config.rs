//! Config Store — loads/saves the structured configuration document and
//! encrypts/decrypts it with a password-derived AES-256-GCM key.
//!
//! On-disk form is either plaintext YAML, or a single line
//! `ENCRYPTED:<base64(nonce‖ciphertext)>`. The `ENCRYPTED:` sentinel is the
//! sole format discriminator (see [`is_encrypted`]).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ComandaError;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const ENCRYPTED_PREFIX: &str = "ENCRYPTED:";

/// The full configuration document: providers, server, databases, default
/// generation model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub databases: HashMap<String, DatabaseSettings>,
    #[serde(default)]
    pub default_generation_model: Option<String>,
}

/// A provider credential + the models it makes available.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

/// Mode a model supports; gates input-kind / model-mode compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelMode {
    Text,
    Vision,
    Multi,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Local,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    #[serde(default)]
    pub modes: Vec<ModelMode>,
}

impl ModelEntry {
    pub fn supports(&self, mode: ModelMode) -> bool {
        self.modes.contains(&mode)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default)]
    pub cors: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            data_dir: default_data_dir(),
            enabled: false,
            bearer_token: String::new(),
            cors: true,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Config {
    /// Resolve the config file path: `COMANDA_ENV` override, else `.env` in
    /// the current working directory.
    pub fn default_path() -> PathBuf {
        std::env::var("COMANDA_ENV")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".env"))
    }

    /// Load the config document from `path`, transparently decrypting if the
    /// file is in `ENCRYPTED:` form. `password` is required only in that case.
    pub fn load(path: &Path, password: Option<&str>) -> Result<Self, ComandaError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ComandaError::ConfigIo(format!("reading {}: {e}", path.display())))?;

        let text = if is_encrypted(&raw) {
            let password = password.ok_or_else(|| {
                ComandaError::ConfigEncryption("config is encrypted; password required".into())
            })?;
            decrypt(&raw, password)?
        } else {
            raw
        };

        serde_yaml::from_str(&text)
            .map_err(|e| ComandaError::ConfigIo(format!("parsing config: {e}")))
    }

    /// Persist the document as plaintext YAML, atomically (write to a sibling
    /// temp file, then rename over the target) so a crash mid-write cannot
    /// leave a half-written config file.
    pub fn save(&self, path: &Path) -> Result<(), ComandaError> {
        let text = serde_yaml::to_string(self)
            .map_err(|e| ComandaError::ConfigIo(format!("serializing config: {e}")))?;
        atomic_write(path, text.as_bytes())
    }

    /// Persist the document encrypted under `password`.
    pub fn save_encrypted(&self, path: &Path, password: &str) -> Result<(), ComandaError> {
        let text = serde_yaml::to_string(self)
            .map_err(|e| ComandaError::ConfigIo(format!("serializing config: {e}")))?;
        let encrypted = encrypt(&text, password)?;
        atomic_write(path, encrypted.as_bytes())
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), ComandaError> {
    let tmp = path.with_extension("tmp-write");
    std::fs::write(&tmp, contents)
        .map_err(|e| ComandaError::ConfigIo(format!("writing {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| ComandaError::ConfigIo(format!("renaming into {}: {e}", path.display())))
}

/// True iff `text` starts with the `ENCRYPTED:` sentinel.
pub fn is_encrypted(text: &str) -> bool {
    text.starts_with(ENCRYPTED_PREFIX)
}

fn derive_key(password: &str) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Encrypt `plaintext` with AES-256-GCM under a SHA-256-derived key.
/// Output: `ENCRYPTED:` + base64(nonce ‖ ciphertext+tag).
pub fn encrypt(plaintext: &str, password: &str) -> Result<String, ComandaError> {
    if password.len() < 6 {
        return Err(ComandaError::ConfigEncryption(
            "password must be at least 6 characters".into(),
        ));
    }
    let key = derive_key(password);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| ComandaError::ConfigEncryption(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| ComandaError::ConfigEncryption(e.to_string()))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!("{ENCRYPTED_PREFIX}{}", BASE64.encode(combined)))
}

/// Decrypt a `ENCRYPTED:`-prefixed blob produced by [`encrypt`].
pub fn decrypt(encrypted: &str, password: &str) -> Result<String, ComandaError> {
    let body = encrypted.strip_prefix(ENCRYPTED_PREFIX).ok_or_else(|| {
        ComandaError::ConfigEncryption("not an ENCRYPTED: blob".into())
    })?;

    let key = derive_key(password);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| ComandaError::ConfigEncryption(e.to_string()))?;

    let combined = BASE64
        .decode(body)
        .map_err(|e| ComandaError::ConfigEncryption(format!("invalid base64: {e}")))?;
    if combined.len() < NONCE_SIZE {
        return Err(ComandaError::ConfigEncryption("ciphertext too short".into()));
    }
    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| ComandaError::ConfigEncryption("decryption failed: wrong password?".into()))?;

    String::from_utf8(plaintext)
        .map_err(|e| ComandaError::ConfigEncryption(format!("decrypted data not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let encrypted = encrypt("hello world", "hunter2").unwrap();
        assert!(is_encrypted(&encrypted));
        assert!(!is_encrypted("hello world"));
        assert_eq!(decrypt(&encrypted, "hunter2").unwrap(), "hello world");
    }

    #[test]
    fn wrong_password_fails() {
        let encrypted = encrypt("hello world", "hunter2").unwrap();
        assert!(decrypt(&encrypted, "hunter3").is_err());
    }

    #[test]
    fn short_password_rejected() {
        assert!(encrypt("x", "abc").is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut cfg = Config::default();
        cfg.default_generation_model = Some("gpt-4o".to_string());
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path, None).unwrap();
        assert_eq!(loaded.default_generation_model, Some("gpt-4o".to_string()));

        cfg.save_encrypted(&path, "hunter2").unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(is_encrypted(&raw));
        let loaded = Config::load(&path, Some("hunter2")).unwrap();
        assert_eq!(loaded.default_generation_model, Some("gpt-4o".to_string()));
        assert!(Config::load(&path, Some("wrong1")).is_err());
    }
}

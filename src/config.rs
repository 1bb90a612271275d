//! Environment-overridable configuration.
//!
//! Layering: environment variable first, then a value read from the
//! on-disk settings blob (see [`crate::store::FlatStore`]), then a built-in
//! default.

use std::env;
use std::path::PathBuf;

use crate::types::Settings;

/// Server and provider configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port for the HTTP server. `PORT`, default 8787.
    pub port: u16,
    /// Root directory for the on-disk shard tree (`data/` by default).
    pub data_dir: PathBuf,
    /// Embedding/chat provider base URL, e.g. `https://api.siliconflow.cn`.
    pub provider_base_url: String,
    /// Bearer token for the embedding/chat provider.
    pub provider_api_key: Option<String>,
    /// Embedding model name sent to the provider.
    pub embedding_model: String,
    /// Chat/completion model name sent to the provider.
    pub chat_model: String,
    /// Optional Azure Vision OCR endpoint.
    pub azure_vision_endpoint: Option<String>,
    /// Optional Azure Vision OCR key.
    pub azure_vision_key: Option<String>,
    /// Maximum accepted JSON body size, in bytes.
    pub json_limit_bytes: usize,
    /// Maximum accepted multipart body size, in bytes.
    pub multipart_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8787,
            data_dir: PathBuf::from("data"),
            provider_base_url: "https://api.siliconflow.cn".to_string(),
            provider_api_key: None,
            embedding_model: "BAAI/bge-m3".to_string(),
            chat_model: "Qwen/Qwen2.5-72B-Instruct".to_string(),
            azure_vision_endpoint: None,
            azure_vision_key: None,
            json_limit_bytes: 100 * 1024 * 1024,
            multipart_limit_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, applying `.env` via
    /// `dotenvy` first (best-effort; a missing `.env` file is not an error).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut cfg = Config::default();

        if let Ok(port) = env::var("PORT") {
            if let Ok(parsed) = port.parse() {
                cfg.port = parsed;
            } else {
                tracing::warn!(value = %port, "PORT is not a valid u16, using default");
            }
        }
        if let Ok(dir) = env::var("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(base_url) = env::var("PROVIDER_BASE_URL") {
            cfg.provider_base_url = base_url;
        }
        if let Ok(key) = env::var("SILICONFLOW_API_KEY") {
            cfg.provider_api_key = Some(key);
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            cfg.embedding_model = model;
        }
        if let Ok(model) = env::var("CHAT_MODEL") {
            cfg.chat_model = model;
        }
        cfg.azure_vision_endpoint = env::var("AZURE_VISION_ENDPOINT").ok();
        cfg.azure_vision_key = env::var("AZURE_VISION_KEY").ok();

        cfg
    }

    /// Applies the settings-blob fallback (`settings.apiKeys.<provider>`) on
    /// top of whatever `from_env` already resolved. A no-op if the
    /// environment already supplied a key. Resolved once at startup, not
    /// re-checked per request.
    pub fn apply_settings_fallback(&mut self, settings: &Settings) {
        if self.provider_api_key.is_some() {
            return;
        }
        self.provider_api_key = settings
            .api_keys
            .get("siliconflow")
            .or_else(|| settings.api_keys.values().next())
            .cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fallback_fills_in_a_missing_env_key() {
        let mut cfg = Config { provider_api_key: None, ..Config::default() };
        let mut settings = Settings::default();
        settings.api_keys.insert("siliconflow".to_string(), "sk-from-settings".to_string());

        cfg.apply_settings_fallback(&settings);
        assert_eq!(cfg.provider_api_key.as_deref(), Some("sk-from-settings"));
    }

    #[test]
    fn settings_fallback_does_not_override_an_env_supplied_key() {
        let mut cfg = Config { provider_api_key: Some("sk-from-env".to_string()), ..Config::default() };
        let mut settings = Settings::default();
        settings.api_keys.insert("siliconflow".to_string(), "sk-from-settings".to_string());

        cfg.apply_settings_fallback(&settings);
        assert_eq!(cfg.provider_api_key.as_deref(), Some("sk-from-env"));
    }
}

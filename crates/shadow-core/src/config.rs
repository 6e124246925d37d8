//! Configuration for shadow.
//!
//! Two sources are consulted:
//!
//! - the process environment, through the [`Environment`] capability, which
//!   supplies the API key fallback and the settings file location;
//! - an optional JSON settings file (`~/.shadow/config.json`, or the path in
//!   `SHADOW_CONFIG`) with provider endpoints and request tuning.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable holding the fallback API key.
pub const API_KEY_ENV: &str = "EMERGENT_LLM_KEY";

/// Environment variable overriding the settings file path.
pub const CONFIG_PATH_ENV: &str = "SHADOW_CONFIG";

/// Read-only view of environment variables.
pub trait Environment: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: HashMap<String, ProviderEntry>,
    pub request: RequestSettings,
}

impl Config {
    /// Load configuration from the path named by `SHADOW_CONFIG`, or from
    /// `~/.shadow/config.json`. A missing file yields the defaults.
    pub fn load(env: &dyn Environment) -> anyhow::Result<Self> {
        let path = match env.var(CONFIG_PATH_ENV) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => Self::default_path(),
        };
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shadow")
            .join("config.json")
    }

    /// Custom base URL configured for a provider, if any.
    pub fn api_base(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|e| e.api_base.as_deref())
            .filter(|s| !s.is_empty())
    }
}

// ── Provider Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderEntry {
    pub api_base: Option<String>,
}

// ── Request Configuration ───────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestSettings {
    /// Omitted from the request when unset, leaving the provider default.
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_seconds: u64,
    /// Total attempts per message, including the first.
    pub max_retries: u32,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: None,
            timeout_seconds: 120,
            max_retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.providers.is_empty());
        assert_eq!(config.request.timeout_seconds, 120);
        assert_eq!(config.request.max_retries, 3);
        assert!(config.request.max_tokens.is_none());
    }

    #[test]
    fn test_deserialize_settings() {
        let json = r#"{
            "providers": {"vllm": {"apiBase": "http://localhost:8000/v1"}},
            "request": {"maxTokens": 512, "temperature": 0.2, "maxRetries": 1}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_base("vllm"), Some("http://localhost:8000/v1"));
        assert_eq!(config.api_base("openai"), None);
        assert_eq!(config.request.max_tokens, Some(512));
        assert_eq!(config.request.max_retries, 1);
        assert_eq!(config.request.timeout_seconds, 120);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = HashMap::new();
        env.insert(
            CONFIG_PATH_ENV.to_string(),
            dir.path().join("absent.json").display().to_string(),
        );
        let config = Config::load(&env).unwrap();
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut env = HashMap::new();
        env.insert(CONFIG_PATH_ENV.to_string(), path.display().to_string());
        let err = Config::load(&env).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_map_environment() {
        let mut env = HashMap::new();
        env.insert(API_KEY_ENV.to_string(), "sk-env".to_string());
        assert_eq!(env.var(API_KEY_ENV).as_deref(), Some("sk-env"));
        assert_eq!(env.var("UNSET"), None);
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const PLACEHOLDER_OPENAI_API_KEY: &str = "PLACEHOLDER_OPENAI_API_KEY";
pub const PLACEHOLDER_ASSISTANT_ID: &str = "PLACEHOLDER_ASSISTANT_ID";
pub const PLACEHOLDER_GEMINI_API_KEY: &str = "PLACEHOLDER_GEMINI_API_KEY";

/// Main configuration structure for the PSAP locator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub nearby: NearbyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    #[serde(default)]
    pub jitter_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    /// OpenAI Assistants API with a preconfigured PSAP assistant
    #[default]
    OpenaiAssistant,
    /// Gemini generateContent with a self-contained prompt
    Gemini,
}

impl BackendProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "openai_assistant" | "assistant" => Some(Self::OpenaiAssistant),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    #[serde(default)]
    pub provider: BackendProvider,
    #[serde(default)]
    pub openai: OpenAiAssistantConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiAssistantConfig {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NearbyConfig {
    /// Search radius requested from the assistant for backup PSAPs
    pub radius_miles: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            bearer_token: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: 30,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: BackendProvider::default(),
            openai: OpenAiAssistantConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for OpenAiAssistantConfig {
    fn default() -> Self {
        Self {
            api_key: PLACEHOLDER_OPENAI_API_KEY.to_string(),
            assistant_id: PLACEHOLDER_ASSISTANT_ID.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: PLACEHOLDER_GEMINI_API_KEY.to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.2,
            max_output_tokens: 1024,
        }
    }
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self { radius_miles: 50 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            retry: RetryConfig::default(),
            polling: PollingConfig::default(),
            backend: BackendConfig::default(),
            nearby: NearbyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("PSAP_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::info!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from a key lookup; `apply_env_overrides` feeds it the process env
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = var("PSAP_BACKEND") {
            match BackendProvider::from_str(&provider) {
                Some(p) => self.backend.provider = p,
                None => tracing::warn!("Unknown PSAP_BACKEND '{}', keeping {:?}", provider, self.backend.provider),
            }
        }

        // Server overrides
        if let Some(bind) = var("PSAP_HTTP_BIND") {
            self.server.bind = bind;
        }
        if let Some(token) = var("PSAP_BEARER_TOKEN") {
            self.server.bearer_token = Some(token).filter(|t| !t.is_empty());
        }

        // OpenAI overrides
        if let Some(api_key) = var("OPENAI_API_KEY") {
            self.backend.openai.api_key = api_key;
        }
        if let Some(assistant_id) = var("OPENAI_ASSISTANT_ID").or_else(|| var("ASSISTANT_ID")) {
            self.backend.openai.assistant_id = assistant_id;
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            self.backend.openai.base_url = base_url;
        }

        // Gemini overrides
        if let Some(api_key) = var("GEMINI_API_KEY") {
            self.backend.gemini.api_key = api_key;
        }
        if let Some(model) = var("GEMINI_MODEL") {
            self.backend.gemini.model = model;
        }
        if let Some(base_url) = var("GEMINI_BASE_URL") {
            self.backend.gemini.base_url = base_url;
        }

        // Retry overrides
        if let Some(max) = var("PSAP_RETRY_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.retry.max_retries = max;
        }
        if let Some(max_delay) = var("PSAP_RETRY_MAX_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.retry.max_delay_ms = max_delay;
        }
        if let Some(jitter) = var("PSAP_RETRY_JITTER_FACTOR").and_then(|v| v.parse().ok()) {
            self.retry.jitter_factor = jitter;
        }

        // Polling overrides
        if let Some(interval) = var("PSAP_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.polling.interval_ms = interval;
        }
        if let Some(attempts) = var("PSAP_POLL_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.polling.max_attempts = attempts;
        }

        if let Some(radius) = var("PSAP_NEARBY_RADIUS_MILES").and_then(|v| v.parse().ok()) {
            self.nearby.radius_miles = radius;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err("Retry jitter factor must be between 0.0 and 1.0".into());
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err("Retry backoff factor must be at least 1.0".into());
        }
        if self.polling.max_attempts == 0 {
            return Err("Polling max_attempts cannot be 0".into());
        }
        if self.nearby.radius_miles == 0 {
            return Err("Nearby radius_miles cannot be 0".into());
        }

        match self.backend.provider {
            BackendProvider::OpenaiAssistant => {
                let openai = &self.backend.openai;
                if is_unset(&openai.api_key, PLACEHOLDER_OPENAI_API_KEY) {
                    return Err("OPENAI_API_KEY environment variable must be set".into());
                }
                if is_unset(&openai.assistant_id, PLACEHOLDER_ASSISTANT_ID) {
                    return Err("OPENAI_ASSISTANT_ID environment variable must be set".into());
                }
            }
            BackendProvider::Gemini => {
                if is_unset(&self.backend.gemini.api_key, PLACEHOLDER_GEMINI_API_KEY) {
                    return Err("GEMINI_API_KEY environment variable must be set".into());
                }
            }
        }

        Ok(())
    }
}

/// True when a credential is empty or still the shipped placeholder
pub fn is_unset(value: &str, placeholder: &str) -> bool {
    value.trim().is_empty() || value == placeholder
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_lookup_budget() {
        let cfg = Config::default();
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.retry.initial_delay_ms, 1000);
        assert_eq!(cfg.retry.max_delay_ms, 10_000);
        assert_eq!(cfg.polling.max_attempts, 30);
        assert_eq!(cfg.polling.interval_ms, 1000);
        assert_eq!(cfg.backend.provider, BackendProvider::OpenaiAssistant);
    }

    #[test]
    fn test_default_config_fails_validation_without_keys() {
        let err = Config::default().validate().expect_err("placeholder key should fail");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_overrides(overrides(&[
            ("PSAP_BACKEND", "gemini"),
            ("GEMINI_API_KEY", "g-key"),
            ("ASSISTANT_ID", "asst_legacy"),
            ("PSAP_POLL_MAX_ATTEMPTS", "12"),
            ("PSAP_RETRY_MAX_DELAY_MS", "5000"),
            ("PSAP_RETRY_MAX_RETRIES", "not-a-number"),
            ("PSAP_BEARER_TOKEN", ""),
        ]));
        assert_eq!(cfg.backend.provider, BackendProvider::Gemini);
        assert_eq!(cfg.backend.gemini.api_key, "g-key");
        assert_eq!(cfg.backend.openai.assistant_id, "asst_legacy");
        assert_eq!(cfg.polling.max_attempts, 12);
        assert_eq!(cfg.retry.max_delay_ms, 5000);
        assert_eq!(cfg.retry.max_retries, 3);
        assert!(cfg.server.bearer_token.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_assistant_id_prefers_specific_var() {
        let mut cfg = Config::default();
        cfg.apply_overrides(overrides(&[
            ("OPENAI_ASSISTANT_ID", "asst_new"),
            ("ASSISTANT_ID", "asst_legacy"),
        ]));
        assert_eq!(cfg.backend.openai.assistant_id, "asst_new");
    }

    #[test]
    fn test_partial_yaml_uses_section_defaults() {
        let cfg = Config::from_yaml(
            "backend:\n  provider: gemini\n  gemini:\n    api_key: abc\n    model: gemini-1.5-pro\n    base_url: http://localhost:9000\n    temperature: 0.0\n    max_output_tokens: 256\npolling:\n  interval_ms: 500\n  max_attempts: 60\n",
        )
        .expect("yaml should parse");
        assert_eq!(cfg.backend.provider, BackendProvider::Gemini);
        assert_eq!(cfg.backend.gemini.model, "gemini-1.5-pro");
        assert_eq!(cfg.polling.max_attempts, 60);
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.nearby.radius_miles, 50);
        assert_eq!(cfg.backend.openai.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_validation_rejects_bad_jitter() {
        let mut cfg = Config::default();
        cfg.backend.openai.api_key = "sk-test".to_string();
        cfg.backend.openai.assistant_id = "asst_1".to_string();
        assert!(cfg.validate().is_ok());
        cfg.retry.jitter_factor = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_finite_retry_factors() {
        let mut cfg = Config::default();
        cfg.backend.openai.api_key = "sk-test".to_string();
        cfg.backend.openai.assistant_id = "asst_1".to_string();
        cfg.apply_overrides(overrides(&[("PSAP_RETRY_JITTER_FACTOR", "NaN")]));
        assert!(cfg.retry.jitter_factor.is_nan());
        assert!(cfg.validate().is_err());

        cfg.retry.jitter_factor = 0.0;
        cfg.retry.backoff_factor = f64::INFINITY;
        assert!(cfg.validate().is_err());
    }
}

//! Oracle configuration loaded from the environment.
//!
//! Unlike the rest of the workspace, credentials never live in the YAML
//! config. A missing API key is not an error: it means "no credential",
//! and every call site degrades to its local fallback.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::OracleError;

/// Default spend ceiling in dollars when `ORACLE_BUDGET` is unset.
const DEFAULT_BUDGET: Decimal = Decimal::from_parts(200, 0, 0, false, 2);

/// Default per-call deadline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed completion size for every call site.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// Complete oracle configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// The backend, or `None` when no credential is configured.
    pub backend: Option<LlmBackendConfig>,
    /// Total spend ceiling in dollars.
    pub budget: Decimal,
    /// Price per million input tokens.
    pub input_rate: Decimal,
    /// Price per million output tokens.
    pub output_rate: Decimal,
    /// Per-call deadline.
    pub timeout: Duration,
    /// Completion size requested from the backend.
    pub max_tokens: u32,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl BackendType {
    /// Parse a backend name as written in `LLM_BACKEND`.
    pub fn parse(name: &str) -> Result<Self, OracleError> {
        match name.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(OracleError::Config(format!("unknown backend type: {other}"))),
        }
    }

    /// Default API base URL for the backend.
    pub const fn default_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Default model for the backend.
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: None,
            budget: DEFAULT_BUDGET,
            input_rate: Decimal::new(80, 2),
            output_rate: Decimal::new(400, 2),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl OracleConfig {
    /// Load configuration from process environment variables.
    ///
    /// Variables (all optional):
    /// - `LLM_API_KEY` -- credential; absent or empty means fallback mode
    /// - `LLM_BACKEND` -- `openai` (default) or `anthropic`
    /// - `LLM_API_URL` -- API base URL (backend default otherwise)
    /// - `LLM_MODEL` -- model name (backend default otherwise)
    /// - `ORACLE_BUDGET` -- spend ceiling in dollars (default 2.00)
    /// - `ORACLE_INPUT_RATE` / `ORACLE_OUTPUT_RATE` -- dollars per million tokens
    /// - `ORACLE_TIMEOUT_MS` -- per-call deadline (default 10000)
    pub fn from_env() -> Result<Self, OracleError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OracleError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(api_key) = get("LLM_API_KEY") {
            let backend_type = match get("LLM_BACKEND") {
                Some(name) => BackendType::parse(&name)?,
                None => BackendType::OpenAi,
            };
            config.backend = Some(LlmBackendConfig {
                backend_type,
                api_url: get("LLM_API_URL")
                    .unwrap_or_else(|| backend_type.default_url().to_owned()),
                api_key,
                model: get("LLM_MODEL")
                    .unwrap_or_else(|| backend_type.default_model().to_owned()),
            });
        }

        if let Some(raw) = get("ORACLE_BUDGET") {
            config.budget = parse_decimal("ORACLE_BUDGET", &raw)?;
        }
        if let Some(raw) = get("ORACLE_INPUT_RATE") {
            config.input_rate = parse_decimal("ORACLE_INPUT_RATE", &raw)?;
        }
        if let Some(raw) = get("ORACLE_OUTPUT_RATE") {
            config.output_rate = parse_decimal("ORACLE_OUTPUT_RATE", &raw)?;
        }
        if let Some(raw) = get("ORACLE_TIMEOUT_MS") {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|e| OracleError::Config(format!("invalid ORACLE_TIMEOUT_MS: {e}")))?;
            config.timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Whether a credential is configured.
    pub const fn has_credential(&self) -> bool {
        self.backend.is_some()
    }
}

fn parse_decimal(name: &str, raw: &str) -> Result<Decimal, OracleError> {
    let value: Decimal = raw
        .trim()
        .parse()
        .map_err(|e| OracleError::Config(format!("invalid {name}: {e}")))?;
    if value.is_sign_negative() {
        return Err(OracleError::Config(format!("{name} must not be negative")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_key_means_no_credential() {
        let config = OracleConfig::from_lookup(lookup_from(&[("LLM_BACKEND", "anthropic")]));
        assert!(config.is_ok());
        assert!(!config.map(|c| c.has_credential()).unwrap_or(true));
    }

    #[test]
    fn empty_key_means_no_credential() {
        let config = OracleConfig::from_lookup(lookup_from(&[("LLM_API_KEY", "  ")]));
        assert!(!config.map(|c| c.has_credential()).unwrap_or(true));
    }

    #[test]
    fn key_selects_backend_with_defaults() {
        let config = OracleConfig::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "sk-test"),
            ("LLM_BACKEND", "claude"),
        ]))
        .ok()
        .and_then(|c| c.backend);
        assert_eq!(
            config.as_ref().map(|b| b.backend_type),
            Some(BackendType::Anthropic)
        );
        assert_eq!(
            config.map(|b| b.api_url).as_deref(),
            Some("https://api.anthropic.com/v1")
        );
    }

    #[test]
    fn budget_and_timeout_overrides() {
        let config = OracleConfig::from_lookup(lookup_from(&[
            ("ORACLE_BUDGET", "0.50"),
            ("ORACLE_TIMEOUT_MS", "2500"),
        ]))
        .ok();
        assert_eq!(config.as_ref().map(|c| c.budget), Some(Decimal::new(50, 2)));
        assert_eq!(
            config.map(|c| c.timeout),
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(OracleConfig::from_lookup(lookup_from(&[("ORACLE_BUDGET", "lots")])).is_err());
        assert!(OracleConfig::from_lookup(lookup_from(&[("ORACLE_BUDGET", "-1")])).is_err());
        assert!(
            OracleConfig::from_lookup(lookup_from(&[
                ("LLM_API_KEY", "k"),
                ("LLM_BACKEND", "carrier-pigeon"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn defaults() {
        let config = OracleConfig::default();
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(!config.has_credential());
    }
}

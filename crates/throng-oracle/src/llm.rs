//! LLM backend abstraction and implementations.
//!
//! Enum dispatch instead of trait objects, since async methods are not
//! dyn-compatible. HTTP backends exist for OpenAI-compatible APIs and the
//! Anthropic Messages API; a scripted backend replays canned responses for
//! tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::OracleError;
use crate::prompt::RenderedPrompt;

/// Text returned by a backend plus the usage it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Raw response text, ideally JSON.
    pub text: String,
    /// Prompt tokens billed.
    pub input_tokens: u64,
    /// Completion tokens billed.
    pub output_tokens: u64,
}

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An LLM backend that turns a prompt into a completion.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(HttpBackend),
    /// Anthropic Messages API.
    Anthropic(HttpBackend),
    /// Canned responses, consumed in order.
    Scripted(ScriptedBackend),
}

impl LlmBackend {
    /// Send a prompt and return the completion.
    pub async fn complete(
        &self,
        prompt: &RenderedPrompt,
        max_tokens: u32,
    ) -> Result<Completion, OracleError> {
        match self {
            Self::OpenAi(backend) => backend.complete_openai(prompt, max_tokens).await,
            Self::Anthropic(backend) => backend.complete_anthropic(prompt, max_tokens).await,
            Self::Scripted(backend) => backend.complete(prompt),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Scripted(_) => "scripted",
        }
    }
}

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    let http = HttpBackend::new(config);
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(http),
        BackendType::Anthropic => LlmBackend::Anthropic(http),
    }
}

// ---------------------------------------------------------------------------
// HTTP backends
// ---------------------------------------------------------------------------

/// Connection details shared by both HTTP wire formats.
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpBackend {
    /// Create a backend from its configuration.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// `POST {api_url}/chat/completions`.
    async fn complete_openai(
        &self,
        prompt: &RenderedPrompt,
        max_tokens: u32,
    ) -> Result<Completion, OracleError> {
        let url = format!("{}/chat/completions", self.api_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": 0.8,
            "max_tokens": max_tokens,
            "response_format": {"type": "json_object"}
        });

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        let json = send(request, "OpenAI").await?;
        extract_openai(&json)
    }

    /// `POST {api_url}/messages`.
    async fn complete_anthropic(
        &self,
        prompt: &RenderedPrompt,
        max_tokens: u32,
    ) -> Result<Completion, OracleError> {
        let url = format!("{}/messages", self.api_url);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);
        let json = send(request, "Anthropic").await?;
        extract_anthropic(&json)
    }
}

async fn send(
    request: reqwest::RequestBuilder,
    label: &str,
) -> Result<serde_json::Value, OracleError> {
    let response = request
        .send()
        .await
        .map_err(|e| OracleError::Backend(format!("{label} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(OracleError::Backend(format!(
            "{label} returned {status}: {error_body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OracleError::Backend(format!("{label} response parse failed: {e}")))
}

fn usage_field(json: &serde_json::Value, key: &str) -> u64 {
    json.get("usage")
        .and_then(|u| u.get(key))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0)
}

/// Extract text and usage from an `OpenAI` chat completions response.
fn extract_openai(json: &serde_json::Value) -> Result<Completion, OracleError> {
    let text = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            OracleError::Backend("OpenAI response missing choices[0].message.content".to_owned())
        })?;
    Ok(Completion {
        text: text.to_owned(),
        input_tokens: usage_field(json, "prompt_tokens"),
        output_tokens: usage_field(json, "completion_tokens"),
    })
}

/// Extract text and usage from an Anthropic Messages API response.
fn extract_anthropic(json: &serde_json::Value) -> Result<Completion, OracleError> {
    let text = json
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            OracleError::Backend("Anthropic response missing content[0].text".to_owned())
        })?;
    Ok(Completion {
        text: text.to_owned(),
        input_tokens: usage_field(json, "input_tokens"),
        output_tokens: usage_field(json, "output_tokens"),
    })
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// Replays queued responses in order. An empty queue is a backend error.
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, String>>>,
    repeat: Option<String>,
}

impl ScriptedBackend {
    /// Queue responses to return one per call.
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            repeat: None,
        }
    }

    /// Return the same response for every call.
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response.into()),
        }
    }

    /// Queue a backend failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(message.into()));
        }
    }

    /// Queue a response.
    pub fn push(&self, response: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response.into()));
        }
    }

    fn complete(&self, prompt: &RenderedPrompt) -> Result<Completion, OracleError> {
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        let text = match (next, &self.repeat) {
            (Some(Ok(text)), _) => text,
            (Some(Err(message)), _) => return Err(OracleError::Backend(message)),
            (None, Some(text)) => text.clone(),
            (None, None) => {
                return Err(OracleError::Backend("scripted backend exhausted".to_owned()));
            }
        };
        Ok(Completion {
            input_tokens: prompt.estimated_tokens(),
            output_tokens: estimate_tokens(&text),
            text,
        })
    }
}

/// Rough token count: four characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = u64::try_from(text.chars().count()).unwrap_or(u64::MAX);
    chars.div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> RenderedPrompt {
        RenderedPrompt {
            system: "sys".to_owned(),
            user: "hello there".to_owned(),
        }
    }

    #[test]
    fn extract_openai_with_usage() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "{\"narrative\": \"hi\"}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30}
        });
        let completion = extract_openai(&json).ok();
        assert_eq!(completion.as_ref().map(|c| c.input_tokens), Some(120));
        assert_eq!(completion.as_ref().map(|c| c.output_tokens), Some(30));
        assert!(completion.is_some_and(|c| c.text.contains("narrative")));
    }

    #[test]
    fn extract_openai_missing_choices() {
        let json = serde_json::json!({"error": "rate_limit"});
        assert!(extract_openai(&json).is_err());
    }

    #[test]
    fn extract_anthropic_with_usage() {
        let json = serde_json::json!({
            "content": [{"type": "text", "text": "{}"}],
            "usage": {"input_tokens": 80, "output_tokens": 12}
        });
        let completion = extract_anthropic(&json).ok();
        assert_eq!(completion.map(|c| (c.input_tokens, c.output_tokens)), Some((80, 12)));
    }

    #[test]
    fn extract_anthropic_missing() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic(&json).is_err());
    }

    #[test]
    fn create_backend_dispatches_correctly() {
        let mut config = LlmBackendConfig {
            backend_type: BackendType::OpenAi,
            api_url: "https://api.openai.com/v1/".to_owned(),
            api_key: "test".to_owned(),
            model: "test-model".to_owned(),
        };
        assert_eq!(create_backend(&config).name(), "openai-compatible");
        config.backend_type = BackendType::Anthropic;
        assert_eq!(create_backend(&config).name(), "anthropic");
    }

    #[test]
    fn scripted_replays_in_order_then_fails() {
        let backend = ScriptedBackend::new(["one".to_owned(), "two".to_owned()]);
        backend.push_failure("boom");
        assert_eq!(backend.complete(&prompt()).ok().map(|c| c.text), Some("one".to_owned()));
        assert_eq!(backend.complete(&prompt()).ok().map(|c| c.text), Some("two".to_owned()));
        assert!(backend.complete(&prompt()).is_err());
        assert!(backend.complete(&prompt()).is_err());
    }

    #[test]
    fn scripted_always_repeats() {
        let backend = ScriptedBackend::always("same");
        for _ in 0..3 {
            assert_eq!(
                backend.complete(&prompt()).ok().map(|c| c.text),
                Some("same".to_owned())
            );
        }
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}

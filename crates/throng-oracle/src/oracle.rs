//! The oracle facade used by the simulation.
//!
//! Dispatch is split in two. [`Oracle::prepare`] runs synchronously on the
//! simulation thread: it checks for a credential, renders the prompt, and
//! reserves budget. The returned [`PreparedCall`] is then moved into a
//! spawned task and awaited there, so a slow backend never stalls a frame.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::budget::{Budget, BudgetSummary, Reservation};
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::llm::{LlmBackend, create_backend};
use crate::parse::parse_json;
use crate::prompt::{CallKind, PromptEngine, RenderedPrompt};

/// Shared handle to the arbitration oracle. Cheap to clone.
#[derive(Clone)]
pub struct Oracle {
    backend: Option<Arc<LlmBackend>>,
    prompts: Arc<PromptEngine>,
    budget: Arc<Budget>,
    timeout: Duration,
    max_tokens: u32,
}

impl Oracle {
    /// Build from configuration. No credential yields an offline oracle.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let backend = config.backend.as_ref().map(create_backend);
        Self::with_backend(backend, config, PromptEngine::builtin()?)
    }

    /// Build around an explicit backend (e.g. a scripted one).
    pub fn with_backend(
        backend: Option<LlmBackend>,
        config: &OracleConfig,
        prompts: PromptEngine,
    ) -> Result<Self, OracleError> {
        if config.max_tokens == 0 {
            return Err(OracleError::Config("max_tokens must be positive".to_owned()));
        }
        Ok(Self {
            backend: backend.map(Arc::new),
            prompts: Arc::new(prompts),
            budget: Arc::new(Budget::new(
                config.budget,
                config.input_rate,
                config.output_rate,
            )),
            timeout: config.timeout,
            max_tokens: config.max_tokens,
        })
    }

    /// An oracle with no backend. Every call site takes its fallback.
    pub fn offline() -> Result<Self, OracleError> {
        Self::with_backend(None, &OracleConfig::default(), PromptEngine::builtin()?)
    }

    /// Whether a backend is configured.
    pub const fn has_credential(&self) -> bool {
        self.backend.is_some()
    }

    /// Backend name for logging.
    pub fn backend_name(&self) -> &str {
        self.backend.as_deref().map_or("offline", LlmBackend::name)
    }

    /// Current budget state.
    pub fn budget(&self) -> BudgetSummary {
        self.budget.summary()
    }

    /// Prepare one call: render and reserve.
    ///
    /// `None` means the caller should take its local fallback (no
    /// credential, budget cannot cover the worst case, or the prompt failed
    /// to render).
    pub fn prepare<C: Serialize>(&self, kind: CallKind, context: &C) -> Option<PreparedCall> {
        let backend = Arc::clone(self.backend.as_ref()?);
        let prompt = match self.prompts.render(kind, context) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(?kind, error = %e, "prompt render failed, using fallback");
                return None;
            }
        };
        let Some(reservation) = self
            .budget
            .try_reserve(prompt.estimated_tokens(), u64::from(self.max_tokens))
        else {
            debug!(?kind, "oracle budget exhausted, using fallback");
            return None;
        };
        Some(PreparedCall {
            kind,
            backend,
            prompt,
            reservation,
            budget: Arc::clone(&self.budget),
            timeout: self.timeout,
            max_tokens: self.max_tokens,
        })
    }
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("backend", &self.backend_name())
            .field("budget", &self.budget)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

/// One reserved, rendered call, ready to be awaited off the frame loop.
pub struct PreparedCall {
    kind: CallKind,
    backend: Arc<LlmBackend>,
    prompt: RenderedPrompt,
    reservation: Reservation,
    budget: Arc<Budget>,
    timeout: Duration,
    max_tokens: u32,
}

impl PreparedCall {
    /// Which call site this is.
    pub const fn kind(&self) -> CallKind {
        self.kind
    }

    /// Send the prompt and return the raw response text.
    ///
    /// Always settles the reservation: to the reported usage on success,
    /// to the full hold on failure or timeout.
    pub async fn run(self) -> Result<String, OracleError> {
        let result = tokio::time::timeout(
            self.timeout,
            self.backend.complete(&self.prompt, self.max_tokens),
        )
        .await;

        match result {
            Ok(Ok(completion)) => {
                self.budget.settle(
                    self.reservation,
                    Some((completion.input_tokens, completion.output_tokens)),
                );
                Ok(completion.text)
            }
            Ok(Err(e)) => {
                self.budget.settle(self.reservation, None);
                Err(e)
            }
            Err(_elapsed) => {
                self.budget.settle(self.reservation, None);
                Err(OracleError::Timeout(self.timeout.as_millis()))
            }
        }
    }

    /// Send the prompt and parse the response into `T`.
    pub async fn run_json<T: DeserializeOwned>(self) -> Result<T, OracleError> {
        let kind = self.kind;
        let text = self.run().await?;
        parse_json(&text).inspect_err(|e| {
            debug!(?kind, error = %e, raw_response = %text, "oracle response rejected");
        })
    }
}

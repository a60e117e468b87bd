//! Prompt templates via `minijinja`.
//!
//! Templates ship compiled into the binary. An operator may point
//! [`PromptEngine::with_overrides`] at a directory; any `*.j2` file found
//! there replaces the built-in template of the same name.

use std::path::Path;

use minijinja::Environment;
use serde::Serialize;

use crate::error::OracleError;
use crate::llm::estimate_tokens;

/// The four oracle call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Proximity interaction between creatures or with bones.
    Interaction,
    /// Behavior rule set for a child or a retargeted creature.
    Evolution,
    /// Scheduled whole-world plan.
    Holistic,
    /// Petition list synthesis.
    Petition,
}

impl CallKind {
    /// Template name for the user message.
    pub const fn template(self) -> &'static str {
        match self {
            Self::Interaction => "interaction.j2",
            Self::Evolution => "evolution.j2",
            Self::Holistic => "holistic.j2",
            Self::Petition => "petition.j2",
        }
    }
}

const SYSTEM: &str = "system.j2";

const BUILTIN: [(&str, &str); 5] = [
    (SYSTEM, include_str!("../templates/system.j2")),
    ("interaction.j2", include_str!("../templates/interaction.j2")),
    ("evolution.j2", include_str!("../templates/evolution.j2")),
    ("holistic.j2", include_str!("../templates/holistic.j2")),
    ("petition.j2", include_str!("../templates/petition.j2")),
];

/// Renders call contexts into prompts.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// A rendered prompt ready for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message.
    pub system: String,
    /// User message.
    pub user: String,
}

impl RenderedPrompt {
    /// Rough prompt size in tokens, used for budget reservations.
    pub fn estimated_tokens(&self) -> u64 {
        estimate_tokens(&self.system).saturating_add(estimate_tokens(&self.user))
    }
}

impl PromptEngine {
    /// Engine with the built-in templates.
    pub fn builtin() -> Result<Self, OracleError> {
        let mut env = Environment::new();
        for (name, source) in BUILTIN {
            env.add_template(name, source)
                .map_err(|e| OracleError::Template(format!("failed to add {name}: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Replace built-in templates with any same-named files in `dir`.
    pub fn with_overrides(mut self, dir: &Path) -> Result<Self, OracleError> {
        for (name, _) in BUILTIN {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path).map_err(|e| {
                OracleError::Template(format!("failed to read {}: {e}", path.display()))
            })?;
            self.env
                .add_template_owned(name, source)
                .map_err(|e| OracleError::Template(format!("failed to add {name}: {e}")))?;
            tracing::info!(template = name, path = %path.display(), "prompt template overridden");
        }
        Ok(self)
    }

    /// Render the system and user messages for a call site.
    pub fn render<C: Serialize>(
        &self,
        kind: CallKind,
        context: &C,
    ) -> Result<RenderedPrompt, OracleError> {
        let system = self.render_one(SYSTEM, context)?;
        let user = self.render_one(kind.template(), context)?;
        Ok(RenderedPrompt { system, user })
    }

    fn render_one<C: Serialize>(&self, name: &str, context: &C) -> Result<String, OracleError> {
        self.env
            .get_template(name)
            .map_err(|e| OracleError::Template(format!("missing template {name}: {e}")))?
            .render(context)
            .map_err(|e| OracleError::Template(format!("{name} render failed: {e}")))
    }
}

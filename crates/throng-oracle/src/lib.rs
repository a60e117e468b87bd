//! The arbitration oracle for the Throng simulation.
//!
//! Wraps an LLM behind a budget and four typed call sites: interactions,
//! behavior evolution, holistic evaluation, and petition synthesis. Every
//! failure mode (no credential, exhausted budget, timeout, backend error,
//! malformed output) resolves to "no effect"; callers fall back locally.
//!
//! # Modules
//!
//! - [`config`] -- Backend and budget configuration from the environment
//! - [`llm`] -- HTTP and scripted backends
//! - [`prompt`] -- `minijinja` templates per call site
//! - [`context`] -- Compact request contexts
//! - [`schema`] -- Response shapes and their validation
//! - [`parse`] -- Lenient JSON extraction
//! - [`budget`] -- Reservation-based spend ceiling
//! - [`oracle`] -- The prepare/run facade

pub mod budget;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod oracle;
pub mod parse;
pub mod prompt;
pub mod schema;

pub use budget::{Budget, BudgetSummary};
pub use config::{BackendType, LlmBackendConfig, OracleConfig};
pub use context::{
    CreatureBrief, Encounter, EvolutionContext, HolisticContext, InteractionContext,
    PetitionContext, ProposalBrief,
};
pub use error::OracleError;
pub use llm::{LlmBackend, ScriptedBackend};
pub use oracle::{Oracle, PreparedCall};
pub use parse::parse_json;
pub use prompt::{CallKind, PromptEngine};
pub use schema::{
    InteractionOutcome, PetitionDraft, PetitionList, Retarget, ValidatedPlan, VitalDelta,
    WorldPlan,
};

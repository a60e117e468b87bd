//! End-to-end tests of the prepare/run path with a scripted backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use rust_decimal::Decimal;
use throng_oracle::{
    CallKind, CreatureBrief, Encounter, InteractionContext, InteractionOutcome, LlmBackend, Oracle,
    OracleConfig, OracleError, PromptEngine, ScriptedBackend,
};
use throng_types::Creature;

fn context() -> InteractionContext {
    InteractionContext {
        encounter: Encounter::Creature,
        actor: CreatureBrief::from(&Creature::founder("ABCD", 0.0, 0.0)),
        other: Some(CreatureBrief::from(&Creature::founder("ABCE", 1.0, 0.0))),
        bone_lineage: None,
        kin: true,
        epoch: "Eden".to_owned(),
        pollution: 0,
        ancestral_memory: Vec::new(),
    }
}

fn scripted(backend: ScriptedBackend, config: &OracleConfig) -> Oracle {
    Oracle::with_backend(
        Some(LlmBackend::Scripted(backend)),
        config,
        PromptEngine::builtin().unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn scripted_response_parses_into_outcome() {
    let oracle = scripted(
        ScriptedBackend::always(
            r#"```json
{"actor": {"happiness": 5}, "other": {"happiness": 5}, "narrative": "they groomed each other"}
```"#,
        ),
        &OracleConfig::default(),
    );
    let call = oracle.prepare(CallKind::Interaction, &context()).unwrap();
    let outcome: InteractionOutcome = call.run_json().await.unwrap();
    assert!((outcome.actor.happiness - 5.0).abs() < f32::EPSILON);
    assert_eq!(outcome.narrative, "they groomed each other");

    let budget = oracle.budget();
    assert_eq!(budget.calls, 1);
    assert_eq!(budget.reserved, Decimal::ZERO);
    assert!(budget.spent > Decimal::ZERO);
}

#[tokio::test]
async fn malformed_response_is_a_parse_error() {
    let oracle = scripted(
        ScriptedBackend::always("the creatures simply wander off"),
        &OracleConfig::default(),
    );
    let call = oracle.prepare(CallKind::Interaction, &context()).unwrap();
    let result = call.run_json::<InteractionOutcome>().await;
    assert!(matches!(result, Err(OracleError::Parse(_))));
}

#[tokio::test]
async fn backend_failure_settles_full_reservation() {
    let backend = ScriptedBackend::default();
    backend.push_failure("503 service unavailable");
    let oracle = scripted(backend, &OracleConfig::default());
    let call = oracle.prepare(CallKind::Interaction, &context()).unwrap();
    assert!(call.run().await.is_err());
    let budget = oracle.budget();
    assert_eq!(budget.reserved, Decimal::ZERO);
    assert!(budget.spent > Decimal::ZERO);
}

#[test]
fn offline_oracle_never_prepares() {
    let oracle = Oracle::offline().unwrap();
    assert!(!oracle.has_credential());
    assert!(oracle.prepare(CallKind::Interaction, &context()).is_none());
    assert_eq!(oracle.backend_name(), "offline");
}

#[test]
fn exhausted_budget_refuses_dispatch() {
    let config = OracleConfig {
        budget: Decimal::ZERO,
        ..OracleConfig::default()
    };
    let oracle = scripted(ScriptedBackend::always("{}"), &config);
    assert!(oracle.has_credential());
    assert!(oracle.prepare(CallKind::Interaction, &context()).is_none());
    assert_eq!(oracle.budget().refused, 1);
}

#[test]
fn reservations_are_taken_at_prepare_time() {
    let oracle = scripted(ScriptedBackend::always("{}"), &OracleConfig::default());
    let first = oracle.prepare(CallKind::Interaction, &context());
    assert!(first.is_some());
    assert!(oracle.budget().reserved > Decimal::ZERO);
}

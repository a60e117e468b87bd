//! Response schemas, one per call site.
//!
//! Structural checks happen here (shape, finiteness, well-formed ids).
//! Range clamping and world-dependent checks happen where the response is
//! applied, in `throng-core`. Behavior responses deserialize straight into
//! [`throng_types::RuleSet`].

use serde::Deserialize;
use throng_types::CreatureId;

use crate::error::OracleError;

/// Vital and velocity changes for one party.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VitalDelta {
    /// Change to hunger.
    pub hunger: f32,
    /// Change to cleanliness.
    pub clean: f32,
    /// Change to happiness.
    pub happiness: f32,
    /// Change to x velocity.
    pub vx: f32,
    /// Change to y velocity.
    pub vy: f32,
}

impl VitalDelta {
    fn is_finite(&self) -> bool {
        [self.hunger, self.clean, self.happiness, self.vx, self.vy]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Outcome of one interaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InteractionOutcome {
    /// Changes to the acting creature.
    pub actor: VitalDelta,
    /// Changes to the other creature. Ignored for bone encounters.
    #[serde(default)]
    pub other: VitalDelta,
    /// One line describing what happened.
    pub narrative: String,
}

impl InteractionOutcome {
    /// Reject non-finite deltas and empty narratives.
    pub fn validate(&self) -> Result<(), OracleError> {
        if !self.actor.is_finite() || !self.other.is_finite() {
            return Err(OracleError::Invalid("non-finite delta".to_owned()));
        }
        if self.narrative.trim().is_empty() {
            return Err(OracleError::Invalid("empty narrative".to_owned()));
        }
        Ok(())
    }
}

/// A creature the plan wants nudged toward a trait.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Retarget {
    /// Durable id of the creature.
    pub creature_id: String,
    /// Trait to evolve toward.
    pub hint: String,
}

/// Holistic evaluation plan. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldPlan {
    /// Force the epoch to this ordinal.
    pub epoch: Option<u8>,
    /// A principle the throng now holds.
    pub principle: Option<String>,
    /// A narrative line for the chronicle.
    pub event: Option<String>,
    /// Change to pollution.
    pub pollution_delta: Option<f32>,
    /// Creatures to retarget.
    pub retarget: Vec<Retarget>,
}

/// A [`WorldPlan`] that passed validation, with ids resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    /// Forced epoch ordinal.
    pub epoch: Option<u8>,
    /// New principle.
    pub principle: Option<String>,
    /// Chronicle line.
    pub event: Option<String>,
    /// Pollution change.
    pub pollution_delta: Option<f32>,
    /// `(creature, hint)` pairs.
    pub retarget: Vec<(CreatureId, String)>,
}

impl WorldPlan {
    /// Validate the whole plan. Any bad field rejects all of it.
    pub fn validate(self, max_epoch: u8, max_retargets: usize) -> Result<ValidatedPlan, OracleError> {
        if let Some(epoch) = self.epoch
            && epoch > max_epoch
        {
            return Err(OracleError::Invalid(format!("unknown epoch ordinal {epoch}")));
        }
        if let Some(delta) = self.pollution_delta
            && !delta.is_finite()
        {
            return Err(OracleError::Invalid("non-finite pollution delta".to_owned()));
        }
        if self.retarget.len() > max_retargets {
            return Err(OracleError::Invalid(format!(
                "{} retargets exceeds {max_retargets}",
                self.retarget.len()
            )));
        }
        let retarget = self
            .retarget
            .into_iter()
            .map(|r| {
                CreatureId::parse(r.creature_id.trim())
                    .map(|id| (id, r.hint))
                    .ok_or_else(|| {
                        OracleError::Invalid(format!("bad creature id {}", r.creature_id))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedPlan {
            epoch: self.epoch,
            principle: non_empty(self.principle),
            event: non_empty(self.event),
            pollution_delta: self.pollution_delta,
            retarget,
        })
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())
}

/// One synthesized petition entry, before numbering.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PetitionDraft {
    /// What the throng asks for.
    pub text: String,
    /// 1 to 5.
    pub urgency: u8,
    /// Lineage spoken for, or `*`.
    #[serde(default = "everyone")]
    pub lineage_scope: String,
}

fn everyone() -> String {
    "*".to_owned()
}

/// Synthesized petition list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PetitionList {
    /// Ranked entries, most urgent first.
    pub petitions: Vec<PetitionDraft>,
}

impl PetitionList {
    /// Reject entries with empty text.
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.petitions.iter().any(|p| p.text.trim().is_empty()) {
            return Err(OracleError::Invalid("empty petition text".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_outcome_defaults_missing_fields() {
        let raw = r#"{"actor": {"happiness": 4}, "narrative": "they shared a fig"}"#;
        let outcome: Option<InteractionOutcome> = serde_json::from_str(raw).ok();
        assert!(outcome.as_ref().is_some_and(|o| o.validate().is_ok()));
        assert!(outcome.is_some_and(|o| o.other == VitalDelta::default()));
    }

    #[test]
    fn interaction_outcome_requires_narrative() {
        let raw = r#"{"actor": {"happiness": 4}}"#;
        assert!(serde_json::from_str::<InteractionOutcome>(raw).is_err());

        let blank = r#"{"actor": {}, "narrative": "  "}"#;
        let outcome: Option<InteractionOutcome> = serde_json::from_str(blank).ok();
        assert!(outcome.is_some_and(|o| o.validate().is_err()));
    }

    #[test]
    fn plan_with_bad_epoch_is_rejected_whole() {
        let plan = WorldPlan {
            epoch: Some(9),
            principle: Some("share".to_owned()),
            ..WorldPlan::default()
        };
        assert!(plan.validate(4, 12).is_err());
    }

    #[test]
    fn plan_with_bad_id_is_rejected_whole() {
        let plan = WorldPlan {
            retarget: vec![Retarget {
                creature_id: "nobody".to_owned(),
                hint: "brave".to_owned(),
            }],
            ..WorldPlan::default()
        };
        assert!(plan.validate(4, 12).is_err());
    }

    #[test]
    fn plan_validation_resolves_ids_and_drops_blank_text() {
        let id = CreatureId::new();
        let raw = format!(
            r#"{{"principle": "  ", "event": "a comet", "retarget": [{{"creature_id": "{id}", "hint": "curious"}}]}}"#
        );
        let plan: Option<WorldPlan> = serde_json::from_str(&raw).ok();
        let validated = plan.and_then(|p| p.validate(4, 12).ok());
        assert_eq!(validated.as_ref().and_then(|v| v.principle.clone()), None);
        assert_eq!(
            validated.as_ref().and_then(|v| v.event.clone()).as_deref(),
            Some("a comet")
        );
        assert_eq!(
            validated.map(|v| v.retarget),
            Some(vec![(id, "curious".to_owned())])
        );
    }

    #[test]
    fn petition_scope_defaults_to_everyone() {
        let raw = r#"{"petitions": [{"text": "more trees", "urgency": 3}]}"#;
        let list: Option<PetitionList> = serde_json::from_str(raw).ok();
        assert_eq!(
            list.and_then(|l| l.petitions.first().map(|p| p.lineage_scope.clone()))
                .as_deref(),
            Some("*")
        );
    }
}

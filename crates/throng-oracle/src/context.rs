//! Compact request contexts, one per call site.
//!
//! Each context is serialized into the prompt templates. They carry only
//! what the oracle needs to judge: vitals rounded to whole numbers, a few
//! recent log lines, and world-level memory.

use serde::Serialize;
use throng_types::{Creature, Epoch, PetitionEntry, Relationship, clamp_vital};

/// How many of a creature's newest log entries reach the oracle.
pub const RECENT_EVENTS: usize = 4;

/// One creature, as the oracle sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatureBrief {
    /// Durable id, as a string.
    pub id: String,
    /// Lineage fingerprint.
    pub lineage: String,
    /// Satiety, rounded.
    pub hunger: u32,
    /// Cleanliness, rounded.
    pub clean: u32,
    /// Happiness, rounded.
    pub happiness: u32,
    /// Ticks lived.
    pub age: u64,
    /// Evolution generation.
    pub generation: u32,
    /// Installed behavior description.
    pub behavior: Option<String>,
    /// Newest log entries, oldest first.
    pub recent_events: Vec<String>,
    /// Times a petition touching this creature was denied.
    pub denied_count: u32,
}

impl From<&Creature> for CreatureBrief {
    fn from(creature: &Creature) -> Self {
        Self {
            id: creature.id.to_string(),
            lineage: creature.lineage.clone(),
            hunger: whole(creature.hunger),
            clean: whole(creature.clean),
            happiness: whole(creature.happiness),
            age: creature.age,
            generation: creature.evolution_generation,
            behavior: creature.behavior.as_ref().map(|b| b.description.clone()),
            recent_events: creature.event_log.recent(RECENT_EVENTS).to_vec(),
            denied_count: creature.denied_count,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(vital: f32) -> u32 {
    // Clamped to [0, 100] first, so the cast is exact.
    clamp_vital(vital).round() as u32
}

/// What a creature ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Encounter {
    /// Another living creature.
    Creature,
    /// The bones of a dead one.
    Bone,
}

/// Context for one proximity interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionContext {
    /// Kind of encounter.
    pub encounter: Encounter,
    /// The creature whose log receives the narrative.
    pub actor: CreatureBrief,
    /// The other creature, for creature encounters.
    pub other: Option<CreatureBrief>,
    /// Lineage of the deceased, for bone encounters.
    pub bone_lineage: Option<String>,
    /// Whether the two are kin.
    pub kin: bool,
    /// Current epoch name.
    pub epoch: String,
    /// Pollution, rounded.
    pub pollution: u32,
    /// Memory surviving earlier collapses.
    pub ancestral_memory: Vec<String>,
}

/// Context for evolving one creature's behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvolutionContext {
    /// The creature receiving the behavior.
    pub subject: CreatureBrief,
    /// Parent's behavior description, if it had one.
    pub parent_behavior: Option<String>,
    /// Parent's newest log entries.
    pub parent_events: Vec<String>,
    /// Trait to steer toward, from a holistic plan.
    pub hint: Option<String>,
    /// Current epoch name.
    pub epoch: String,
    /// Rule count ceiling.
    pub max_rules: usize,
}

/// Context for the scheduled holistic evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolisticContext {
    /// Tick counter.
    pub tick: u64,
    /// Current epoch name.
    pub epoch: String,
    /// Current epoch ordinal.
    pub epoch_ordinal: u8,
    /// Living creatures.
    pub population: usize,
    /// Pollution, rounded.
    pub pollution: u32,
    /// Recent world events.
    pub chronicle: Vec<String>,
    /// Principles already held.
    pub principles: Vec<String>,
    /// Memory surviving earlier collapses.
    pub ancestral_memory: Vec<String>,
    /// Sampled creatures with their histories.
    pub sample: Vec<CreatureBrief>,
    /// How the throng regards the authority.
    pub relationship: String,
}

/// One creature's pending desire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalBrief {
    /// Proposer's lineage.
    pub lineage: String,
    /// The desire.
    pub text: String,
}

/// Context for synthesizing the petition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetitionContext {
    /// Current epoch name.
    pub epoch: String,
    /// How the throng regards the authority.
    pub relationship: String,
    /// Pooled desires.
    pub proposals: Vec<ProposalBrief>,
    /// Entries still awaiting an answer.
    pub unresolved: Vec<PetitionEntry>,
    /// Entry count ceiling.
    pub max_entries: usize,
}

/// Lowercase label for prompts.
pub fn relationship_label(relationship: Relationship) -> String {
    match relationship {
        Relationship::Absent => "absent",
        Relationship::Benevolent => "benevolent",
        Relationship::Capricious => "capricious",
        Relationship::Feared => "feared",
    }
    .to_owned()
}

/// Epoch name for prompts.
pub fn epoch_label(epoch: Epoch) -> String {
    epoch.name().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brief_rounds_vitals_and_trims_log() {
        let mut creature = Creature::founder("ABCD", 0.0, 0.0);
        creature.hunger = 41.6;
        creature.happiness = 150.0;
        for i in 0..8 {
            creature.event_log.push(format!("event {i}"));
        }
        let brief = CreatureBrief::from(&creature);
        assert_eq!(brief.hunger, 42);
        assert_eq!(brief.happiness, 100);
        assert_eq!(brief.recent_events.len(), RECENT_EVENTS);
        assert_eq!(brief.recent_events.last().map(String::as_str), Some("event 7"));
    }

    #[test]
    fn encounter_serializes_snake_case() {
        let json = serde_json::to_string(&Encounter::Bone).unwrap_or_default();
        assert_eq!(json, "\"bone\"");
    }
}

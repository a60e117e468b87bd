//! Behavior evolution: who gets which rule set, and with what generation.
//!
//! Requests come from births (child evolves from its parent) and from
//! holistic plans (a creature is retargeted toward a hinted trait). The
//! request captures everything the local fallback needs at dispatch, so a
//! parent dying before the answer arrives changes nothing.

use throng_oracle::context::epoch_label;
use throng_oracle::{CreatureBrief, EvolutionContext};
use throng_types::{CreatureKey, RuleSet};
use tracing::{debug, info};

use crate::behavior::{self, BehaviorError};
use crate::config::BehaviorConfig;
use crate::world::World;

/// Parent history shown to the oracle.
const PARENT_EVENTS: usize = 4;

/// A pending evolution for one creature.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionRequest {
    /// The creature receiving the behavior.
    pub subject: CreatureKey,
    /// Generation to record on install.
    pub generation: u32,
    /// Rule set the local mutation starts from.
    pub parent_rules: Option<RuleSet>,
    /// Oracle context.
    pub context: EvolutionContext,
}

/// A newborn evolving from its parent. `None` if either is gone or the
/// child was born into a corrupted branch.
pub fn for_birth(
    world: &World,
    parent: CreatureKey,
    child: CreatureKey,
    max_rules: usize,
) -> Option<EvolutionRequest> {
    let parent = world.creatures.get(parent)?;
    let subject = world.living(child).filter(|c| !c.behavior_corrupted)?;
    Some(EvolutionRequest {
        subject: child,
        generation: subject.evolution_generation,
        parent_rules: parent.behavior.clone(),
        context: EvolutionContext {
            subject: CreatureBrief::from(subject),
            parent_behavior: parent.behavior.as_ref().map(|b| b.description.clone()),
            parent_events: parent.event_log.recent(PARENT_EVENTS).to_vec(),
            hint: None,
            epoch: epoch_label(world.epoch),
            max_rules,
        },
    })
}

/// A living creature retargeted toward `hint`. It is its own parent.
/// Creatures of a corrupted branch are never retargeted.
pub fn for_retarget(
    world: &World,
    key: CreatureKey,
    hint: String,
    max_rules: usize,
) -> Option<EvolutionRequest> {
    let subject = world.living(key).filter(|c| !c.behavior_corrupted)?;
    Some(EvolutionRequest {
        subject: key,
        generation: subject.evolution_generation.saturating_add(1),
        parent_rules: subject.behavior.clone(),
        context: EvolutionContext {
            subject: CreatureBrief::from(subject),
            parent_behavior: subject.behavior.as_ref().map(|b| b.description.clone()),
            parent_events: subject.event_log.recent(PARENT_EVENTS).to_vec(),
            hint: Some(hint),
            epoch: epoch_label(world.epoch),
            max_rules,
        },
    })
}

/// Why an evolved behavior was not installed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstallError {
    /// The creature is gone or dead.
    #[error("creature is no longer alive")]
    Gone,

    /// The creature's branch has had a behavior fault.
    #[error("behavior branch is corrupted")]
    Corrupted,

    /// The rule set failed validation.
    #[error(transparent)]
    Invalid(#[from] BehaviorError),
}

/// Validate and install a rule set on a living creature.
pub fn install(
    world: &mut World,
    key: CreatureKey,
    rules: RuleSet,
    generation: u32,
    limits: &BehaviorConfig,
) -> Result<(), InstallError> {
    behavior::validate(&rules, limits)?;
    let creature = world.living_mut(key).ok_or(InstallError::Gone)?;
    if creature.behavior_corrupted {
        return Err(InstallError::Corrupted);
    }
    info!(
        creature_id = %creature.id,
        generation,
        behavior = %rules.description,
        "behavior installed"
    );
    creature
        .event_log
        .push(format!("took up new habits: {}", rules.description));
    creature.evolution_generation = generation;
    creature.behavior = Some(rules);
    Ok(())
}

/// The local path: mutate the parent's rule set and install it. Without a
/// parent rule set the creature is left as it is.
pub fn fallback(
    world: &mut World,
    request: &EvolutionRequest,
    seed: u64,
    limits: &BehaviorConfig,
) -> Result<bool, InstallError> {
    let Some(parent) = request.parent_rules.as_ref() else {
        debug!("no parent behavior to mutate");
        return Ok(false);
    };
    let rules = behavior::mutate(parent, seed, limits);
    install(world, request.subject, rules, request.generation, limits)?;
    Ok(true)
}

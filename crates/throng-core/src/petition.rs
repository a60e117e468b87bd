//! The petition economy.
//!
//! Creatures accumulate desires. On the evaluation cadence those desires
//! and any unanswered entries are pooled and synthesized into a short,
//! ranked petition list. The host answers each entry with a grant, a
//! denial, or silence.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;
use throng_oracle::context::{epoch_label, relationship_label};
use throng_oracle::{PetitionContext, PetitionDraft, ProposalBrief};
use throng_types::{
    CreatureKey, FoodItem, PetitionAction, PetitionEntry, PetitionId, Tree, clamp_vital,
};
use tracing::info;

use crate::config::PetitionConfig;
use crate::lineage::{EVERYONE, in_scope, is_kin, is_well_formed};
use crate::world::World;

/// Most urgent an entry can be.
pub const MAX_URGENCY: u8 = 5;

/// Longest petition text kept, in characters.
const TEXT_MAX_CHARS: usize = 120;

/// Height granted food is dropped from.
const GRANT_DROP_HEIGHT: f32 = 4.0;

/// The desire a creature's current state suggests.
pub fn desire_for<R: Rng + ?Sized>(world: &World, key: CreatureKey, rng: &mut R) -> Option<String> {
    let creature = world.living(key)?;
    let desire = if creature.hunger < 40.0 {
        "more food"
    } else if creature.clean < 40.0 {
        "clean water to wash in"
    } else if world.pollution > 5.0 {
        "clean air"
    } else if creature.happiness < 40.0 {
        "a friend to play with"
    } else if world.trees.is_empty() {
        "more trees"
    } else {
        ["more trees", "a feast", "a day of play"]
            .choose(rng)
            .copied()
            .unwrap_or("more trees")
    };
    Some(desire.to_owned())
}

/// Let one random living creature voice a desire.
pub fn propose<R: Rng + ?Sized>(world: &mut World, rng: &mut R) -> Option<CreatureKey> {
    let key = *world.living_keys().choose(rng)?;
    let desire = desire_for(world, key, rng)?;
    let creature = world.living_mut(key)?;
    creature.propose(desire);
    Some(key)
}

/// Everything a synthesis pass consumes, captured at dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PetitionPool {
    /// How many leading proposals each creature contributed.
    pub contributed: Vec<(CreatureKey, usize)>,
    /// The pooled desires.
    pub proposals: Vec<ProposalBrief>,
    /// Entries that were unanswered at dispatch.
    pub unresolved: Vec<PetitionEntry>,
}

impl PetitionPool {
    /// Pool the world's pending desires and unanswered entries. `None`
    /// when there is nothing to synthesize.
    pub fn gather(world: &World) -> Option<Self> {
        let mut pool = Self {
            unresolved: world.petitions.clone(),
            ..Self::default()
        };
        for (key, creature) in world.creatures.iter().filter(|(_, c)| c.alive) {
            if creature.proposals.is_empty() {
                continue;
            }
            pool.contributed.push((key, creature.proposals.len()));
            pool.proposals.extend(creature.proposals.iter().map(|text| ProposalBrief {
                lineage: creature.lineage.clone(),
                text: text.clone(),
            }));
        }
        (!pool.proposals.is_empty() || !pool.unresolved.is_empty()).then_some(pool)
    }

    /// The oracle context for this pool.
    pub fn context(&self, world: &World, max_entries: usize) -> PetitionContext {
        PetitionContext {
            epoch: epoch_label(world.epoch),
            relationship: relationship_label(world.relationship()),
            proposals: self.proposals.clone(),
            unresolved: self.unresolved.clone(),
            max_entries,
        }
    }
}

/// Rank the pool without the oracle: identical desires are merged and
/// ranked by how often they were voiced.
pub fn fallback_rank(pool: &PetitionPool, max_entries: usize) -> Vec<PetitionDraft> {
    struct Tally {
        count: usize,
        first_seen: usize,
        lineages: Vec<String>,
        carried: Option<(u8, String)>,
    }

    let mut tallies: HashMap<String, Tally> = HashMap::new();
    let mut order = 0_usize;
    let mut tally = |text: &str| -> Option<String> {
        let key = text.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        tallies.entry(key.clone()).or_insert_with(|| {
            order = order.saturating_add(1);
            Tally {
                count: 0,
                first_seen: order,
                lineages: Vec::new(),
                carried: None,
            }
        });
        Some(key)
    };

    let mut keys = Vec::new();
    for entry in &pool.unresolved {
        if let Some(key) = tally(&entry.text) {
            keys.push((key, None, Some((entry.urgency, entry.lineage_scope.clone()))));
        }
    }
    for proposal in &pool.proposals {
        if let Some(key) = tally(&proposal.text) {
            keys.push((key, Some(proposal.lineage.clone()), None));
        }
    }
    for (key, lineage, carried) in keys {
        if let Some(t) = tallies.get_mut(&key) {
            t.count = t.count.saturating_add(1);
            t.lineages.extend(lineage);
            if carried.is_some() {
                t.carried = carried;
            }
        }
    }

    let mut ranked: Vec<(String, Tally)> = tallies.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });

    ranked
        .into_iter()
        .take(max_entries)
        .map(|(text, t)| {
            let voiced = u8::try_from(t.count).unwrap_or(MAX_URGENCY);
            let carried_urgency = t.carried.as_ref().map_or(0, |(u, _)| *u);
            let urgency = voiced.max(carried_urgency).clamp(1, MAX_URGENCY);
            let lineage_scope = match (&t.carried, t.lineages.first()) {
                (Some((_, scope)), _) => scope.clone(),
                (None, Some(first)) if t.lineages.iter().all(|l| is_kin(l, first)) => first.clone(),
                _ => EVERYONE.to_owned(),
            };
            PetitionDraft {
                text,
                urgency,
                lineage_scope,
            }
        })
        .collect()
}

/// Replace the pooled entries with freshly synthesized drafts and clear
/// the proposals the pool consumed.
///
/// A draft repeating an entry granted or denied since dispatch is dropped,
/// so an answered petition never comes back under a new id.
pub fn apply_synthesis(
    world: &mut World,
    pool: &PetitionPool,
    drafts: Vec<PetitionDraft>,
    max_entries: usize,
) {
    for (key, count) in &pool.contributed {
        if let Some(creature) = world.creatures.get_mut(*key) {
            let n = (*count).min(creature.proposals.len());
            creature.proposals.drain(..n);
        }
    }

    // Pooled entries the host answered while the synthesis was in flight.
    let answered: Vec<String> = pool
        .unresolved
        .iter()
        .filter(|pooled| world.petitions.iter().all(|e| e.id != pooled.id))
        .map(|pooled| pooled.text.trim().to_lowercase())
        .collect();
    let pooled: Vec<PetitionId> = pool.unresolved.iter().map(|e| e.id).collect();
    world.petitions.retain(|e| !pooled.contains(&e.id));

    for draft in drafts {
        let text: String = draft.text.trim().chars().take(TEXT_MAX_CHARS).collect();
        if text.is_empty() || answered.contains(&text.to_lowercase()) {
            continue;
        }
        let scope = draft.lineage_scope.trim();
        let lineage_scope = if scope == EVERYONE || is_well_formed(scope) {
            scope.to_owned()
        } else {
            EVERYONE.to_owned()
        };
        let id = world.next_petition_id;
        world.next_petition_id = id.saturating_add(1);
        world.petitions.push(PetitionEntry {
            id,
            text,
            urgency: draft.urgency.clamp(1, MAX_URGENCY),
            lineage_scope,
        });
    }

    world.petitions.sort_by(|a, b| b.urgency.cmp(&a.urgency));
    world.petitions.truncate(max_entries);
    info!(entries = world.petitions.len(), "petition list synthesized");
}

/// What a grant did to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantEffect {
    /// Trees were planted.
    Trees,
    /// Stored and scattered food.
    Food,
    /// Pollution relief.
    CleanAir,
    /// Everyone was cheered.
    Joy,
    /// A small blessing.
    Blessing,
}

impl GrantEffect {
    /// Match a petition's text to its effect by keyword.
    pub fn for_text(text: &str) -> Self {
        let text = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
        if has(&["tree"]) {
            Self::Trees
        } else if has(&["food", "eat"]) {
            Self::Food
        } else if has(&["clean", "air", "pollution", "water"]) {
            Self::CleanAir
        } else if has(&["play", "joy", "happ", "friend"]) {
            Self::Joy
        } else {
            Self::Blessing
        }
    }
}

/// Answer a petition entry. Returns `false` if no such entry is active.
pub fn resolve<R: Rng + ?Sized>(
    world: &mut World,
    id: PetitionId,
    action: PetitionAction,
    config: &PetitionConfig,
    rng: &mut R,
) -> bool {
    let Some(position) = world.petitions.iter().position(|e| e.id == id) else {
        return false;
    };
    if action == PetitionAction::Ignore {
        return true;
    }
    let entry = world.petitions.remove(position);

    match action {
        PetitionAction::Grant => {
            let effect = GrantEffect::for_text(&entry.text);
            grant(world, effect, config, rng);
            world.grants = world.grants.saturating_add(1);
            world.push_chronicle(format!("the sky granted {}", entry.text));
            info!(petition_id = id, text = %entry.text, ?effect, "petition granted");
        }
        PetitionAction::Deny => {
            deny(world, &entry, config);
            world.denials = world.denials.saturating_add(1);
            world.push_chronicle(format!("the sky refused {}", entry.text));
            info!(petition_id = id, text = %entry.text, scope = %entry.lineage_scope, "petition denied");
        }
        PetitionAction::Ignore => {}
    }
    true
}

fn grant<R: Rng + ?Sized>(world: &mut World, effect: GrantEffect, config: &PetitionConfig, rng: &mut R) {
    match effect {
        GrantEffect::Trees => {
            for _ in 0..config.grant_trees {
                let (x, y) = world.random_point(rng);
                world.trees.insert(Tree::planted(x, y, config.grant_tree_health));
            }
        }
        GrantEffect::Food => {
            world.resources.food = world.resources.food.saturating_add(config.grant_food_ledger);
            for _ in 0..config.grant_food_items {
                let (x, y) = world.random_point(rng);
                world.food.insert(FoodItem::dropped(x, y, GRANT_DROP_HEIGHT, world.tick));
            }
        }
        GrantEffect::CleanAir => world.adjust_pollution(-config.grant_pollution_relief),
        GrantEffect::Joy => cheer(world, config.grant_joy),
        GrantEffect::Blessing => cheer(world, config.grant_blessing),
    }
}

fn cheer(world: &mut World, amount: f32) {
    for creature in world.creatures.values_mut().filter(|c| c.alive) {
        creature.happiness = clamp_vital(creature.happiness + amount);
    }
}

fn deny(world: &mut World, entry: &PetitionEntry, config: &PetitionConfig) {
    for creature in world
        .creatures
        .values_mut()
        .filter(|c| c.alive && in_scope(&c.lineage, &entry.lineage_scope))
    {
        creature.happiness = clamp_vital(creature.happiness - config.deny_penalty);
        creature.denied_count = creature.denied_count.saturating_add(1);
        creature.event_log.push(format!("was refused {}", entry.text));
    }
}

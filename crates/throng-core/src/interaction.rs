//! Proximity-gated interaction arbitration.
//!
//! Every frame, living creatures that come within range of each other or
//! of a bone pass through a cooldown gate. A pair that fires is stamped
//! immediately, then either handed to the oracle or resolved by the local
//! fallback. Oracle outcomes come back later through [`apply_outcome`].

use std::collections::HashMap;

use throng_oracle::context::epoch_label;
use throng_oracle::{CreatureBrief, Encounter, InteractionContext, InteractionOutcome, VitalDelta};
use throng_types::{BoneKey, Creature, CreatureId, CreatureKey, clamp_vital};

use crate::config::InteractionConfig;
use crate::lineage::is_kin;
use crate::world::World;

/// Longest narrative kept from an oracle outcome, in characters.
const NARRATIVE_MAX_CHARS: usize = 160;

/// Bounded map from canonical pair key to the tick the pair last fired.
///
/// A stamp is only dropped once it is older than `horizon`, the longest
/// cooldown in use. When the table is full of live stamps, new pairs are
/// refused rather than letting a cooling pair fire again.
#[derive(Debug, Clone)]
pub struct CooldownTable {
    stamps: HashMap<String, u64>,
    capacity: usize,
    horizon: u64,
}

impl CooldownTable {
    /// An empty table holding at most `capacity` stamps, each kept for at
    /// least `horizon` ticks.
    pub fn new(capacity: usize, horizon: u64) -> Self {
        Self {
            stamps: HashMap::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            horizon,
        }
    }

    /// True if the pair is within range and not cooling down.
    pub fn should_fire(
        &self,
        key: &str,
        distance: f32,
        proximity: f32,
        cooldown_ticks: u64,
        now: u64,
    ) -> bool {
        if distance.is_nan() || distance > proximity {
            return false;
        }
        self.stamps
            .get(key)
            .is_none_or(|&stamped| now.saturating_sub(stamped) > cooldown_ticks)
    }

    /// Record that the pair fired at `now`. Returns `false`, recording
    /// nothing, if the pair is new and every held stamp is still live.
    pub fn stamp(&mut self, key: String, now: u64) -> bool {
        if !self.stamps.contains_key(&key) && self.stamps.len() >= self.capacity {
            self.prune(now);
            if self.stamps.len() >= self.capacity {
                return false;
            }
        }
        self.stamps.insert(key, now);
        true
    }

    /// Drop stamps older than the horizon.
    pub fn prune(&mut self, now: u64) {
        let horizon = self.horizon;
        self.stamps
            .retain(|_, stamped| now.saturating_sub(*stamped) <= horizon);
    }

    /// [`should_fire`](Self::should_fire), stamping when it does.
    pub fn try_fire(
        &mut self,
        key: String,
        distance: f32,
        proximity: f32,
        cooldown_ticks: u64,
        now: u64,
    ) -> bool {
        self.should_fire(&key, distance, proximity, cooldown_ticks, now) && self.stamp(key, now)
    }

    /// Tick the pair last fired, if remembered.
    pub fn last_fired(&self, key: &str) -> Option<u64> {
        self.stamps.get(key).copied()
    }

    /// Number of remembered pairs.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether no pair is remembered.
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Order-independent key for two creatures.
pub fn pair_key(a: CreatureId, b: CreatureId) -> String {
    if a <= b { format!("{a}:{b}") } else { format!("{b}:{a}") }
}

/// Key for a creature mourning at the bones of `deceased`.
pub fn bone_pair_key(creature: CreatureId, deceased: CreatureId) -> String {
    format!("{creature}:bone:{deceased}")
}

/// A gated encounter that fired this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meeting {
    /// Two living creatures. The first is the actor.
    Creatures {
        /// Receives the narrative.
        actor: CreatureKey,
        /// The other party.
        other: CreatureKey,
    },
    /// A living creature at a bone.
    Bone {
        /// The mourner.
        creature: CreatureKey,
        /// The bone.
        bone: BoneKey,
    },
}

/// Run every living pair and creature-bone pair through the gate.
///
/// Pairs that fire are stamped before this returns.
pub fn gate(world: &mut World, config: &InteractionConfig) -> Vec<Meeting> {
    let now = world.tick;
    let living: Vec<(CreatureKey, CreatureId, f32, f32)> = world
        .creatures
        .iter()
        .filter(|(_, c)| c.alive)
        .map(|(k, c)| (k, c.id, c.x, c.y))
        .collect();

    let mut meetings = Vec::new();
    for (i, &(key_a, id_a, xa, ya)) in living.iter().enumerate() {
        for &(key_b, id_b, xb, yb) in living.iter().skip(i.saturating_add(1)) {
            let distance = (xa - xb).hypot(ya - yb);
            if world.cooldowns.try_fire(
                pair_key(id_a, id_b),
                distance,
                config.creature_proximity,
                config.creature_cooldown_ticks,
                now,
            ) {
                meetings.push(Meeting::Creatures {
                    actor: key_a,
                    other: key_b,
                });
            }
        }
        for (bone_key, bone) in &world.bones {
            let distance = (xa - bone.x).hypot(ya - bone.y);
            if world.cooldowns.try_fire(
                bone_pair_key(id_a, bone.creature_id),
                distance,
                config.bone_proximity,
                config.bone_cooldown_ticks,
                now,
            ) {
                meetings.push(Meeting::Bone {
                    creature: key_a,
                    bone: bone_key,
                });
            }
        }
    }
    meetings
}

/// Oracle context for a meeting, or `None` if a party is gone.
pub fn context(world: &World, meeting: Meeting) -> Option<InteractionContext> {
    let (encounter, actor, other, bone_lineage, kin) = match meeting {
        Meeting::Creatures { actor, other } => {
            let a = world.living(actor)?;
            let b = world.living(other)?;
            (
                Encounter::Creature,
                a,
                Some(CreatureBrief::from(b)),
                None,
                is_kin(&a.lineage, &b.lineage),
            )
        }
        Meeting::Bone { creature, bone } => {
            let a = world.living(creature)?;
            let bone = world.bones.get(bone)?;
            (
                Encounter::Bone,
                a,
                None,
                Some(bone.lineage.clone()),
                is_kin(&a.lineage, &bone.lineage),
            )
        }
    };
    Some(InteractionContext {
        encounter,
        actor: CreatureBrief::from(actor),
        other,
        bone_lineage,
        kin,
        epoch: epoch_label(world.epoch),
        pollution: whole_pollution(world.pollution),
        ancestral_memory: world.ancestral_memory.clone(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_pollution(pollution: f32) -> u32 {
    // Pollution is kept within [0, 10].
    pollution.clamp(0.0, 10.0).round() as u32
}

/// Resolve a meeting without the oracle.
pub fn fallback(world: &mut World, meeting: Meeting, config: &InteractionConfig) {
    match meeting {
        Meeting::Creatures { actor, other } => fallback_creatures(world, actor, other, config),
        Meeting::Bone { creature, bone } => fallback_bone(world, creature, bone, config),
    }
}

fn fallback_creatures(
    world: &mut World,
    a: CreatureKey,
    b: CreatureKey,
    config: &InteractionConfig,
) {
    let (Some(first), Some(second)) = (world.living(a), world.living(b)) else {
        return;
    };
    let kin = is_kin(&first.lineage, &second.lineage);
    let positions = [
        (a, first.x, first.y, second.x, second.y),
        (b, second.x, second.y, first.x, first.y),
    ];

    for (key, x, y, ox, oy) in positions {
        let Some(creature) = world.living_mut(key) else {
            continue;
        };
        if kin {
            creature.happiness = clamp_vital(creature.happiness + config.kin_happiness);
        }
        if creature.hunger < config.crisis_hunger {
            let (dx, dy) = (x - ox, y - oy);
            let length = dx.hypot(dy);
            if length > f32::EPSILON {
                creature.vx = dx / length * config.evasive_speed;
                creature.vy = dy / length * config.evasive_speed;
            }
        }
    }
}

fn fallback_bone(world: &mut World, key: CreatureKey, bone: BoneKey, config: &InteractionConfig) {
    let Some(lineage) = world.bones.get(bone).map(|b| b.lineage.clone()) else {
        return;
    };
    let Some(creature) = world.living_mut(key) else {
        return;
    };
    let penalty = if creature.deaths_witnessed >= config.mourning_dampen_after {
        config.mourning_penalty / 2.0
    } else {
        config.mourning_penalty
    };
    creature.happiness = clamp_vital(creature.happiness - penalty);
    creature.deaths_witnessed = creature.deaths_witnessed.saturating_add(1);
    creature.event_log.push(format!("mourned at the bones of a {lineage}"));
}

/// Apply an oracle outcome to the parties that are still alive.
///
/// Returns `false` (and changes nothing) if the actor is gone or dead.
/// Every delta is clamped to the configured limit, vitals to their range,
/// and velocity to `max_speed`.
pub fn apply_outcome(
    world: &mut World,
    actor: CreatureKey,
    other: Option<CreatureKey>,
    outcome: &InteractionOutcome,
    config: &InteractionConfig,
    max_speed: f32,
) -> bool {
    let narrative: String = outcome.narrative.trim().chars().take(NARRATIVE_MAX_CHARS).collect();
    let Some(creature) = world.living_mut(actor) else {
        return false;
    };
    apply_delta(creature, &outcome.actor, config.delta_limit, max_speed);
    creature.event_log.push(narrative.clone());

    if let Some(other) = other.filter(|k| *k != actor)
        && let Some(creature) = world.living_mut(other)
    {
        apply_delta(creature, &outcome.other, config.delta_limit, max_speed);
    }

    world.announce(narrative, config.narrative_ticks);
    true
}

fn apply_delta(creature: &mut Creature, delta: &VitalDelta, limit: f32, max_speed: f32) {
    let bound = |v: f32| if v.is_finite() { v.clamp(-limit, limit) } else { 0.0 };
    creature.hunger += bound(delta.hunger);
    creature.clean += bound(delta.clean);
    creature.happiness += bound(delta.happiness);
    creature.vx += bound(delta.vx);
    creature.vy += bound(delta.vy);
    creature.clamp_vitals();
    creature.clamp_velocity(max_speed);
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use throng_types::Bone;

    use super::*;
    use crate::config::ThrongConfig;

    fn world_with(creatures: &[(&str, f32, f32)]) -> (World, Vec<CreatureKey>) {
        let mut world = World::empty(&ThrongConfig::default());
        let keys = creatures
            .iter()
            .map(|(lineage, x, y)| world.creatures.insert(Creature::founder(*lineage, *x, *y)))
            .collect();
        (world, keys)
    }

    #[test]
    fn pair_key_is_order_independent() {
        let (a, b) = (CreatureId::new(), CreatureId::new());
        assert_eq!(pair_key(a, b), pair_key(b, a));
    }

    #[test]
    fn gate_respects_distance_and_cooldown() {
        let mut table = CooldownTable::new(8, 600);
        assert!(!table.try_fire("a:b".to_owned(), 2.0, 1.2, 600, 10));
        assert!(table.try_fire("a:b".to_owned(), 1.0, 1.2, 600, 10));
        assert!(!table.try_fire("a:b".to_owned(), 1.0, 1.2, 600, 300));
        assert!(!table.try_fire("a:b".to_owned(), 1.0, 1.2, 600, 610));
        assert!(table.try_fire("a:b".to_owned(), 1.0, 1.2, 600, 611));
        assert_eq!(table.last_fired("a:b"), Some(611));
    }

    #[test]
    fn nan_distance_never_fires() {
        let table = CooldownTable::new(8, 600);
        assert!(!table.should_fire("a:b", f32::NAN, 1.2, 600, 0));
    }

    #[test]
    fn full_table_keeps_live_stamps_and_refuses_new_pairs() {
        let mut table = CooldownTable::new(2, 600);
        assert!(table.stamp("a".to_owned(), 1));
        assert!(table.stamp("b".to_owned(), 5));
        assert!(!table.stamp("c".to_owned(), 9));
        assert_eq!(table.len(), 2);
        assert_eq!(table.last_fired("a"), Some(1));
        assert_eq!(table.last_fired("c"), None);
        assert!(!table.try_fire("a".to_owned(), 0.5, 1.2, 600, 9));
        assert!(table.stamp("b".to_owned(), 9));
    }

    #[test]
    fn full_table_reclaims_expired_stamps() {
        let mut table = CooldownTable::new(2, 600);
        table.stamp("a".to_owned(), 1);
        table.stamp("b".to_owned(), 400);
        assert!(table.stamp("c".to_owned(), 602));
        assert_eq!(table.last_fired("a"), None);
        assert_eq!(table.last_fired("b"), Some(400));
        assert_eq!(table.last_fired("c"), Some(602));
    }

    #[test]
    fn crowded_gate_never_refires_inside_the_window() {
        let mut config = ThrongConfig::default();
        config.interaction.cooldown_capacity = 512;
        let mut world = World::empty(&config);
        for i in 0..40_u8 {
            let x = 10.0 + f32::from(i % 8) * 0.05;
            let y = 10.0 + f32::from(i / 8) * 0.05;
            world.creatures.insert(Creature::founder("ABCD", x, y));
        }
        let first = gate(&mut world, &config.interaction);
        assert_eq!(first.len(), 512);
        for _ in 0..600 {
            world.tick += 1;
            assert!(gate(&mut world, &config.interaction).is_empty());
        }
        world.tick += 1;
        assert_eq!(gate(&mut world, &config.interaction).len(), 512);
    }

    #[test]
    fn gate_fires_once_per_pair_per_window() {
        let (mut world, _) = world_with(&[("ABCD", 5.0, 5.0), ("ABCE", 5.5, 5.0), ("QRST", 20.0, 20.0)]);
        let config = InteractionConfig::default();
        assert_eq!(gate(&mut world, &config).len(), 1);
        for _ in 0..600 {
            world.tick += 1;
            assert!(gate(&mut world, &config).is_empty());
        }
        world.tick += 1;
        assert_eq!(gate(&mut world, &config).len(), 1);
    }

    #[test]
    fn gate_finds_bones() {
        let (mut world, keys) = world_with(&[("ABCD", 5.0, 5.0)]);
        world.bones.insert(Bone::at(5.5, 5.0, CreatureId::new(), "WXYZ"));
        let meetings = gate(&mut world, &InteractionConfig::default());
        assert!(matches!(
            meetings.as_slice(),
            [Meeting::Bone { creature, .. }] if Some(creature) == keys.first()
        ));
    }

    #[test]
    fn kin_fallback_is_bounded() {
        let (mut world, keys) = world_with(&[("ABCD", 5.0, 5.0), ("ABCE", 5.5, 5.0)]);
        let (a, b) = (keys[0], keys[1]);
        let config = InteractionConfig::default();
        for _ in 0..50 {
            let before = world.creatures[a].happiness;
            fallback(&mut world, Meeting::Creatures { actor: a, other: b }, &config);
            let after = world.creatures[a].happiness;
            assert!(after >= before);
            assert!(after - before <= config.kin_happiness + f32::EPSILON);
            assert!(after <= 100.0);
        }
        assert!((world.creatures[b].happiness - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn strangers_in_crisis_flee() {
        let (mut world, keys) = world_with(&[("ABCD", 5.0, 5.0), ("WXYZ", 6.0, 5.0)]);
        let (a, b) = (keys[0], keys[1]);
        world.creatures[a].hunger = 10.0;
        let happiness = world.creatures[a].happiness;
        fallback(&mut world, Meeting::Creatures { actor: a, other: b }, &InteractionConfig::default());
        assert!(world.creatures[a].vx < 0.0);
        assert!((world.creatures[a].happiness - happiness).abs() < f32::EPSILON);
        assert!(world.creatures[b].vx.abs() < f32::EPSILON);
    }

    #[test]
    fn mourning_is_dampened_after_repeated_deaths() {
        let (mut world, keys) = world_with(&[("ABCD", 5.0, 5.0)]);
        let key = keys[0];
        let bone = world.bones.insert(Bone::at(5.0, 5.0, CreatureId::new(), "ABCE"));
        let config = InteractionConfig::default();
        world.creatures[key].happiness = 100.0;
        for _ in 0..3 {
            fallback(&mut world, Meeting::Bone { creature: key, bone }, &config);
        }
        assert!((world.creatures[key].happiness - 76.0).abs() < 1e-4);
        fallback(&mut world, Meeting::Bone { creature: key, bone }, &config);
        assert!((world.creatures[key].happiness - 72.0).abs() < 1e-4);
        assert_eq!(world.creatures[key].deaths_witnessed, 4);
        assert_eq!(world.creatures[key].event_log.len(), 4);
    }

    #[test]
    fn outcome_deltas_and_speed_are_clamped() {
        let (mut world, keys) = world_with(&[("ABCD", 5.0, 5.0), ("ABCE", 5.5, 5.0)]);
        let (a, b) = (keys[0], keys[1]);
        world.creatures[a].happiness = 50.0;
        let outcome = InteractionOutcome {
            actor: VitalDelta {
                happiness: 80.0,
                vx: 9.0,
                ..VitalDelta::default()
            },
            other: VitalDelta {
                hunger: -500.0,
                ..VitalDelta::default()
            },
            narrative: "they argued over a fig".to_owned(),
        };
        let config = InteractionConfig::default();
        assert!(apply_outcome(&mut world, a, Some(b), &outcome, &config, 2.0));
        assert!((world.creatures[a].happiness - 65.0).abs() < 1e-4);
        assert!(world.creatures[a].vx <= 2.0);
        assert!((world.creatures[b].hunger - 85.0).abs() < 1e-4);
        assert_eq!(world.last_event.text, "they argued over a fig");
        assert_eq!(
            world.creatures[a].event_log.entries().last().map(String::as_str),
            Some("they argued over a fig")
        );
    }

    #[test]
    fn outcome_for_dead_actor_is_discarded() {
        let (mut world, keys) = world_with(&[("ABCD", 5.0, 5.0)]);
        let key = keys[0];
        world.creatures[key].alive = false;
        let outcome = InteractionOutcome {
            actor: VitalDelta {
                happiness: 5.0,
                ..VitalDelta::default()
            },
            other: VitalDelta::default(),
            narrative: "a ghost story".to_owned(),
        };
        assert!(!apply_outcome(&mut world, key, None, &outcome, &InteractionConfig::default(), 2.0));
        assert!(world.creatures[key].event_log.is_empty());
        assert!(world.last_event.text.is_empty());
    }
}

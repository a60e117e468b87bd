//! The explicitly owned world state.
//!
//! Entities live in generational slot maps. A key stays valid until its
//! entity is removed and never resolves again afterwards, which is how
//! late oracle completions detect that their creature is gone.

use chrono::{NaiveDate, Utc};
use rand::Rng;
use slotmap::SlotMap;
use throng_types::{
    Bone, BoneKey, Creature, CreatureId, CreatureKey, CreatureView, Epoch, FoodItem, FoodKey,
    LastEvent, Marker, PetitionEntry, PetitionId, Relationship, ResourceLedger, Tree, TreeKey,
    TreeView, WorldSnapshot, WorldView, push_bounded,
};

use crate::config::ThrongConfig;
use crate::interaction::CooldownTable;
use crate::lineage::random_lineage;

/// World chronicle capacity.
pub const CHRONICLE_CAP: usize = 20;

/// Observed principles capacity.
pub const PRINCIPLE_CAP: usize = 8;

/// Ancestral memory capacity.
pub const ANCESTRAL_CAP: usize = 12;

/// Upper bound of pollution.
pub const POLLUTION_MAX: f32 = 10.0;

/// All mutable simulation state.
#[derive(Debug)]
pub struct World {
    /// Save-slot name.
    pub world_id: String,
    /// Frames stepped since the world began.
    pub tick: u64,
    /// Width in tiles.
    pub width: f32,
    /// Height in tiles.
    pub height: f32,

    /// Creatures, including the fading dead.
    pub creatures: SlotMap<CreatureKey, Creature>,
    /// Food in flight or on the ground.
    pub food: SlotMap<FoodKey, FoodItem>,
    /// Standing trees.
    pub trees: SlotMap<TreeKey, Tree>,
    /// Unharvested bones.
    pub bones: SlotMap<BoneKey, Bone>,

    /// Counted resources.
    pub resources: ResourceLedger,
    /// Pollution, 0 to [`POLLUTION_MAX`].
    pub pollution: f32,
    /// Current epoch.
    pub epoch: Epoch,
    /// Principles the throng holds, oldest first.
    pub observed_principles: Vec<String>,
    /// Memory surviving collapses, oldest first.
    pub ancestral_memory: Vec<String>,
    /// Recent world events, oldest first.
    pub chronicle: Vec<String>,

    /// Unresolved petition entries.
    pub petitions: Vec<PetitionEntry>,
    /// Next petition sequence number.
    pub next_petition_id: PetitionId,
    /// Cumulative grants.
    pub grants: u32,
    /// Cumulative denials.
    pub denials: u32,

    /// Creatures born since the world began.
    pub births: u64,
    /// Creatures dead since the world began.
    pub deaths: u64,

    /// Interaction gate stamps.
    pub cooldowns: CooldownTable,
    /// Narrative line on display.
    pub last_event: LastEvent,
    /// Local date the scheduled evaluation last fired.
    pub last_evaluation_date: Option<NaiveDate>,
}

impl World {
    /// An empty world with the configured dimensions.
    pub fn empty(config: &ThrongConfig) -> Self {
        Self {
            world_id: config.world.world_id.clone(),
            tick: 0,
            width: config.world.width,
            height: config.world.height,
            creatures: SlotMap::with_key(),
            food: SlotMap::with_key(),
            trees: SlotMap::with_key(),
            bones: SlotMap::with_key(),
            resources: ResourceLedger::default(),
            pollution: 0.0,
            epoch: Epoch::Eden,
            observed_principles: Vec::new(),
            ancestral_memory: Vec::new(),
            chronicle: Vec::new(),
            petitions: Vec::new(),
            next_petition_id: 1,
            grants: 0,
            denials: 0,
            births: 0,
            deaths: 0,
            cooldowns: CooldownTable::new(
                config.interaction.cooldown_capacity,
                config
                    .interaction
                    .creature_cooldown_ticks
                    .max(config.interaction.bone_cooldown_ticks),
            ),
            last_event: LastEvent::default(),
            last_evaluation_date: None,
        }
    }

    /// A fresh world: founders with random lineages and a few trees.
    pub fn generate<R: Rng + ?Sized>(config: &ThrongConfig, rng: &mut R) -> Self {
        let mut world = Self::empty(config);
        for _ in 0..config.world.founders {
            let (x, y) = world.random_point(rng);
            let mut founder = Creature::founder(random_lineage(rng), x, y);
            founder.event_log.push("woke in the garden");
            world.creatures.insert(founder);
        }
        for _ in 0..config.world.initial_trees {
            let (x, y) = world.random_point(rng);
            world.trees.insert(Tree::planted(x, y, config.world.tree_health));
        }
        world.push_chronicle("the garden was made");
        world
    }

    /// Rebuild a world from a persisted snapshot.
    pub fn restore(snapshot: WorldSnapshot, config: &ThrongConfig) -> Self {
        let mut world = Self::empty(config);
        world.world_id = snapshot.world_id;
        world.tick = snapshot.tick;
        for mut creature in snapshot.creatures {
            creature.clamp_vitals();
            creature.x = creature.x.clamp(0.0, world.width);
            creature.y = creature.y.clamp(0.0, world.height);
            world.creatures.insert(creature);
        }
        for item in snapshot.food {
            world.food.insert(item);
        }
        for tree in snapshot.trees {
            world.trees.insert(tree);
        }
        for bone in snapshot.bones {
            world.bones.insert(bone);
        }
        world.resources = snapshot.resources;
        world.pollution = clamp_pollution(snapshot.pollution);
        world.epoch = snapshot.epoch;
        world.observed_principles = snapshot.observed_principles;
        world.ancestral_memory = snapshot.ancestral_memory;
        world.chronicle = snapshot.chronicle;
        world.petitions = snapshot.petitions;
        world.next_petition_id = snapshot.next_petition_id.max(1);
        world.grants = snapshot.grants;
        world.denials = snapshot.denials;
        world.births = snapshot.births;
        world.deaths = snapshot.deaths;
        world.last_event = snapshot.last_event;
        world.last_evaluation_date = snapshot.last_evaluation_date;
        world
    }

    /// The full persisted form. Cooldowns are not included.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            world_id: self.world_id.clone(),
            tick: self.tick,
            creatures: self.creatures.values().cloned().collect(),
            food: self.food.values().cloned().collect(),
            trees: self.trees.values().cloned().collect(),
            bones: self.bones.values().cloned().collect(),
            resources: self.resources,
            pollution: self.pollution,
            epoch: self.epoch,
            observed_principles: self.observed_principles.clone(),
            ancestral_memory: self.ancestral_memory.clone(),
            chronicle: self.chronicle.clone(),
            petitions: self.petitions.clone(),
            next_petition_id: self.next_petition_id,
            grants: self.grants,
            denials: self.denials,
            births: self.births,
            deaths: self.deaths,
            last_evaluation_date: self.last_evaluation_date,
            last_event: self.last_event.clone(),
            saved_at: Utc::now(),
        }
    }

    /// The renderer's view of the world.
    pub fn view(&self) -> WorldView {
        WorldView {
            tick: self.tick,
            epoch: self.epoch,
            pollution: self.pollution,
            population: u32::try_from(self.living_count()).unwrap_or(u32::MAX),
            births: self.births,
            deaths: self.deaths,
            resources: self.resources,
            relationship: self.relationship(),
            last_event: (self.last_event.timer > 0.0).then(|| self.last_event.text.clone()),
            creatures: self.creatures.values().map(CreatureView::from).collect(),
            food: self
                .food
                .values()
                .map(|f| Marker { x: f.x, y: f.y, z: f.z })
                .collect(),
            trees: self
                .trees
                .values()
                .map(|t| TreeView {
                    x: t.x,
                    y: t.y,
                    health: t.health,
                })
                .collect(),
            bones: self
                .bones
                .values()
                .map(|b| Marker { x: b.x, y: b.y, z: 0.0 })
                .collect(),
            petitions: self.petitions.clone(),
            principles: self.observed_principles.clone(),
            ancestral_memory: self.ancestral_memory.clone(),
        }
    }

    /// Number of living creatures.
    pub fn living_count(&self) -> usize {
        self.creatures.values().filter(|c| c.alive).count()
    }

    /// Keys of living creatures.
    pub fn living_keys(&self) -> Vec<CreatureKey> {
        self.creatures
            .iter()
            .filter(|(_, c)| c.alive)
            .map(|(k, _)| k)
            .collect()
    }

    /// Living creature by key.
    pub fn living(&self, key: CreatureKey) -> Option<&Creature> {
        self.creatures.get(key).filter(|c| c.alive)
    }

    /// Living creature by key, mutably.
    pub fn living_mut(&mut self, key: CreatureKey) -> Option<&mut Creature> {
        self.creatures.get_mut(key).filter(|c| c.alive)
    }

    /// Find a creature's arena key by durable id.
    pub fn find_creature(&self, id: CreatureId) -> Option<CreatureKey> {
        self.creatures
            .iter()
            .find(|(_, c)| c.id == id)
            .map(|(k, _)| k)
    }

    /// Uneaten food resting on the ground.
    pub fn ground_food_count(&self) -> usize {
        self.food.values().filter(|f| f.is_available()).count()
    }

    /// Relationship label from the grant and deny counters.
    pub const fn relationship(&self) -> Relationship {
        Relationship::from_counts(self.grants, self.denials)
    }

    /// Append to the chronicle.
    pub fn push_chronicle(&mut self, entry: impl Into<String>) {
        push_bounded(&mut self.chronicle, entry.into(), CHRONICLE_CAP);
    }

    /// Append to ancestral memory.
    pub fn remember(&mut self, entry: impl Into<String>) {
        push_bounded(&mut self.ancestral_memory, entry.into(), ANCESTRAL_CAP);
    }

    /// Append a principle.
    pub fn add_principle(&mut self, principle: impl Into<String>) {
        push_bounded(&mut self.observed_principles, principle.into(), PRINCIPLE_CAP);
    }

    /// Show a narrative line for `duration`.
    pub fn announce(&mut self, text: impl Into<String>, duration: f32) {
        self.last_event = LastEvent {
            text: text.into(),
            timer: duration,
        };
    }

    /// Add to pollution, clamped to its range.
    pub fn adjust_pollution(&mut self, delta: f32) {
        self.pollution = clamp_pollution(self.pollution + delta);
    }

    /// Clamp a point into the world bounds.
    pub fn clamp_point(&self, x: f32, y: f32) -> (f32, f32) {
        (finite_or(x, 0.0).clamp(0.0, self.width), finite_or(y, 0.0).clamp(0.0, self.height))
    }

    /// A uniformly random point inside the bounds.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> (f32, f32) {
        (
            rng.random_range(0.0..self.width),
            rng.random_range(0.0..self.height),
        )
    }

    /// The middle of the world.
    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

fn clamp_pollution(value: f32) -> f32 {
    finite_or(value, 0.0).clamp(0.0, POLLUTION_MAX)
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::lineage::is_well_formed;

    #[test]
    fn generate_places_founders_and_trees_in_bounds() {
        let config = ThrongConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        let world = World::generate(&config, &mut rng);
        assert_eq!(world.living_count(), 3);
        assert_eq!(world.trees.len(), 4);
        for creature in world.creatures.values() {
            assert!(is_well_formed(&creature.lineage));
            assert!((0.0..=world.width).contains(&creature.x));
            assert!((0.0..=world.height).contains(&creature.y));
        }
    }

    #[test]
    fn removed_keys_never_resolve_again() {
        let config = ThrongConfig::default();
        let mut world = World::empty(&config);
        let key = world.creatures.insert(Creature::founder("ABCD", 1.0, 1.0));
        world.creatures.remove(key);
        let reused = world.creatures.insert(Creature::founder("WXYZ", 1.0, 1.0));
        assert!(world.creatures.get(key).is_none());
        assert!(world.creatures.get(reused).is_some());
    }

    #[test]
    fn snapshot_restore_preserves_state() {
        let config = ThrongConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut world = World::generate(&config, &mut rng);
        world.tick = 777;
        world.epoch = Epoch::Agricultural;
        world.pollution = 3.5;
        world.remember("the first fall");
        world.grants = 2;

        let restored = World::restore(world.snapshot(), &config);
        assert_eq!(restored.tick, 777);
        assert_eq!(restored.epoch, Epoch::Agricultural);
        assert_eq!(restored.living_count(), 3);
        assert_eq!(restored.ancestral_memory, vec!["the first fall".to_owned()]);
        assert_eq!(restored.relationship(), Relationship::Benevolent);
    }

    #[test]
    fn world_logs_are_capped() {
        let mut world = World::empty(&ThrongConfig::default());
        for i in 0..40 {
            world.push_chronicle(format!("c{i}"));
            world.remember(format!("a{i}"));
            world.add_principle(format!("p{i}"));
        }
        assert_eq!(world.chronicle.len(), CHRONICLE_CAP);
        assert_eq!(world.ancestral_memory.len(), ANCESTRAL_CAP);
        assert_eq!(world.observed_principles.len(), PRINCIPLE_CAP);
        assert_eq!(world.observed_principles.first().map(String::as_str), Some("p32"));
    }

    #[test]
    fn pollution_stays_in_range() {
        let mut world = World::empty(&ThrongConfig::default());
        world.adjust_pollution(25.0);
        assert!((world.pollution - POLLUTION_MAX).abs() < f32::EPSILON);
        world.adjust_pollution(f32::NAN);
        assert!(world.pollution.abs() < f32::EPSILON);
    }
}

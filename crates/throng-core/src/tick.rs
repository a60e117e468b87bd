//! The per-frame update: needs, death, movement, eating, reproduction,
//! installed behaviors, food physics, trees and pollution drift.
//!
//! Everything here is synchronous and touches only the [`World`]. Oracle
//! dispatch for births and meetings happens in
//! [`crate::simulation::Simulation`], driven by the [`TickReport`].

use std::f32::consts::TAU;

use rand::Rng;
use throng_types::{
    Bone, Creature, CreatureKey, CreatureState, FoodItem, FoodKey, Tree, TreeKey, clamp_vital,
};
use tracing::{debug, info};

use crate::behavior::{self, Senses};
use crate::config::ThrongConfig;
use crate::lineage::{is_kin, mutate_lineage};
use crate::world::World;

/// Largest `dt` a single step accepts, in normalized frames.
pub const MAX_DT: f32 = 3.0;

/// Height food falls from when a tree drops it.
const TREE_DROP_HEIGHT: f32 = 2.5;

/// Below this vertical speed a landing does not bounce.
const BOUNCE_MIN_SPEED: f32 = 0.05;

/// What happened during one step that the caller may need to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// `(parent, child)` for every birth.
    pub births: Vec<(CreatureKey, CreatureKey)>,
    /// Creatures that died this step.
    pub deaths: Vec<CreatureKey>,
}

/// Clamp a frame delta into `[0, MAX_DT]`. Non-finite input becomes 0.
pub fn clamp_dt(dt: f32) -> f32 {
    if dt.is_finite() { dt.clamp(0.0, MAX_DT) } else { 0.0 }
}

/// Advance the world by one frame.
pub fn advance<R: Rng + ?Sized>(
    world: &mut World,
    config: &ThrongConfig,
    rng: &mut R,
    dt: f32,
) -> TickReport {
    let dt = clamp_dt(dt);
    world.tick = world.tick.saturating_add(1);
    world.last_event.timer = (world.last_event.timer - dt).max(0.0);

    let mut report = TickReport::default();
    update_creatures(world, config, rng, dt, &mut report);
    fade_dead(world, config);
    update_bones(world);
    update_food(world, config, dt);
    update_trees(world, config, rng, dt);

    let drift = config
        .epoch
        .pollution_drift
        .get(usize::from(world.epoch.ordinal()))
        .copied()
        .unwrap_or(0.0);
    world.adjust_pollution(drift * dt);
    report
}

/// A living creature's position and lineage, taken before anyone moves.
struct Sighting {
    key: CreatureKey,
    x: f32,
    y: f32,
    lineage: String,
}

fn update_creatures<R: Rng + ?Sized>(
    world: &mut World,
    config: &ThrongConfig,
    rng: &mut R,
    dt: f32,
    report: &mut TickReport,
) {
    let sightings: Vec<Sighting> = world
        .creatures
        .iter()
        .filter(|(_, c)| c.alive)
        .map(|(key, c)| Sighting {
            key,
            x: c.x,
            y: c.y,
            lineage: c.lineage.clone(),
        })
        .collect();
    let mut population = sightings.len();
    let mut newborns = Vec::new();

    for sighting in &sightings {
        if died_this_tick(world, sighting.key, config, dt) {
            report.deaths.push(sighting.key);
            continue;
        }
        move_creature(world, sighting.key, config, rng, dt);
        run_behavior(world, sighting.key, &sightings, config, dt);

        let Some(creature) = world.creatures.get_mut(sighting.key) else {
            continue;
        };
        creature.clamp_vitals();
        creature.clamp_velocity(config.movement.max_speed);

        if ready_to_reproduce(creature, config, dt) && population < config.world.max_population {
            creature.repro_timer = 0.0;
            newborns.push((sighting.key, birth(creature, config, rng)));
            creature.event_log.push("gave birth");
            population = population.saturating_add(1);
        }
    }

    for (parent, mut child) in newborns {
        let (x, y) = world.clamp_point(child.x, child.y);
        child.x = x;
        child.y = y;
        info!(
            creature_id = %child.id,
            lineage = %child.lineage,
            generation = child.evolution_generation,
            "creature born"
        );
        world.births = world.births.saturating_add(1);
        let key = world.creatures.insert(child);
        report.births.push((parent, key));
    }
}

/// Age and decay one creature. Returns true if it starved this tick.
fn died_this_tick(world: &mut World, key: CreatureKey, config: &ThrongConfig, dt: f32) -> bool {
    let tick = world.tick;
    let Some(creature) = world.creatures.get_mut(key).filter(|c| c.alive) else {
        return false;
    };
    let vitals = &config.vitals;
    creature.age = creature.age.saturating_add(1);
    creature.hunger = clamp_vital(creature.hunger - vitals.hunger_decay * dt);
    creature.clean = clamp_vital(creature.clean - vitals.clean_decay * dt);
    creature.happiness = clamp_vital(creature.happiness - vitals.happiness_decay * dt);
    creature.state_timer = (creature.state_timer - dt).max(0.0);

    if creature.hunger > 0.0 {
        if creature.hunger > vitals.content_threshold && creature.clean > vitals.content_threshold {
            creature.happiness = clamp_vital(creature.happiness + vitals.happiness_regen * dt);
        }
        return false;
    }

    creature.alive = false;
    creature.died_at = tick;
    creature.state = CreatureState::Dying;
    creature.state_timer = 0.0;
    creature.vx = 0.0;
    creature.vy = 0.0;
    creature.target_food = None;
    creature.event_log.push("starved");
    let (id, lineage, x, y, age) = (
        creature.id,
        creature.lineage.clone(),
        creature.x,
        creature.y,
        creature.age,
    );

    world.bones.insert(Bone::at(x, y, id, lineage.clone()));
    world.deaths = world.deaths.saturating_add(1);
    world.push_chronicle(format!("a {lineage} starved at age {age}"));
    info!(creature_id = %id, lineage = %lineage, age, "creature died");
    true
}

fn move_creature<R: Rng + ?Sized>(
    world: &mut World,
    key: CreatureKey,
    config: &ThrongConfig,
    rng: &mut R,
    dt: f32,
) {
    let movement = &config.movement;
    let (width, height) = (world.width, world.height);
    let Some(creature) = world.creatures.get_mut(key) else {
        return;
    };

    let busy = matches!(
        creature.state,
        CreatureState::Eating | CreatureState::Bathing | CreatureState::Playing
    ) && creature.state_timer > 0.0;

    if busy {
        creature.vx = 0.0;
        creature.vy = 0.0;
    } else if let Some((food_key, fx, fy)) =
        target_food(creature, &world.food, movement.food_search_radius)
    {
        creature.target_food = Some(food_key);
        let (dx, dy) = (fx - creature.x, fy - creature.y);
        let distance = dx.hypot(dy);
        if distance < movement.contact_distance {
            world.food.remove(food_key);
            creature.hunger = clamp_vital(creature.hunger + movement.eat_hunger);
            creature.happiness = clamp_vital(creature.happiness + movement.eat_happiness);
            creature.state = CreatureState::Eating;
            creature.state_timer = movement.eat_duration;
            creature.target_food = None;
            creature.vx = 0.0;
            creature.vy = 0.0;
        } else {
            creature.vx = dx / distance * movement.seek_speed;
            creature.vy = dy / distance * movement.seek_speed;
            creature.state = CreatureState::Walking;
        }
    } else {
        creature.target_food = None;
        wander(creature, movement.wander_speed, rng);
    }

    creature.x = (creature.x + creature.vx * dt).clamp(0.0, width);
    creature.y = (creature.y + creature.vy * dt).clamp(0.0, height);
}

/// Keep the current target if it is still on the ground, otherwise pick
/// the nearest available food within `radius`.
fn target_food(
    creature: &Creature,
    food: &slotmap::SlotMap<FoodKey, FoodItem>,
    radius: f32,
) -> Option<(FoodKey, f32, f32)> {
    if let Some(key) = creature.target_food
        && let Some(item) = food.get(key).filter(|f| f.is_available())
    {
        return Some((key, item.x, item.y));
    }
    food.iter()
        .filter(|(_, f)| f.is_available())
        .map(|(k, f)| (k, f.x, f.y, creature.distance_to(f.x, f.y)))
        .filter(|(_, _, _, d)| *d <= radius)
        .min_by(|a, b| a.3.total_cmp(&b.3))
        .map(|(k, x, y, _)| (k, x, y))
}

fn wander<R: Rng + ?Sized>(creature: &mut Creature, speed: f32, rng: &mut R) {
    let roaming = matches!(creature.state, CreatureState::Idle | CreatureState::Walking);
    if roaming && creature.state_timer > 0.0 {
        return;
    }
    if rng.random_bool(0.5) {
        creature.state = CreatureState::Idle;
        creature.state_timer = rng.random_range(30.0..120.0);
        creature.vx = 0.0;
        creature.vy = 0.0;
    } else {
        let heading = rng.random_range(0.0..TAU);
        creature.state = CreatureState::Walking;
        creature.state_timer = rng.random_range(60.0..180.0);
        creature.vx = heading.cos() * speed;
        creature.vy = heading.sin() * speed;
    }
}

fn run_behavior(
    world: &mut World,
    key: CreatureKey,
    sightings: &[Sighting],
    config: &ThrongConfig,
    dt: f32,
) {
    let Some(creature) = world.creatures.get(key) else {
        return;
    };
    if creature.behavior.is_none() {
        return;
    }
    let radius = config.behavior.sense_radius;
    let nearest_kin = sightings
        .iter()
        .filter(|s| s.key != key && is_kin(&s.lineage, &creature.lineage))
        .map(|s| (s.x, s.y, creature.distance_to(s.x, s.y)))
        .min_by(|a, b| a.2.total_cmp(&b.2));
    let nearest_food = world
        .food
        .values()
        .filter(|f| f.is_available())
        .map(|f| (f.x, f.y, creature.distance_to(f.x, f.y)))
        .min_by(|a, b| a.2.total_cmp(&b.2));
    let senses = Senses {
        nearest_kin: nearest_kin.map(|(x, y, _)| (x, y)),
        nearest_food: nearest_food.map(|(x, y, _)| (x, y)),
        center: world.center(),
        kin_nearby: nearest_kin.is_some_and(|(_, _, d)| d <= radius),
        food_nearby: nearest_food.is_some_and(|(_, _, d)| d <= radius),
        pollution: world.pollution,
        epoch: world.epoch,
    };

    let Some(creature) = world.creatures.get_mut(key) else {
        return;
    };
    let Some(rules) = creature.behavior.take() else {
        return;
    };
    match behavior::evaluate(&rules, creature, &senses, dt) {
        Ok(()) => creature.behavior = Some(rules),
        Err(fault) => {
            if !creature.vx.is_finite() || !creature.vy.is_finite() {
                creature.vx = 0.0;
                creature.vy = 0.0;
            }
            creature.behavior_corrupted = true;
            creature.event_log.push(format!("forgot its habits of {}", rules.description));
            debug!(creature_id = %creature.id, error = %fault, "behavior uninstalled");
        }
    }
}

/// Accumulate reproduction time. True once the preconditions have held
/// for the full duration.
fn ready_to_reproduce(creature: &mut Creature, config: &ThrongConfig, dt: f32) -> bool {
    let repro = &config.reproduction;
    let content = creature.happiness > repro.min_happiness
        && creature.hunger > repro.min_hunger
        && creature.clean > repro.min_clean;
    if content {
        creature.repro_timer += dt;
    } else {
        creature.repro_timer = 0.0;
    }
    creature.repro_timer >= repro.duration
}

fn birth<R: Rng + ?Sized>(parent: &Creature, config: &ThrongConfig, rng: &mut R) -> Creature {
    let angle = rng.random_range(0.0..TAU);
    let offset = config.reproduction.birth_offset;
    let mut child = Creature::founder(
        mutate_lineage(&parent.lineage, rng),
        parent.x + angle.cos() * offset,
        parent.y + angle.sin() * offset,
    );
    child.event_log = parent.event_log.clone();
    child.event_log.push(format!("born to a {}", parent.lineage));
    child.evolution_generation = parent.evolution_generation.saturating_add(1);
    child.behavior_corrupted = parent.behavior_corrupted;
    child
}

fn fade_dead(world: &mut World, config: &ThrongConfig) {
    let tick = world.tick;
    world
        .creatures
        .retain(|_, c| c.alive || tick.saturating_sub(c.died_at) < config.vitals.fade_ticks);
}

fn update_bones(world: &mut World) {
    for bone in world.bones.values_mut() {
        bone.age = bone.age.saturating_add(1);
    }
}

fn update_food(world: &mut World, config: &ThrongConfig, dt: f32) {
    let movement = &config.movement;
    let (width, height, tick) = (world.width, world.height, world.tick);
    world
        .food
        .retain(|_, f| !f.eaten && tick.saturating_sub(f.spawned_at) < movement.food_expiry_ticks);

    for item in world.food.values_mut() {
        if item.z > 0.0 || item.vz > 0.0 {
            item.vz -= movement.gravity * dt;
            item.z += item.vz * dt;
            if item.z <= 0.0 {
                item.z = 0.0;
                if !item.bounced && -item.vz > BOUNCE_MIN_SPEED {
                    item.vz = -item.vz * movement.bounce;
                } else {
                    item.vz = 0.0;
                }
                item.bounced = true;
            }
        } else {
            let keep = movement.ground_friction.powf(dt);
            item.vx *= keep;
            item.vy *= keep;
        }
        item.x = (item.x + item.vx * dt).clamp(0.0, width);
        item.y = (item.y + item.vy * dt).clamp(0.0, height);
    }
}

fn update_trees<R: Rng + ?Sized>(world: &mut World, config: &ThrongConfig, rng: &mut R, dt: f32) {
    let threshold = config.world.tree_regrow_threshold;
    let mut drops = Vec::new();
    let mut felled: Vec<TreeKey> = Vec::new();

    for (key, tree) in &mut world.trees {
        tree.regrow_timer += dt;
        if tree.regrow_timer < threshold {
            continue;
        }
        tree.regrow_timer = 0.0;
        tree.health = tree.health.saturating_sub(1);
        drops.push(tree_drop(tree, world.tick, rng));
        if tree.health == 0 {
            felled.push(key);
        }
    }

    for item in drops {
        world.food.insert(item);
    }
    for key in felled {
        world.trees.remove(key);
    }
}

fn tree_drop<R: Rng + ?Sized>(tree: &Tree, tick: u64, rng: &mut R) -> FoodItem {
    let mut item = FoodItem::dropped(
        tree.x + rng.random_range(-0.5..0.5),
        tree.y + rng.random_range(-0.5..0.5),
        TREE_DROP_HEIGHT,
        tick,
    );
    item.vx = rng.random_range(-0.02..0.02);
    item.vy = rng.random_range(-0.02..0.02);
    item
}

//! Whole-simulation scenarios driven frame by frame.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use chrono::NaiveDateTime;
use throng_core::interaction::{self, Meeting, pair_key};
use throng_core::lineage::hamming;
use throng_core::{Command, Simulation, ThrongConfig, World};
use throng_oracle::{LlmBackend, Oracle, OracleConfig, PromptEngine, ScriptedBackend};
use throng_types::{Creature, Epoch, PetitionAction, PetitionEntry};

/// Before the daily evaluation window.
fn night() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2026-06-01 01:00", "%Y-%m-%d %H:%M").unwrap()
}

fn quiet_config() -> ThrongConfig {
    let mut config = ThrongConfig::default();
    config.schedule.enabled = false;
    config
}

fn still_config() -> ThrongConfig {
    let mut config = quiet_config();
    config.vitals.hunger_decay = 0.0;
    config.vitals.clean_decay = 0.0;
    config.vitals.happiness_decay = 0.0;
    config.vitals.happiness_regen = 0.0;
    config.reproduction.duration = 1.0e9;
    config
}

fn scripted(backend: ScriptedBackend) -> Oracle {
    Oracle::with_backend(
        Some(LlmBackend::Scripted(backend)),
        &OracleConfig::default(),
        PromptEngine::builtin().unwrap(),
    )
    .unwrap()
}

fn run(sim: &mut Simulation, ticks: u32) {
    for _ in 0..ticks {
        sim.step_at(1.0, night());
    }
}

#[test]
fn vitals_and_logs_stay_bounded_every_tick() {
    let mut sim = Simulation::new(quiet_config(), Oracle::offline().unwrap());
    for _ in 0..3000 {
        sim.step_at(1.0, night());
        for creature in sim.world().creatures.values() {
            for vital in [creature.hunger, creature.clean, creature.happiness] {
                assert!((0.0..=100.0).contains(&vital), "vital out of range: {vital}");
            }
            assert!(creature.event_log.len() <= 10);
        }
    }
}

#[test]
fn founders_without_food_all_starve() {
    let mut config = quiet_config();
    config.world.initial_trees = 0;
    let mut sim = Simulation::new(config, Oracle::offline().unwrap());
    assert_eq!(sim.world().living_count(), 3);

    run(&mut sim, 2000);

    let world = sim.world();
    assert_eq!(world.living_count(), 0);
    assert_eq!(world.deaths, 3);
    assert_eq!(world.bones.len(), 3);
    assert_eq!(world.births, 0);
}

#[test]
fn death_happens_once_and_freezes_vitals() {
    let config = quiet_config();
    let mut world = World::empty(&config);
    let mut creature = Creature::founder("ABCD", 5.0, 5.0);
    creature.hunger = 0.05;
    let key = world.creatures.insert(creature);
    let mut sim = Simulation::with_world(world, config, Oracle::offline().unwrap());

    run(&mut sim, 1);
    let frozen = sim.world().creatures[key].clone();
    assert!(!frozen.alive);
    assert_eq!(sim.world().bones.len(), 1);

    run(&mut sim, 50);
    let later = &sim.world().creatures[key];
    assert_eq!(sim.world().bones.len(), 1);
    assert_eq!(sim.world().deaths, 1);
    assert_eq!(later.hunger.to_bits(), frozen.hunger.to_bits());
    assert_eq!(later.clean.to_bits(), frozen.clean.to_bits());
    assert_eq!(later.happiness.to_bits(), frozen.happiness.to_bits());
}

#[test]
fn children_drift_one_letter_and_one_generation() {
    let mut config = still_config();
    config.reproduction.duration = 5.0;
    config.world.max_population = 2;
    let mut world = World::empty(&config);
    let mut parent = Creature::founder("MNOP", 5.0, 5.0);
    parent.happiness = 100.0;
    parent.evolution_generation = 3;
    let parent = world.creatures.insert(parent);
    let mut sim = Simulation::with_world(world, config, Oracle::offline().unwrap());

    let mut births = Vec::new();
    for _ in 0..10 {
        births.extend(sim.step_at(1.0, night()).births);
    }

    assert_eq!(births.len(), 1);
    let (from, child) = births[0];
    assert_eq!(from, parent);
    let world = sim.world();
    assert_eq!(hamming(&world.creatures[child].lineage, "MNOP"), Some(1));
    assert_eq!(world.creatures[child].evolution_generation, 4);
    assert!(
        world.creatures[child]
            .event_log
            .entries()
            .iter()
            .any(|e| e.starts_with("born to"))
    );
}

#[tokio::test]
async fn corrupted_branch_stays_on_builtin_behavior() {
    let mut config = still_config();
    config.reproduction.duration = 5.0;
    config.world.max_population = 2;
    let mut world = World::empty(&config);
    let mut parent = Creature::founder("MNOP", 5.0, 5.0);
    parent.happiness = 100.0;
    parent.behavior_corrupted = true;
    world.creatures.insert(parent);

    let oracle = scripted(ScriptedBackend::always(
        r#"{"description": "keeps near kin", "rules": [{"when": "kin_nearby", "then": {"adjust_happiness": 0.1}}], "seed": 9}"#,
    ));
    let mut sim = Simulation::with_world(world, config, oracle);
    let mut births = Vec::new();
    for _ in 0..10 {
        births.extend(sim.step_at(1.0, night()).births);
        sim.drain_pending().await;
    }

    assert_eq!(births.len(), 1);
    let child = &sim.world().creatures[births[0].1];
    assert!(child.behavior_corrupted);
    assert!(child.behavior.is_none());
    assert_eq!(child.evolution_generation, 1);
}

#[test]
fn repeated_kin_fallback_is_bounded() {
    let config = quiet_config();
    let mut world = World::empty(&config);
    let actor = world.creatures.insert(Creature::founder("ABCD", 5.0, 5.0));
    let other = world.creatures.insert(Creature::founder("ABCE", 5.5, 5.0));

    let mut last = world.creatures[actor].happiness;
    for _ in 0..40 {
        interaction::fallback(&mut world, Meeting::Creatures { actor, other }, &config.interaction);
        let now = world.creatures[actor].happiness;
        assert!(now >= last);
        assert!(now <= 100.0);
        assert!(world.creatures[other].happiness <= 100.0);
        last = now;
    }
    assert!((last - 100.0).abs() < f32::EPSILON);
}

#[test]
fn epochs_climb_one_step_per_threshold_and_return_by_ricorso() {
    let mut config = still_config();
    config.epoch.check_interval_ticks = 10;
    let mut world = World::empty(&config);
    for i in 0..8 {
        world.creatures.insert(Creature::founder("QRST", 2.0 + i as f32, 2.0));
    }
    let mut sim = Simulation::with_world(world, config, Oracle::offline().unwrap());

    run(&mut sim, 10);
    assert_eq!(sim.world().epoch, Epoch::Pastoral);
    run(&mut sim, 30);
    // Eight creatures clear only the first threshold.
    assert_eq!(sim.world().epoch, Epoch::Pastoral);

    for i in 0..7 {
        sim.world_mut()
            .creatures
            .insert(Creature::founder("QRSU", 2.0 + i as f32, 8.0));
    }
    run(&mut sim, 10);
    assert_eq!(sim.world().epoch, Epoch::Agricultural);

    sim.world_mut().epoch = Epoch::Collapse;
    let keys = sim.world().living_keys();
    for key in keys.into_iter().skip(2) {
        sim.world_mut().creatures.remove(key);
    }
    run(&mut sim, 10);
    assert_eq!(sim.world().epoch, Epoch::Eden);
    assert!(!sim.world().ancestral_memory.is_empty());
}

#[test]
fn granting_a_tree_petition_plants_three_trees() {
    let config = quiet_config();
    let mut world = World::empty(&config);
    world.petitions.push(PetitionEntry {
        id: 1,
        text: "more trees please".to_owned(),
        urgency: 3,
        lineage_scope: "*".to_owned(),
    });
    world.next_petition_id = 2;
    let mut sim = Simulation::with_world(world, config, Oracle::offline().unwrap());

    let grant = Command::Petition {
        id: 1,
        action: PetitionAction::Grant,
    };
    assert!(sim.apply_command(grant).is_ok());

    let world = sim.world();
    assert_eq!(world.trees.len(), 3);
    assert!(world.trees.values().all(|t| t.health == 3));
    assert!(world.petitions.is_empty());
    assert_eq!(world.grants, 1);
}

#[tokio::test]
async fn petition_answered_during_synthesis_does_not_return() {
    let config = quiet_config();
    let mut world = World::empty(&config);
    world.petitions.push(PetitionEntry {
        id: 1,
        text: "more trees".to_owned(),
        urgency: 3,
        lineage_scope: "*".to_owned(),
    });
    world.next_petition_id = 2;
    let oracle = scripted(ScriptedBackend::always(
        r#"{"petitions": [{"text": "more trees", "urgency": 4}, {"text": "clean air", "urgency": 2}]}"#,
    ));
    let mut sim = Simulation::with_world(world, config, oracle);

    sim.evaluate_now();
    assert!(sim.pending() > 0);
    let grant = Command::Petition {
        id: 1,
        action: PetitionAction::Grant,
    };
    assert!(sim.apply_command(grant).is_ok());
    sim.drain_pending().await;

    let world = sim.world();
    assert_eq!(world.trees.len(), 3);
    let texts: Vec<&str> = world.petitions.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["clean air"]);
}

#[tokio::test]
async fn malformed_oracle_output_changes_nothing_but_the_cooldown() {
    let config = still_config();
    let mut world = World::empty(&config);
    let actor = world.creatures.insert(Creature::founder("ABCD", 5.0, 5.0));
    let other = world.creatures.insert(Creature::founder("ABCE", 5.3, 5.0));
    let before: Vec<[u32; 3]> = [actor, other]
        .iter()
        .map(|k| {
            let c = &world.creatures[*k];
            [c.hunger.to_bits(), c.clean.to_bits(), c.happiness.to_bits()]
        })
        .collect();
    let key = pair_key(world.creatures[actor].id, world.creatures[other].id);

    let oracle = scripted(ScriptedBackend::always("they regard each other warily"));
    let mut sim = Simulation::with_world(world, config, oracle);
    sim.step_at(1.0, night());
    assert_eq!(sim.pending(), 1);
    assert_eq!(sim.world().cooldowns.last_fired(&key), Some(1));

    let applied = sim.drain_pending().await;
    assert_eq!(applied, 1);
    let after: Vec<[u32; 3]> = [actor, other]
        .iter()
        .map(|k| {
            let c = &sim.world().creatures[*k];
            [c.hunger.to_bits(), c.clean.to_bits(), c.happiness.to_bits()]
        })
        .collect();
    assert_eq!(before, after);
    assert!(sim.world().creatures[actor].event_log.is_empty());
}

#[tokio::test]
async fn oracle_outcome_applies_once_per_cooldown_window() {
    let config = still_config();
    let mut world = World::empty(&config);
    let actor = world.creatures.insert(Creature::founder("ABCD", 5.0, 5.0));
    world.creatures[actor].happiness = 50.0;
    world.creatures.insert(Creature::founder("ABCE", 5.3, 5.0));

    let oracle = scripted(ScriptedBackend::always(
        r#"{"actor": {"happiness": 40}, "other": {"happiness": 2}, "narrative": "they shared a warm stone"}"#,
    ));
    let mut sim = Simulation::with_world(world, config, oracle);
    for _ in 0..100 {
        sim.step_at(1.0, night());
        sim.drain_pending().await;
    }

    assert_eq!(sim.oracle().budget().calls, 1);
    let creature = &sim.world().creatures[actor];
    // The delta is clamped to the per-call limit.
    assert!((creature.happiness - 65.0).abs() < 1e-4);
    assert!(
        creature
            .event_log
            .entries()
            .iter()
            .any(|e| e.contains("warm stone"))
    );
}

#[tokio::test]
async fn holistic_plan_retargets_through_evolution() {
    let mut config = still_config();
    config.schedule.enabled = true;
    let mut world = World::empty(&config);
    let key = world.creatures.insert(Creature::founder("ABCD", 5.0, 5.0));
    let id = world.creatures[key].id;

    let backend = ScriptedBackend::new([
        format!(
            r#"{{"epoch": 1, "principle": "rest in the shade", "event": null, "pollution_delta": null, "retarget": [{{"creature_id": "{id}", "hint": "cautious"}}]}}"#
        ),
        r#"{"description": "keeps near kin", "rules": [{"when": "kin_nearby", "then": {"adjust_happiness": 0.1}}], "seed": 9}"#
            .to_owned(),
    ]);
    let mut sim = Simulation::with_world(world, config, scripted(backend));
    sim.step_at(
        1.0,
        NaiveDateTime::parse_from_str("2026-06-01 03:30", "%Y-%m-%d %H:%M").unwrap(),
    );
    sim.drain_pending().await;

    let world = sim.world();
    assert_eq!(world.epoch, Epoch::Pastoral);
    assert_eq!(world.observed_principles, vec!["rest in the shade".to_owned()]);
    let creature = &world.creatures[key];
    assert_eq!(creature.evolution_generation, 1);
    assert!(
        creature
            .behavior
            .as_ref()
            .is_some_and(|b| b.description == "keeps near kin")
    );
}

#[test]
fn snapshot_restores_the_same_world() {
    let mut sim = Simulation::new(quiet_config(), Oracle::offline().unwrap());
    run(&mut sim, 200);
    let snapshot = sim.snapshot();
    let restored = Simulation::restore(quiet_config(), Oracle::offline().unwrap(), snapshot.clone());
    assert_eq!(restored.world().tick, 200);
    assert_eq!(restored.world().living_count(), sim.world().living_count());
    assert_eq!(restored.snapshot().creatures.len(), snapshot.creatures.len());
}

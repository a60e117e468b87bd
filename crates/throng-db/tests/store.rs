//! Save/load tests for the snapshot store.
//!
//! The `Dragonfly` tests require a live instance and are `#[ignore]`d.
//! Run them with:
//!
//! ```bash
//! docker compose up -d
//! cargo test -p throng-db -- --ignored
//! docker compose down
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::Utc;
use throng_db::dragonfly::world_key;
use throng_db::{MemoryStore, WorldStore};
use throng_types::{
    Bone, Creature, CreatureId, Epoch, LastEvent, PetitionEntry, ResourceLedger, Tree,
    WorldSnapshot,
};

/// Dragonfly connection URL for the local Docker instance.
const DRAGONFLY_URL: &str = "redis://localhost:6379";

fn snapshot(world_id: &str) -> WorldSnapshot {
    let mut elder = Creature::founder("ABCD", 3.0, 4.0);
    elder.evolution_generation = 2;
    elder.event_log.push("planted a seed");
    let child = Creature::founder("ABCE", 3.5, 4.0);
    WorldSnapshot {
        world_id: world_id.to_owned(),
        tick: 4321,
        creatures: vec![elder, child],
        food: Vec::new(),
        trees: vec![Tree::planted(10.0, 10.0, 5)],
        bones: vec![Bone::at(1.0, 1.0, CreatureId::new(), "WXYZ")],
        resources: ResourceLedger { food: 2, bones: 1 },
        pollution: 2.5,
        epoch: Epoch::Pastoral,
        observed_principles: vec!["share the figs".to_owned()],
        ancestral_memory: Vec::new(),
        chronicle: vec!["the garden was made".to_owned()],
        petitions: vec![PetitionEntry {
            id: 1,
            text: "more trees".to_owned(),
            urgency: 2,
            lineage_scope: "*".to_owned(),
        }],
        next_petition_id: 2,
        grants: 1,
        denials: 0,
        births: 1,
        deaths: 1,
        last_evaluation_date: None,
        last_event: LastEvent::default(),
        saved_at: Utc::now(),
    }
}

#[tokio::test]
async fn memory_store_round_trips_a_world() {
    let store = WorldStore::memory();
    let saved = snapshot("garden");
    store.save(&saved).await.unwrap();

    let loaded = store.load("garden").await;
    assert_eq!(loaded.as_ref(), Some(&saved));

    let lineages = store.load_lineages("garden").await;
    assert_eq!(lineages.len(), 2);
    assert_eq!(lineages[0].lineage, "ABCD");
    assert_eq!(lineages[0].max_generation, 2);
}

#[tokio::test]
async fn missing_world_loads_as_none() {
    let store = WorldStore::memory();
    assert!(store.load("nowhere").await.is_none());
    assert!(store.load_lineages("nowhere").await.is_empty());
}

#[tokio::test]
async fn corrupt_snapshot_loads_as_none() {
    let memory = MemoryStore::new();
    memory.put_raw(&world_key("garden"), "{\"tick\": \"soon\"").await;
    let store = WorldStore::Memory(memory);
    assert!(store.load("garden").await.is_none());
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance (docker compose up -d)"]
async fn dragonfly_round_trips_a_world() {
    let store = WorldStore::dragonfly(DRAGONFLY_URL)
        .await
        .expect("Failed to connect to Dragonfly -- is Docker running?");
    let saved = snapshot("throng-test-roundtrip");
    store.save(&saved).await.expect("save failed");

    let loaded = store.load("throng-test-roundtrip").await;
    assert_eq!(loaded.as_ref(), Some(&saved));
    assert_eq!(store.load_lineages("throng-test-roundtrip").await.len(), 2);

    if let WorldStore::Dragonfly(pool) = &store {
        pool.delete(&world_key("throng-test-roundtrip")).await.unwrap();
    }
    assert!(store.load("throng-test-roundtrip").await.is_none());
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance (docker compose up -d)"]
async fn dragonfly_corrupt_snapshot_loads_as_none() {
    let store = WorldStore::dragonfly(DRAGONFLY_URL)
        .await
        .expect("Failed to connect to Dragonfly -- is Docker running?");
    if let WorldStore::Dragonfly(pool) = &store {
        pool.set_json(&world_key("throng-test-corrupt"), &vec![1, 2, 3])
            .await
            .unwrap();
    }
    assert!(store.load("throng-test-corrupt").await.is_none());
}

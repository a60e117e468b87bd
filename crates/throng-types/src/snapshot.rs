//! Persisted world snapshots and host-facing views.
//!
//! [`WorldSnapshot`] is the full save-file record written to the store at
//! session boundaries. The `*View` types are what the host renderer reads
//! each frame; they carry `TypeScript` bindings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{CreatureState, Epoch, Relationship};
use crate::ids::{CreatureId, PetitionId};
use crate::structs::{Bone, Creature, FoodItem, LastEvent, PetitionEntry, ResourceLedger, Tree};

/// Everything needed to resume a world.
///
/// Interaction cooldowns and in-flight oracle calls are session-scoped and
/// not part of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Identifies the save slot.
    pub world_id: String,
    /// Tick counter at save time.
    pub tick: u64,
    /// Creatures, including those still fading out.
    pub creatures: Vec<Creature>,
    /// Food items in flight or on the ground.
    pub food: Vec<FoodItem>,
    /// Standing trees.
    pub trees: Vec<Tree>,
    /// Unharvested bones.
    pub bones: Vec<Bone>,
    /// Counted resources.
    pub resources: ResourceLedger,
    /// World pollution, 0 to 10.
    pub pollution: f32,
    /// Current civilization epoch.
    pub epoch: Epoch,
    /// Principles the throng has come to hold.
    pub observed_principles: Vec<String>,
    /// Memory carried across collapses.
    pub ancestral_memory: Vec<String>,
    /// Recent world-level events.
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
    #[serde(default)]
    pub births: u64,
    /// Creatures dead since the world began.
    #[serde(default)]
    pub deaths: u64,
    /// Local date the scheduled evaluation last fired.
    pub last_evaluation_date: Option<NaiveDate>,
    /// Narrative line on display.
    pub last_event: LastEvent,
    /// Wall-clock save time.
    pub saved_at: DateTime<Utc>,
}

/// Per-lineage aggregate written next to the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LineageSummary {
    /// The lineage fingerprint.
    pub lineage: String,
    /// Living members.
    pub members: u32,
    /// Mean hunger of living members.
    pub average_hunger: f32,
    /// Highest evolution generation among members.
    pub max_generation: u32,
    /// Recent events pooled from members' logs.
    pub recent_events: Vec<String>,
}

/// A creature as the host renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CreatureView {
    /// Durable identity.
    pub id: CreatureId,
    /// Lineage fingerprint.
    pub lineage: String,
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Current activity.
    pub state: CreatureState,
    /// Satiety.
    pub hunger: f32,
    /// Cleanliness.
    pub clean: f32,
    /// Happiness.
    pub happiness: f32,
    /// Ticks lived.
    pub age: u64,
    /// False while fading out.
    pub alive: bool,
    /// Evolution generation.
    pub generation: u32,
    /// Installed behavior, summarized.
    pub behavior: Option<String>,
    /// Newest log entry.
    pub last_log: Option<String>,
}

impl From<&Creature> for CreatureView {
    fn from(creature: &Creature) -> Self {
        Self {
            id: creature.id,
            lineage: creature.lineage.clone(),
            x: creature.x,
            y: creature.y,
            state: creature.state,
            hunger: creature.hunger,
            clean: creature.clean,
            happiness: creature.happiness,
            age: creature.age,
            alive: creature.alive,
            generation: creature.evolution_generation,
            behavior: creature.behavior.as_ref().map(|b| b.description.clone()),
            last_log: creature.event_log.entries().last().cloned(),
        }
    }
}

/// A positioned, renderable thing with no further state the host needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Marker {
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Height above ground (food only, 0 otherwise).
    pub z: f32,
}

/// A tree as the host renders it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TreeView {
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Drops remaining.
    pub health: u32,
}

/// The whole world as the host renders it each frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldView {
    /// Tick counter.
    pub tick: u64,
    /// Current epoch.
    pub epoch: Epoch,
    /// Pollution, 0 to 10.
    pub pollution: f32,
    /// Living creatures.
    pub population: u32,
    /// Births since the world began.
    pub births: u64,
    /// Deaths since the world began.
    pub deaths: u64,
    /// Counted resources.
    pub resources: ResourceLedger,
    /// How the throng regards the authority.
    pub relationship: Relationship,
    /// Narrative line, while its display timer runs.
    pub last_event: Option<String>,
    /// All creatures, including the fading dead.
    pub creatures: Vec<CreatureView>,
    /// Food items.
    pub food: Vec<Marker>,
    /// Trees.
    pub trees: Vec<TreeView>,
    /// Bones.
    pub bones: Vec<Marker>,
    /// Unresolved petitions.
    pub petitions: Vec<PetitionEntry>,
    /// Observed principles.
    pub principles: Vec<String>,
    /// Ancestral memory.
    pub ancestral_memory: Vec<String>,
}

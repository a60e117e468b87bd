//! Entity records: creatures, food, trees, bones, the resource ledger and
//! petition entries.
//!
//! Records enforce their own local invariants (vitals in range, capped
//! logs). Cross-entity rules live in `throng-core`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::behavior::RuleSet;
use crate::enums::CreatureState;
use crate::ids::{CreatureId, FoodKey, PetitionId};

/// Maximum number of entries in a creature's event log.
pub const EVENT_LOG_CAP: usize = 10;

/// Maximum number of pending proposals a creature holds.
pub const PROPOSAL_CAP: usize = 5;

/// Length of every lineage fingerprint.
pub const LINEAGE_LEN: usize = 4;

/// Upper bound of every vital.
pub const VITAL_MAX: f32 = 100.0;

/// Append to a list, evicting the oldest entries past `cap`.
pub fn push_bounded<T>(entries: &mut Vec<T>, item: T, cap: usize) {
    entries.push(item);
    if entries.len() > cap {
        let excess = entries.len().saturating_sub(cap);
        entries.drain(..excess);
    }
}

/// Clamp a vital into `[0, 100]`. Non-finite values collapse to 0.
pub fn clamp_vital(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, VITAL_MAX)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Append-only, capped history of notable occurrences.
///
/// This is both the audit trail and the only memory a child inherits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog(Vec<String>);

impl EventLog {
    /// Append an entry, evicting the oldest once the log holds
    /// [`EVENT_LOG_CAP`] entries.
    pub fn push(&mut self, entry: impl Into<String>) {
        push_bounded(&mut self.0, entry.into(), EVENT_LOG_CAP);
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[String] {
        let start = self.0.len().saturating_sub(n);
        self.0.get(start..).unwrap_or_default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for EventLog {
    fn from(mut entries: Vec<String>) -> Self {
        let excess = entries.len().saturating_sub(EVENT_LOG_CAP);
        entries.drain(..excess);
        Self(entries)
    }
}

// ---------------------------------------------------------------------------
// Creature
// ---------------------------------------------------------------------------

/// A living or recently-dead throng member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    /// Durable identity.
    pub id: CreatureId,
    /// Fixed-length kinship fingerprint; drifts one character per birth.
    pub lineage: String,

    /// Satiety, 0 (starved) to 100 (full).
    pub hunger: f32,
    /// Cleanliness, 0 to 100.
    pub clean: f32,
    /// Happiness, 0 to 100.
    pub happiness: f32,
    /// Ticks lived.
    pub age: u64,
    /// False once hunger has reached 0.
    pub alive: bool,
    /// Tick of death, 0 while alive.
    pub died_at: u64,

    /// Position in tile coordinates.
    pub x: f32,
    /// Position in tile coordinates.
    pub y: f32,
    /// Velocity in tiles per unit `dt`.
    pub vx: f32,
    /// Velocity in tiles per unit `dt`.
    pub vy: f32,

    /// Current visible activity.
    pub state: CreatureState,
    /// Remaining time in the current activity.
    pub state_timer: f32,
    /// Installed evolved behavior, if any.
    pub behavior: Option<RuleSet>,
    /// 0 for founders; parent + 1 at birth.
    pub evolution_generation: u32,
    /// Set when an installed behavior faulted. Inherited; a corrupted
    /// branch keeps the built-in behavior for good.
    #[serde(default)]
    pub behavior_corrupted: bool,

    /// Capped history, inherited by children.
    pub event_log: EventLog,
    /// Desires awaiting synthesis into a petition.
    pub proposals: Vec<String>,
    /// How many petitions touching this creature were denied.
    pub denied_count: u32,

    /// Time the reproduction preconditions have held without a break.
    #[serde(default)]
    pub repro_timer: f32,
    /// Bones this creature has mourned at.
    #[serde(default)]
    pub deaths_witnessed: u32,
    /// Food item currently being steered toward. Arena keys do not persist.
    #[serde(skip)]
    pub target_food: Option<FoodKey>,
}

impl Creature {
    /// Create a founder at full vitals.
    pub fn founder(lineage: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            id: CreatureId::new(),
            lineage: lineage.into(),
            hunger: VITAL_MAX,
            clean: VITAL_MAX,
            happiness: 80.0,
            age: 0,
            alive: true,
            died_at: 0,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            state: CreatureState::Idle,
            state_timer: 0.0,
            behavior: None,
            evolution_generation: 0,
            behavior_corrupted: false,
            event_log: EventLog::default(),
            proposals: Vec::new(),
            denied_count: 0,
            repro_timer: 0.0,
            deaths_witnessed: 0,
            target_food: None,
        }
    }

    /// Clamp all vitals into `[0, 100]`.
    pub fn clamp_vitals(&mut self) {
        self.hunger = clamp_vital(self.hunger);
        self.clean = clamp_vital(self.clean);
        self.happiness = clamp_vital(self.happiness);
    }

    /// Clamp the velocity vector to at most `max_speed` in magnitude.
    /// Non-finite components are zeroed.
    pub fn clamp_velocity(&mut self, max_speed: f32) {
        if !self.vx.is_finite() || !self.vy.is_finite() {
            self.vx = 0.0;
            self.vy = 0.0;
            return;
        }
        let speed = self.vx.hypot(self.vy);
        if speed > max_speed && speed > 0.0 {
            let scale = max_speed / speed;
            self.vx *= scale;
            self.vy *= scale;
        }
    }

    /// Append a desire, evicting the oldest past [`PROPOSAL_CAP`].
    pub fn propose(&mut self, desire: impl Into<String>) {
        push_bounded(&mut self.proposals, desire.into(), PROPOSAL_CAP);
    }

    /// Euclidean distance to a point.
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        (self.x - x).hypot(self.y - y)
    }

    /// The vitals as a `(hunger, clean, happiness)` triple.
    pub const fn vitals(&self) -> (f32, f32, f32) {
        (self.hunger, self.clean, self.happiness)
    }
}

// ---------------------------------------------------------------------------
// Food, trees, bones
// ---------------------------------------------------------------------------

/// A consumable that falls, bounces once, and rests on the ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    /// Ground position.
    pub x: f32,
    /// Ground position.
    pub y: f32,
    /// Height above ground.
    pub z: f32,
    /// Ground velocity.
    pub vx: f32,
    /// Ground velocity.
    pub vy: f32,
    /// Vertical velocity (positive is up).
    pub vz: f32,
    /// Whether the single bounce has been spent.
    pub bounced: bool,
    /// Consumed and awaiting removal.
    pub eaten: bool,
    /// Tick the item appeared, for expiry.
    pub spawned_at: u64,
}

impl FoodItem {
    /// Drop food from height `z` at a ground position.
    pub const fn dropped(x: f32, y: f32, z: f32, spawned_at: u64) -> Self {
        Self {
            x,
            y,
            z,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            bounced: false,
            eaten: false,
            spawned_at,
        }
    }

    /// Resting on the ground and still edible.
    pub fn is_available(&self) -> bool {
        !self.eaten && self.z <= 0.0
    }
}

/// A stationary food source that depletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Food drops left before the tree is gone.
    pub health: u32,
    /// Time accumulated toward the next drop.
    pub regrow_timer: f32,
}

impl Tree {
    /// Plant a tree with the given health.
    pub const fn planted(x: f32, y: f32, health: u32) -> Self {
        Self {
            x,
            y,
            health,
            regrow_timer: 0.0,
        }
    }
}

/// Marker left where a creature died.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Ticks since deposit.
    pub age: u64,
    /// Who died here.
    pub creature_id: CreatureId,
    /// Lineage of the deceased.
    pub lineage: String,
}

impl Bone {
    /// Deposit a bone where a creature died.
    pub fn at(x: f32, y: f32, creature_id: CreatureId, lineage: impl Into<String>) -> Self {
        Self {
            x,
            y,
            age: 0,
            creature_id,
            lineage: lineage.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger and petitions
// ---------------------------------------------------------------------------

/// Counted resources held by the world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceLedger {
    /// Stored food units.
    pub food: u32,
    /// Harvested bones.
    pub bones: u32,
}

/// One ranked desire presented to the external authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PetitionEntry {
    /// Sequence number.
    pub id: PetitionId,
    /// What the throng asks for.
    pub text: String,
    /// 1 (idle wish) to 5 (desperate).
    pub urgency: u8,
    /// Lineage the request speaks for, or `*` for everyone.
    pub lineage_scope: String,
}

/// Narrative line shown by the host for a while.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LastEvent {
    /// Narrative text.
    pub text: String,
    /// Remaining display time.
    pub timer: f32,
}

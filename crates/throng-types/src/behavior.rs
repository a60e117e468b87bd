//! Grammar of evolvable creature behavior.
//!
//! A creature's control function is a short list of `condition -> effect`
//! rules drawn from a closed vocabulary. Rule sets are plain data: they
//! serialize into snapshots, travel to and from the oracle as JSON, and are
//! interpreted by `throng-core`. Nothing here executes code.
//!
//! JSON shape (externally tagged, `snake_case`):
//!
//! ```json
//! {
//!   "description": "hoards food when anxious",
//!   "rules": [
//!     { "when": { "hunger_below": 40.0 }, "then": { "approach": { "target": "food", "strength": 0.2 } } },
//!     { "when": "kin_nearby", "then": { "adjust_happiness": 0.05 } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Predicate over a creature and its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Condition {
    /// Always true.
    Always,
    /// Hunger strictly below the value.
    HungerBelow(f32),
    /// Hunger strictly above the value.
    HungerAbove(f32),
    /// Cleanliness strictly below the value.
    CleanBelow(f32),
    /// Cleanliness strictly above the value.
    CleanAbove(f32),
    /// Happiness strictly below the value.
    HappinessBelow(f32),
    /// Happiness strictly above the value.
    HappinessAbove(f32),
    /// Age in ticks strictly above the value.
    AgeAbove(u64),
    /// World pollution strictly above the value.
    PollutionAbove(f32),
    /// Current epoch ordinal at least the value.
    EpochAtLeast(u8),
    /// A living kin creature is within sensing range.
    KinNearby,
    /// Ground food is within sensing range.
    FoodNearby,
}

/// Something a creature can steer relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Target {
    /// Nearest living kin.
    Kin,
    /// Nearest ground food.
    Food,
    /// Middle of the world.
    Center,
}

/// Change applied when a rule's condition holds. Rates are per unit of `dt`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Effect {
    /// Add to hunger (positive means fuller).
    AdjustHunger(f32),
    /// Add to cleanliness.
    AdjustClean(f32),
    /// Add to happiness.
    AdjustHappiness(f32),
    /// Add a fixed velocity impulse.
    Nudge {
        /// X component.
        dx: f32,
        /// Y component.
        dy: f32,
    },
    /// Accelerate toward a target.
    Approach {
        /// What to steer toward.
        target: Target,
        /// Acceleration per unit of `dt`.
        strength: f32,
    },
    /// Accelerate away from a target.
    Avoid {
        /// What to steer away from.
        target: Target,
        /// Acceleration per unit of `dt`.
        strength: f32,
    },
    /// Stop moving.
    Halt,
}

/// One `condition -> effect` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Rule {
    /// Predicate.
    pub when: Condition,
    /// Effect applied while the predicate holds.
    pub then: Effect,
}

/// A complete behavior: ordered rules plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RuleSet {
    /// Short human-readable summary, shown to the oracle on the next mutation.
    pub description: String,
    /// Rules, evaluated in order each tick.
    pub rules: Vec<Rule>,
    /// Seed the local mutation path derives from.
    #[serde(default)]
    pub seed: u64,
}

//! Shared type definitions for the Throng simulation.
//!
//! This crate is the single source of truth for the data model used across
//! the workspace. Host-facing types flow downstream to `TypeScript` via
//! `ts-rs` for the renderer.
//!
//! # Modules
//!
//! - [`ids`] -- Durable creature ids and generational arena keys
//! - [`enums`] -- Creature states, epochs, relationship labels, host tools
//! - [`behavior`] -- The closed rule grammar evolved behaviors are written in
//! - [`structs`] -- Entity records (creatures, food, trees, bones, petitions)
//! - [`snapshot`] -- Persisted snapshots and renderer views

pub mod behavior;
pub mod enums;
pub mod ids;
pub mod snapshot;
pub mod structs;

pub use behavior::{Condition, Effect, Rule, RuleSet, Target};
pub use enums::{CreatureState, Epoch, PetitionAction, Relationship, Tool};
pub use ids::{BoneKey, CreatureId, CreatureKey, FoodKey, PetitionId, TreeKey};
pub use snapshot::{CreatureView, LineageSummary, Marker, TreeView, WorldSnapshot, WorldView};
pub use structs::{
    Bone, Creature, EVENT_LOG_CAP, EventLog, FoodItem, LINEAGE_LEN, LastEvent, PROPOSAL_CAP,
    PetitionEntry, ResourceLedger, Tree, VITAL_MAX, clamp_vital, push_bounded,
};

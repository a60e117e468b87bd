//! Enumeration types for the Throng simulation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Creature behavior state
// ---------------------------------------------------------------------------

/// What a creature is visibly doing. Each state runs on a countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CreatureState {
    /// Standing still.
    #[default]
    Idle,
    /// Wandering or steering toward food.
    Walking,
    /// Consuming a food item.
    Eating,
    /// Being washed by the host.
    Bathing,
    /// Being played with by the host.
    Playing,
    /// Dead and fading out.
    Dying,
}

// ---------------------------------------------------------------------------
// Civilization epochs
// ---------------------------------------------------------------------------

/// One of the five civilization eras.
///
/// Ordinals are stable and appear in persisted snapshots and oracle plans:
/// Eden(0), Pastoral(1), Agricultural(2), Industrial(3), Collapse(4).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Epoch {
    /// The garden. Every world starts (and restarts) here.
    #[default]
    Eden,
    /// Herding and small bands.
    Pastoral,
    /// Fields and settlements.
    Agricultural,
    /// Smoke and machines. Pollution climbs fast.
    Industrial,
    /// The fall. Lasts until the population dwindles below the floor.
    Collapse,
}

impl Epoch {
    /// Every epoch in ordinal order.
    pub const ALL: [Self; 5] = [
        Self::Eden,
        Self::Pastoral,
        Self::Agricultural,
        Self::Industrial,
        Self::Collapse,
    ];

    /// Stable ordinal (0 through 4).
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Eden => 0,
            Self::Pastoral => 1,
            Self::Agricultural => 2,
            Self::Industrial => 3,
            Self::Collapse => 4,
        }
    }

    /// Look up an epoch by ordinal.
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Eden),
            1 => Some(Self::Pastoral),
            2 => Some(Self::Agricultural),
            3 => Some(Self::Industrial),
            4 => Some(Self::Collapse),
            _ => None,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eden => "Eden",
            Self::Pastoral => "Pastoral",
            Self::Agricultural => "Agricultural",
            Self::Industrial => "Industrial",
            Self::Collapse => "Collapse",
        }
    }
}

impl core::fmt::Display for Epoch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Petition economy
// ---------------------------------------------------------------------------

/// How the throng regards the external authority, derived from the
/// cumulative grant and deny counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Relationship {
    /// The authority has never answered.
    #[default]
    Absent,
    /// Mostly grants.
    Benevolent,
    /// A mix of grants and denials.
    Capricious,
    /// Mostly denials.
    Feared,
}

impl Relationship {
    /// Derive the label from cumulative counts.
    pub const fn from_counts(grants: u32, denials: u32) -> Self {
        if grants == 0 && denials == 0 {
            Self::Absent
        } else if grants > denials.saturating_mul(2) {
            Self::Benevolent
        } else if denials > grants.saturating_mul(2) {
            Self::Feared
        } else {
            Self::Capricious
        }
    }
}

/// Terminal action the authority can take on a petition entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PetitionAction {
    /// Apply the keyword-matched world effect.
    Grant,
    /// Penalize the entry's lineage scope.
    Deny,
    /// Leave the entry for the next synthesis.
    Ignore,
}

// ---------------------------------------------------------------------------
// Host tools
// ---------------------------------------------------------------------------

/// A tool the host can apply to the nearest creature under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Tool {
    /// Restore cleanliness.
    Wash,
    /// Raise happiness.
    Play,
    /// Hand-feed.
    Feed,
}

//! Identifier types.
//!
//! Two kinds of identity live side by side:
//!
//! - [`CreatureId`] is the durable, opaque identity of a creature. It is
//!   what the oracle sees, what persists across sessions, and what the host
//!   displays. UUID v7 so ids sort by creation time.
//! - The `*Key` types are generational slot-map handles into the live world
//!   arena. A key carries a version; once its slot is freed the key never
//!   resolves again, which is how late oracle completions detect that their
//!   entity is gone.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }

            /// Parse an identifier from its string form.
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Durable identifier for a creature.
    CreatureId
}

new_key_type! {
    /// Arena handle for a creature.
    pub struct CreatureKey;
    /// Arena handle for a food item.
    pub struct FoodKey;
    /// Arena handle for a tree.
    pub struct TreeKey;
    /// Arena handle for a bone.
    pub struct BoneKey;
}

/// Sequence number of a petition entry, unique within one world.
pub type PetitionId = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creature_ids_are_unique() {
        let a = CreatureId::new();
        let b = CreatureId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = CreatureId::new();
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn id_parse_roundtrip() {
        let id = CreatureId::new();
        assert_eq!(CreatureId::parse(&id.to_string()), Some(id));
        assert_eq!(CreatureId::parse("not-a-uuid"), None);
    }
}

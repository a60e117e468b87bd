//! Snapshot persistence for the Throng simulation.
//!
//! A world is saved at session boundaries and restored on the next start.
//! `Dragonfly` is the durable store; [`MemoryStore`] stands in when no
//! store is configured and in tests.
//!
//! ```text
//! Engine
//!     |
//!     +-- save(snapshot) --> throng:world:{id}            (WorldSnapshot)
//!     |                  \-> throng:world:{id}:lineages   (LineageSummary[])
//!     |
//!     +-- load(id) --------> WorldSnapshot | None
//! ```
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) connection and JSON keys
//! - [`store`] -- The [`WorldStore`] save/load boundary and [`MemoryStore`]
//! - [`lineage`] -- Per-lineage aggregate
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod lineage;
pub mod store;

pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use store::{MemoryStore, WorldStore};

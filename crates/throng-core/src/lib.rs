//! Simulation core for the Throng life simulation.
//!
//! Owns the world arena and everything that mutates it: the per-frame tick,
//! proximity-gated interactions, behavior rules and their evolution, epochs,
//! the daily holistic evaluation, and the petition economy. Oracle calls go
//! through `throng-oracle` and are applied asynchronously by [`Simulation`].
//!
//! # Modules
//!
//! - [`config`] -- `throng-config.yaml` into strongly-typed structs.
//! - [`world`] -- The world arena and its bounded logs.
//! - [`tick`] -- Needs decay, death, movement, reproduction, food physics.
//! - [`behavior`] -- Rule-set validation, evaluation and local mutation.
//! - [`lineage`] -- Lineage codes, drift and kinship.
//! - [`interaction`] -- Proximity gate, cooldowns, local and oracle outcomes.
//! - [`evolution`] -- Behavior requests for newborns and retargets.
//! - [`epoch`] -- Epoch transitions, collapse and ricorso.
//! - [`holistic`] -- Daily schedule and plan application.
//! - [`petition`] -- Proposals, synthesis and resolution.
//! - [`commands`] -- Host clicks, tools and petition answers.
//! - [`simulation`] -- The frame driver and async completion plumbing.

pub mod behavior;
pub mod commands;
pub mod config;
pub mod epoch;
pub mod evolution;
pub mod holistic;
pub mod interaction;
pub mod lineage;
pub mod petition;
pub mod simulation;
pub mod tick;
pub mod world;

pub use commands::{Command, CommandError};
pub use config::{ConfigError, ThrongConfig};
pub use simulation::Simulation;
pub use tick::TickReport;
pub use world::World;

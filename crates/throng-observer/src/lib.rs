//! Host boundary for the Throng simulation.
//!
//! An Axum HTTP server the renderer polls for world state and posts clicks,
//! tool uses and petition answers to.
//!
//! # Architecture
//!
//! The engine publishes a [`WorldView`] into [`AppState`] after each frame;
//! every read is served from that copy so a request never touches the
//! running world. Commands go the other way over a bounded channel and are
//! applied by the frame loop between steps.
//!
//! [`WorldView`]: throng_types::WorldView

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;

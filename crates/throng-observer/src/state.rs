//! Shared application state for the host boundary.

use std::sync::Arc;

use throng_core::Command;
use throng_types::WorldView;
use tokio::sync::{RwLock, mpsc};

/// Commands buffered between frames before the observer pushes back.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The most recently published world.
    pub view: Arc<RwLock<WorldView>>,
    /// Queue drained by the frame loop.
    pub commands: mpsc::Sender<Command>,
}

impl AppState {
    /// Create the state and the receiving end of the command queue.
    pub fn new(initial: WorldView) -> (Self, mpsc::Receiver<Command>) {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let state = Self {
            view: Arc::new(RwLock::new(initial)),
            commands,
        };
        (state, rx)
    }

    /// Replace the published world.
    pub async fn publish(&self, view: WorldView) {
        *self.view.write().await = view;
    }
}

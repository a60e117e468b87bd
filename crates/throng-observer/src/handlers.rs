//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/world` | The full published world |
//! | `GET` | `/api/creatures` | Creatures (`?status=alive\|dead\|all`) |
//! | `GET` | `/api/petitions` | Unresolved petitions |
//! | `POST` | `/api/commands` | Queue a host command |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use throng_core::Command;
use throng_types::{CreatureView, PetitionEntry, WorldView};
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::error::ObserverError;
use crate::state::AppState;

/// Query parameters for the `GET /api/creatures` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct CreaturesQuery {
    /// Filter by alive/dead/all status. Accepted values: `alive`, `dead`, `all`.
    pub status: Option<String>,
}

/// The full published world.
pub async fn get_world(State(state): State<Arc<AppState>>) -> Json<WorldView> {
    Json(state.view.read().await.clone())
}

/// Creatures, optionally filtered by alive/dead status.
///
/// Returns 400 if `status` is not one of the accepted values.
pub async fn list_creatures(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CreaturesQuery>,
) -> Result<Json<Vec<CreatureView>>, ObserverError> {
    let keep: fn(&CreatureView) -> bool = match params.status.as_deref().unwrap_or("all") {
        "alive" => |c| c.alive,
        "dead" => |c| !c.alive,
        "all" => |_| true,
        other => {
            return Err(ObserverError::InvalidQuery(format!(
                "status must be alive, dead or all, got {other:?}"
            )));
        }
    };
    let view = state.view.read().await;
    Ok(Json(view.creatures.iter().filter(|c| keep(c)).cloned().collect()))
}

/// Unresolved petitions, most urgent first.
pub async fn list_petitions(State(state): State<Arc<AppState>>) -> Json<Vec<PetitionEntry>> {
    Json(state.view.read().await.petitions.clone())
}

/// Queue a command for the next frame. Responds 202; the command's effect
/// shows up in a later `GET /api/world`.
pub async fn post_command(
    State(state): State<Arc<AppState>>,
    Json(command): Json<Command>,
) -> Result<impl IntoResponse, ObserverError> {
    match state.commands.try_send(command) {
        Ok(()) => {
            debug!(?command, "command queued");
            Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "queued": true }))))
        }
        Err(TrySendError::Full(_)) => Err(ObserverError::Busy),
        Err(TrySendError::Closed(_)) => Err(ObserverError::Closed),
    }
}

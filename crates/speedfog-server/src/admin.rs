// crates/speedfog-server/src/admin.rs
// ============================================================================
// Module: SpeedFog Admin Routes
// Description: The thin HTTP surface for organizer-initiated race lifecycle
// transitions (spec.md section 4.9, section 7's "user-initiated paths
// return HTTP 409"). Race/user/invite CRUD itself is an explicit Non-goal;
// this only exposes the three transitions `speedfog-race::RaceController`
// already implements.
// Purpose: Give an organizer a way to start, force-finish, or reset a race
// without a WebSocket inbound message for it (none exists in section 6.1).
// Dependencies: axum, speedfog-race
// ============================================================================

use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use speedfog_core::entities::Race;
use speedfog_core::identifiers::RaceId;
use speedfog_race::ControllerError;
use speedfog_race::RaceController;

/// Body shared by every lifecycle transition: the caller's last-known
/// version, required for the optimistic-concurrency check (I6).
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub expected_version: u64,
}

#[derive(Debug, Serialize)]
struct RaceResponse {
    id: RaceId,
    status: speedfog_core::entities::RaceStatus,
    version: u64,
    started_at: Option<String>,
}

impl From<Race> for RaceResponse {
    fn from(race: Race) -> Self {
        Self {
            id: race.id,
            status: race.status,
            version: race.version,
            started_at: race.started_at.map(|at| at.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

/// Handles `POST /races/:race_id/start`.
pub async fn start_race(
    State(controller): State<Arc<RaceController>>,
    Path(race_id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> impl IntoResponse {
    let race_id = RaceId::from_raw(race_id);
    respond(controller.start(&race_id, body.expected_version).await)
}

/// Handles `POST /races/:race_id/force-finish`.
pub async fn force_finish_race(
    State(controller): State<Arc<RaceController>>,
    Path(race_id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> impl IntoResponse {
    let race_id = RaceId::from_raw(race_id);
    respond(controller.force_finish(&race_id, body.expected_version).await)
}

/// Handles `POST /races/:race_id/reset`.
pub async fn reset_race(
    State(controller): State<Arc<RaceController>>,
    Path(race_id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> impl IntoResponse {
    let race_id = RaceId::from_raw(race_id);
    respond(controller.reset(&race_id, body.expected_version).await)
}

fn respond(result: Result<Race, ControllerError>) -> impl IntoResponse {
    match result {
        Ok(race) => (StatusCode::OK, Json(RaceResponse::from(race))).into_response(),
        Err(ControllerError::Conflict) => {
            (StatusCode::CONFLICT, Json(ErrorBody { message: "transition conflict".to_string() }))
                .into_response()
        }
        Err(ControllerError::RaceNotFound) => {
            (StatusCode::NOT_FOUND, Json(ErrorBody { message: "race not found".to_string() })).into_response()
        }
        Err(err @ ControllerError::SeedNotFound) => {
            tracing::warn!(error = %err, "admin transition failed: seed data inconsistent");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { message: "internal error".to_string() }))
                .into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "admin transition failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { message: "internal error".to_string() }))
                .into_response()
        }
    }
}

// crates/speedfog-server/src/health.rs
// ============================================================================
// Module: SpeedFog Health Route
// Description: `/healthz` readiness probe (SPEC_FULL.md section C).
// Purpose: Report store reachability and room-registry size so an
// orchestrator can tell a wedged process apart from a healthy one.
// Dependencies: axum, speedfog-core, speedfog-rooms
// ============================================================================

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use speedfog_core::entities::RaceStatus;
use speedfog_core::store::RaceStore;
use speedfog_core::store::Store;
use speedfog_rooms::RoomRegistry;

/// Collaborators the health route reads from.
pub struct HealthState {
    /// Store, probed with a cheap read.
    pub store: Arc<dyn Store>,
    /// Room registry, reported for operational visibility.
    pub rooms: Arc<RoomRegistry>,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    rooms: usize,
}

/// Handles `GET /healthz`: 200 if the store answers a trivial query, 503
/// otherwise.
pub async fn healthz(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    match state.store.list_races_by_status(RaceStatus::Running) {
        Ok(_) => {
            let rooms = state.rooms.room_count().await;
            (StatusCode::OK, Json(HealthBody { status: "ok", rooms })).into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "healthz store probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthBody { status: "unavailable", rooms: 0 }))
                .into_response()
        }
    }
}

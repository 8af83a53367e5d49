// crates/speedfog-ws/src/router.rs
// ============================================================================
// Module: SpeedFog WS Router
// Description: The two `axum` routes external interfaces describe (spec.md
// section 6.1, 6.2).
// Purpose: `speedfog-server` merges this router into its own; it owns
// nothing beyond the WebSocket upgrade handlers.
// Dependencies: axum
// ============================================================================

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::Path;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use speedfog_core::identifiers::RaceId;

use crate::mod_session::handle_mod_connection;
use crate::spectator_session::handle_spectator_connection;
use crate::state::WsState;

/// Builds the `/ws/mod/{race_id}` and `/ws/race/{race_id}` routes over
/// `state`.
#[must_use]
pub fn router(state: Arc<WsState>) -> Router {
    Router::new()
        .route("/ws/mod/:race_id", get(mod_ws_handler))
        .route("/ws/race/:race_id", get(spectator_ws_handler))
        .with_state(state)
}

async fn mod_ws_handler(
    State(state): State<Arc<WsState>>,
    Path(race_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let race_id = RaceId::from_raw(race_id);
    ws.on_upgrade(move |socket| handle_mod_connection(socket, state, race_id))
}

async fn spectator_ws_handler(
    State(state): State<Arc<WsState>>,
    Path(race_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let race_id = RaceId::from_raw(race_id);
    ws.on_upgrade(move |socket| handle_spectator_connection(socket, state, race_id))
}

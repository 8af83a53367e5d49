// crates/speedfog-ws/src/spectator_session.rs
// ============================================================================
// Module: SpeedFog Spectator Session Handler
// Description: Per-connection protocol driver for `/ws/race/{race_id}`
// (spec.md section 4.7, C7): optional auth, gated initial snapshot, passive
// keep-alive.
// Purpose: Spectators never mutate race state; this handler only reads and
// registers/deregisters from the room.
// Dependencies: axum, speedfog-core, speedfog-rooms, speedfog-race
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use futures::StreamExt;

use speedfog_core::identifiers::RaceId;
use speedfog_core::store::RaceStore;
use speedfog_core::store::SeedStore;
use speedfog_core::wire::RaceSummary;
use speedfog_core::wire::SpectatorInbound;
use speedfog_core::wire::SpectatorOutbound;
use speedfog_race::leaderboard_views;
use speedfog_race::spectator_seed_view;
use speedfog_rooms::Room;
use speedfog_rooms::SpectatorConn;
use speedfog_rooms::ViewerContext;

use crate::conn::AxumSpectatorConn;
use crate::state::WsState;

/// Drives one spectator WebSocket connection through its whole lifecycle.
pub async fn handle_spectator_connection(socket: WebSocket, state: Arc<WsState>, race_id: RaceId) {
    let (sink, mut stream) = socket.split();

    let viewer = wait_for_optional_auth(&mut stream, &state, &race_id).await;

    let Ok(Some(race)) = state.store.load_race(&race_id) else { return };
    let Ok(Some(seed)) = state.store.load_seed(&race.seed_id) else { return };
    let Ok(participants) = state.store.list_participants(&race_id) else { return };

    let conn = AxumSpectatorConn::new(viewer.clone(), sink);
    let seed_view = spectator_seed_view(race.status, &viewer, &seed);
    let summary = RaceSummary { id: race.id.clone(), name: race.name.clone(), status: race.status };
    let snapshot = SpectatorOutbound::RaceState {
        race: summary,
        seed: seed_view,
        participants: leaderboard_views(&seed.graph, participants),
    };
    if let Ok(payload) = serde_json::to_string(&snapshot) {
        let _ = conn.send(&payload).await;
    }

    let room = state.rooms.get_or_create(&race_id).await;
    let dyn_conn: Arc<dyn SpectatorConn> = conn.clone();
    room.connect_spectator(Arc::clone(&dyn_conn)).await;
    broadcast_spectator_count(&room).await;

    let heartbeat = spawn_heartbeat(Arc::clone(&conn), state.timeouts.heartbeat_interval);

    drain_inbound(&mut stream).await;

    heartbeat.abort();
    room.disconnect_spectator(&dyn_conn).await;
    state.rooms.reap_if_empty(&race_id).await;
    broadcast_spectator_count(&room).await;
}

async fn wait_for_optional_auth(
    stream: &mut futures::stream::SplitStream<WebSocket>,
    state: &WsState,
    race_id: &RaceId,
) -> ViewerContext {
    let first = tokio::time::timeout(state.timeouts.spectator_grace, stream.next()).await;
    let Ok(Some(Ok(Message::Text(text)))) = first else {
        return ViewerContext::default();
    };
    let Ok(SpectatorInbound::Auth { token }) = serde_json::from_str::<SpectatorInbound>(&text) else {
        return ViewerContext::default();
    };
    state.spectator_auth.resolve(race_id, &token).await.unwrap_or_default()
}

async fn drain_inbound(stream: &mut futures::stream::SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        let Ok(frame) = frame else { break };
        if matches!(frame, Message::Close(_)) {
            break;
        }
        // Spectators have nothing meaningful to say after the optional auth
        // message; every other frame is discarded to keep the TCP
        // connection (and its heartbeat) alive.
    }
}

fn spawn_heartbeat(conn: Arc<AxumSpectatorConn>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(payload) = serde_json::to_string(&SpectatorOutbound::Ping {}) else { return };
        loop {
            tokio::time::sleep(interval).await;
            if conn.send(&payload).await.is_err() {
                conn.close(1011).await;
                break;
            }
        }
    })
}

async fn broadcast_spectator_count(room: &Room) {
    let count = room.spectator_count().await;
    if let Ok(payload) = serde_json::to_string(&SpectatorOutbound::SpectatorCount { count }) {
        room.broadcast_to_spectators(|_conn| payload.clone()).await;
    }
}

// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: SpeedFog Server Harness
// Description: Spawns the mod/spectator WebSocket router over an in-memory
// store for system-tests.
// Purpose: Provide deterministic server startup and teardown without the
// sqlite/config layers `speedfog-server`'s binary wires in.
// Dependencies: speedfog-core, speedfog-race, speedfog-rooms, speedfog-ws,
// tokio
// ============================================================================

use std::sync::Arc;
use std::time::Duration as StdDuration;

use speedfog_core::store::Store;
use speedfog_core::store_memory::InMemoryStore;
use speedfog_core::FixedClock;
use speedfog_race::NoopMetrics;
use speedfog_race::NoopPublisher;
use speedfog_race::RaceController;
use speedfog_rooms::RoomRegistry;
use speedfog_ws::AnonymousAuthResolver;
use speedfog_ws::SessionTimeouts;
use speedfog_ws::WsState;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running SpeedFog WS router plus the collaborators tests drive
/// fixtures and assertions through.
pub struct ServerHandle {
    addr: std::net::SocketAddr,
    pub store: Arc<dyn Store>,
    pub rooms: Arc<RoomRegistry>,
    pub controller: Arc<RaceController>,
    pub clock: Arc<FixedClock>,
    join: JoinHandle<()>,
}

// Intentionally no Drop impl: the test process tears down the runtime on exit.

impl ServerHandle {
    /// Returns the `ws://` URL for the mod endpoint of `race_id`.
    pub fn mod_ws_url(&self, race_id: &str) -> String {
        format!("ws://{}/ws/mod/{race_id}", self.addr)
    }

    /// Returns the `ws://` URL for the spectator endpoint of `race_id`.
    pub fn spectator_ws_url(&self, race_id: &str) -> String {
        format!("ws://{}/ws/race/{race_id}", self.addr)
    }

    /// Aborts the server task. Call at the end of a test that needs an
    /// explicit teardown point (most don't).
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Spawns a fresh server over an in-memory store, anchored to a fixed
/// clock so scenarios can advance time deterministically (S5).
pub async fn spawn_server() -> ServerHandle {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let rooms = Arc::new(RoomRegistry::new(StdDuration::from_secs(2)));
    let clock = Arc::new(FixedClock::new(OffsetDateTime::now_utc()));
    let controller = Arc::new(RaceController::new(
        Arc::clone(&store),
        Arc::clone(&rooms),
        Arc::clone(&clock) as Arc<dyn speedfog_core::Clock>,
        Arc::new(NoopPublisher),
        Arc::new(NoopMetrics),
    ));

    let timeouts = SessionTimeouts {
        auth_timeout: StdDuration::from_secs(5),
        spectator_grace: StdDuration::from_secs(2),
        heartbeat_interval: StdDuration::from_secs(60),
    };
    let ws_state = Arc::new(
        WsState::new(
            Arc::clone(&store),
            Arc::clone(&rooms),
            Arc::clone(&controller),
            Arc::new(speedfog_resolve::ResolverTables::default()),
            Arc::clone(&clock) as Arc<dyn speedfog_core::Clock>,
            Arc::new(AnonymousAuthResolver),
        )
        .with_timeouts(timeouts),
    );

    let app = speedfog_ws::router(ws_state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let addr = listener.local_addr().expect("read listener address");

    let join = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.expect("server task");
    });

    ServerHandle { addr, store, rooms, controller, clock, join }
}

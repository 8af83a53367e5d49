// crates/speedfog-ws/src/state.rs
// ============================================================================
// Module: SpeedFog WS Shared State
// Description: The collaborators and timeouts every session handler needs
// (spec.md sections 4.6, 4.7, 5).
// Purpose: One `Arc<WsState>` cloned into every connection's axum handler;
// construction is speedfog-server's job.
// Dependencies: speedfog-core, speedfog-rooms, speedfog-race, speedfog-resolve
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use speedfog_core::clock::Clock;
use speedfog_core::store::Store;
use speedfog_race::RaceController;
use speedfog_resolve::ResolverTables;
use speedfog_rooms::RoomRegistry;

use crate::auth::SpectatorAuthResolver;

/// Session-phase timeouts (spec.md section 5).
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    /// Mods must send `auth` within this window of connecting.
    pub auth_timeout: Duration,
    /// Spectators get this long to optionally send `auth` before the
    /// initial snapshot is sent anonymously.
    pub spectator_grace: Duration,
    /// Interval between `ping` heartbeats on both endpoints.
    pub heartbeat_interval: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(5),
            spectator_grace: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Shared collaborators behind both WebSocket endpoints.
pub struct WsState {
    /// Race/participant/seed persistence.
    pub store: Arc<dyn Store>,
    /// Live connection rooms.
    pub rooms: Arc<RoomRegistry>,
    /// Race status transitions and their broadcast sequences.
    pub controller: Arc<RaceController>,
    /// Static grace/map lookup tables for `zone_query` resolution (C3).
    pub resolver_tables: Arc<ResolverTables>,
    /// Wall clock, injected for test determinism.
    pub clock: Arc<dyn Clock>,
    /// Spectator bearer-token resolver.
    pub spectator_auth: Arc<dyn SpectatorAuthResolver>,
    /// Per-phase timeouts.
    pub timeouts: SessionTimeouts,
}

impl WsState {
    /// Builds shared state from its collaborators, using default timeouts.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        rooms: Arc<RoomRegistry>,
        controller: Arc<RaceController>,
        resolver_tables: Arc<ResolverTables>,
        clock: Arc<dyn Clock>,
        spectator_auth: Arc<dyn SpectatorAuthResolver>,
    ) -> Self {
        Self {
            store,
            rooms,
            controller,
            resolver_tables,
            clock,
            spectator_auth,
            timeouts: SessionTimeouts::default(),
        }
    }

    /// Overrides the default timeouts, e.g. with values loaded from
    /// `speedfog-config`.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

// crates/speedfog-rooms/src/room.rs
// ============================================================================
// Module: SpeedFog Room
// Description: One race's live connections and broadcast primitives
// (spec.md section 4.2, C2).
// Purpose: Snapshot-before-broadcast fan-out so concurrent connect/
// disconnect never corrupts an in-flight send loop.
// Dependencies: tokio::sync, speedfog-rooms::conn
// ============================================================================

//! ## Overview
//! A single mutex guards both connection collections; broadcasts clone the
//! collection into a `Vec` and release the lock before doing any socket
//! I/O, per spec.md section 5 ("never hold [locks] across ... I/O"). A
//! second, dedicated lock scopes a whole multi-step broadcast *sequence*
//! (spec.md section 4.9) so no other sequence for the same race can
//! interleave between its steps.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tracing::warn;

use speedfog_core::identifiers::ParticipantId;

use crate::conn::ModConn;
use crate::conn::SpectatorConn;

/// Errors raised by room connection operations.
#[derive(Debug, Error)]
pub enum RoomError {
    /// `connect_mod` was called for a participant with an existing live
    /// connection (I7).
    #[error("participant already connected")]
    AlreadyConnected,
}

struct RoomState {
    mods: BTreeMap<ParticipantId, Arc<dyn ModConn>>,
    spectators: Vec<Arc<dyn SpectatorConn>>,
}

/// One race's live connections.
pub struct Room {
    state: Mutex<RoomState>,
    sequence_lock: Mutex<()>,
    send_timeout: Duration,
}

impl Room {
    /// Creates an empty room whose individual sends are bounded by
    /// `send_timeout`.
    #[must_use]
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RoomState { mods: BTreeMap::new(), spectators: Vec::new() }),
            sequence_lock: Mutex::new(()),
            send_timeout,
        }
    }

    /// Registers a mod connection, rejecting a second live connection for
    /// the same participant (I7).
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::AlreadyConnected`] if `participant_id` already
    /// has a live connection.
    pub async fn connect_mod(
        &self,
        participant_id: ParticipantId,
        conn: Arc<dyn ModConn>,
    ) -> Result<(), RoomError> {
        let mut state = self.state.lock().await;
        if state.mods.contains_key(&participant_id) {
            return Err(RoomError::AlreadyConnected);
        }
        state.mods.insert(participant_id, conn);
        Ok(())
    }

    /// Removes a mod connection, if present.
    pub async fn disconnect_mod(&self, participant_id: &ParticipantId) {
        let mut state = self.state.lock().await;
        state.mods.remove(participant_id);
    }

    /// Cheap liveness probe: true if `participant_id` already has a live
    /// connection. Doesn't register anything; `connect_mod` is still the
    /// authority that rejects a racing second registration.
    pub async fn has_mod(&self, participant_id: &ParticipantId) -> bool {
        let state = self.state.lock().await;
        state.mods.contains_key(participant_id)
    }

    /// Registers a spectator connection. Duplicates are permitted (spec.md
    /// section 4.2).
    pub async fn connect_spectator(&self, conn: Arc<dyn SpectatorConn>) {
        let mut state = self.state.lock().await;
        state.spectators.push(conn);
    }

    /// Removes a spectator connection by identity.
    pub async fn disconnect_spectator(&self, conn: &Arc<dyn SpectatorConn>) {
        let mut state = self.state.lock().await;
        state.spectators.retain(|existing| !Arc::ptr_eq(existing, conn));
    }

    /// Whether this room has no live connections (used by the registry to
    /// bound memory).
    pub async fn is_empty(&self) -> bool {
        let state = self.state.lock().await;
        state.mods.is_empty() && state.spectators.is_empty()
    }

    /// Acquires the per-room broadcast sequence lock, used by callers
    /// (`speedfog-race`) to run a multi-step broadcast sequence atomically
    /// with respect to any other sequence on this room.
    pub async fn lock_sequence(&self) -> MutexGuard<'_, ()> {
        self.sequence_lock.lock().await
    }

    /// Sends `payload` to every connected mod. Failed sends (including
    /// timeouts) are logged and the connection is dropped from the room.
    pub async fn broadcast_to_mods(&self, payload: &str) {
        let snapshot: Vec<Arc<dyn ModConn>> = {
            let state = self.state.lock().await;
            state.mods.values().cloned().collect()
        };
        let mut failed = Vec::new();
        for conn in &snapshot {
            if self.send_with_timeout(conn.send(payload)).await.is_err() {
                failed.push(conn.participant_id().clone());
            }
        }
        if !failed.is_empty() {
            let mut state = self.state.lock().await;
            for participant_id in failed {
                warn!(%participant_id, "dropping mod connection after failed send");
                state.mods.remove(&participant_id);
            }
        }
    }

    /// Sends a payload to one connected mod, if present.
    pub async fn unicast_to_mod(&self, participant_id: &ParticipantId, payload: &str) {
        let conn = {
            let state = self.state.lock().await;
            state.mods.get(participant_id).cloned()
        };
        let Some(conn) = conn else {
            return;
        };
        if self.send_with_timeout(conn.send(payload)).await.is_err() {
            warn!(%participant_id, "dropping mod connection after failed unicast");
            self.disconnect_mod(participant_id).await;
        }
    }

    /// Sends a per-viewer payload (built by `build_payload`) to every
    /// connected spectator.
    pub async fn broadcast_to_spectators<F>(&self, mut build_payload: F)
    where
        F: FnMut(&dyn SpectatorConn) -> String,
    {
        let snapshot: Vec<Arc<dyn SpectatorConn>> = {
            let state = self.state.lock().await;
            state.spectators.clone()
        };
        let mut failed = Vec::new();
        for conn in &snapshot {
            let payload = build_payload(conn.as_ref());
            if self.send_with_timeout(conn.send(&payload)).await.is_err() {
                failed.push(Arc::clone(conn));
            }
        }
        if !failed.is_empty() {
            let mut state = self.state.lock().await;
            state.spectators.retain(|existing| !failed.iter().any(|f| Arc::ptr_eq(existing, f)));
        }
    }

    /// Closes every connection with `code` and empties the room.
    pub async fn close_all(&self, code: u16) {
        let (mods, spectators) = {
            let mut state = self.state.lock().await;
            (std::mem::take(&mut state.mods), std::mem::take(&mut state.spectators))
        };
        for conn in mods.values() {
            conn.close(code).await;
        }
        for conn in &spectators {
            conn.close(code).await;
        }
    }

    /// Number of live spectator connections (for `spectator_count`).
    pub async fn spectator_count(&self) -> usize {
        self.state.lock().await.spectators.len()
    }

    async fn send_with_timeout(
        &self,
        fut: impl std::future::Future<Output = Result<(), String>>,
    ) -> Result<(), ()> {
        match tokio::time::timeout(self.send_timeout, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                warn!(error = %err, "room send failed");
                Err(())
            }
            Err(_) => {
                warn!("room send timed out");
                Err(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use crate::conn::ViewerContext;

    struct RecordingMod {
        participant_id: ParticipantId,
        sends: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ModConn for RecordingMod {
        async fn send(&self, _payload: &str) -> Result<(), String> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err("boom".to_string()) } else { Ok(()) }
        }

        async fn close(&self, _code: u16) {}

        fn participant_id(&self) -> &ParticipantId {
            &self.participant_id
        }
    }

    struct RecordingSpectator {
        viewer: ViewerContext,
        sends: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SpectatorConn for RecordingSpectator {
        async fn send(&self, _payload: &str) -> Result<(), String> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self, _code: u16) {}

        fn viewer(&self) -> &ViewerContext {
            &self.viewer
        }
    }

    #[tokio::test]
    async fn connect_mod_rejects_second_connection_for_same_participant() {
        let room = Room::new(Duration::from_secs(5));
        let participant_id = ParticipantId::new();
        let first = Arc::new(RecordingMod {
            participant_id: participant_id.clone(),
            sends: AtomicUsize::new(0),
            fail: false,
        });
        room.connect_mod(participant_id.clone(), first).await.unwrap();

        let second = Arc::new(RecordingMod {
            participant_id: participant_id.clone(),
            sends: AtomicUsize::new(0),
            fail: false,
        });
        let err = room.connect_mod(participant_id, second).await.unwrap_err();
        assert!(matches!(err, RoomError::AlreadyConnected));
    }

    #[tokio::test]
    async fn broadcast_to_mods_drops_failed_connections() {
        let room = Room::new(Duration::from_secs(5));
        let good_id = ParticipantId::new();
        let bad_id = ParticipantId::new();
        room.connect_mod(
            good_id.clone(),
            Arc::new(RecordingMod { participant_id: good_id.clone(), sends: AtomicUsize::new(0), fail: false }),
        )
        .await
        .unwrap();
        room.connect_mod(
            bad_id.clone(),
            Arc::new(RecordingMod { participant_id: bad_id.clone(), sends: AtomicUsize::new(0), fail: true }),
        )
        .await
        .unwrap();

        room.broadcast_to_mods("payload").await;

        room.connect_mod(
            bad_id.clone(),
            Arc::new(RecordingMod { participant_id: bad_id, sends: AtomicUsize::new(0), fail: true }),
        )
        .await
        .unwrap();
        assert!(!room.is_empty().await);
    }

    #[tokio::test]
    async fn broadcast_to_spectators_builds_per_viewer_payload() {
        let room = Room::new(Duration::from_secs(5));
        let viewer_a = ViewerContext { locale: "en".to_string(), ..Default::default() };
        let viewer_b = ViewerContext { locale: "ja".to_string(), ..Default::default() };
        room.connect_spectator(Arc::new(RecordingSpectator { viewer: viewer_a, sends: AtomicUsize::new(0) }))
            .await;
        room.connect_spectator(Arc::new(RecordingSpectator { viewer: viewer_b, sends: AtomicUsize::new(0) }))
            .await;

        let mut built_locales = Vec::new();
        room.broadcast_to_spectators(|conn| {
            built_locales.push(conn.viewer().locale.clone());
            conn.viewer().locale.clone()
        })
        .await;
        assert_eq!(room.spectator_count().await, 2);
    }

    #[tokio::test]
    async fn close_all_empties_the_room() {
        let room = Room::new(Duration::from_secs(5));
        let participant_id = ParticipantId::new();
        room.connect_mod(
            participant_id.clone(),
            Arc::new(RecordingMod { participant_id, sends: AtomicUsize::new(0), fail: false }),
        )
        .await
        .unwrap();
        room.close_all(1000).await;
        assert!(room.is_empty().await);
    }
}

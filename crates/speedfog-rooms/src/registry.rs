// crates/speedfog-rooms/src/registry.rs
// ============================================================================
// Module: SpeedFog Room Registry
// Description: Process-wide `race_id -> Room` map (spec.md section 4.2, C2).
// Purpose: Own room lifecycle: create on first connect, delete when empty.
// Dependencies: tokio::sync::Mutex
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use speedfog_core::identifiers::RaceId;
use tokio::sync::Mutex;

use crate::room::Room;

/// Process-wide registry of live rooms, one per race with at least one
/// connection.
pub struct RoomRegistry {
    rooms: Mutex<BTreeMap<RaceId, Arc<Room>>>,
    send_timeout: Duration,
}

impl RoomRegistry {
    /// Creates an empty registry. `send_timeout` bounds every individual
    /// broadcast send (spec.md section 4.2: 5s).
    #[must_use]
    pub fn new(send_timeout: Duration) -> Self {
        Self { rooms: Mutex::new(BTreeMap::new()), send_timeout }
    }

    /// Returns the room for `race_id`, creating it if this is the first
    /// connection.
    pub async fn get_or_create(&self, race_id: &RaceId) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(race_id.clone()).or_insert_with(|| Arc::new(Room::new(self.send_timeout))).clone()
    }

    /// Returns the room for `race_id`, if one currently has live
    /// connections.
    pub async fn get(&self, race_id: &RaceId) -> Option<Arc<Room>> {
        self.rooms.lock().await.get(race_id).cloned()
    }

    /// Removes `race_id`'s room from the registry if it has become empty.
    /// Callers invoke this after every disconnect to bound memory.
    pub async fn reap_if_empty(&self, race_id: &RaceId) {
        let room = { self.rooms.lock().await.get(race_id).cloned() };
        let Some(room) = room else {
            return;
        };
        if room.is_empty().await {
            self.rooms.lock().await.remove(race_id);
        }
    }

    /// Closes and deletes `race_id`'s room, if present, with the given
    /// WebSocket close code. Clients reconnect on their own.
    pub async fn close_room(&self, race_id: &RaceId, code: u16) {
        let room = { self.rooms.lock().await.remove(race_id) };
        if let Some(room) = room {
            room.close_all(code).await;
        }
    }

    /// Number of currently tracked rooms (used by `/healthz`).
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

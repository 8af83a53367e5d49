// crates/speedfog-core/src/wire.rs
// ============================================================================
// Module: SpeedFog Wire Protocol
// Description: JSON message shapes for both WebSocket endpoints (spec.md
// section 6).
// Purpose: Shared vocabulary between the race controller (which composes
// broadcast sequences) and the session handlers (which parse inbound
// frames and drive per-connection unicasts). Defined here, rather than in
// speedfog-ws, so speedfog-race can build outbound frames without creating
// a dependency cycle; speedfog-ws re-exports this module as its public
// wire-protocol surface.
// Dependencies: serde, speedfog-core::{identifiers, entities, graph}
// ============================================================================

//! ## Overview
//! All messages are JSON objects with a `type` discriminator (spec.md
//! section 6.3). Every time value on the wire is an integer count of
//! milliseconds since the Unix epoch.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::entities::ParticipantStatus;
use crate::entities::RaceStatus;
use crate::entities::ZoneHistoryEntry;
use crate::graph::Exit;
use crate::graph::SeedGraph;
use crate::identifiers::FlagId;
use crate::identifiers::ModToken;
use crate::identifiers::NodeId;
use crate::identifiers::ParticipantId;
use crate::identifiers::RaceId;
use crate::identifiers::UserId;

fn millis_since_epoch(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Converts an optional timestamp to wire-format milliseconds.
#[must_use]
pub fn millis_opt(at: Option<OffsetDateTime>) -> Option<i64> {
    at.map(millis_since_epoch)
}

// ============================================================================
// SECTION: Shared payload fragments
// ============================================================================

/// Minimal race identity included in `auth_ok`/`race_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSummary {
    /// Race id.
    pub id: RaceId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: RaceStatus,
}

/// Seed metadata sent to mods in `auth_ok` (spec.md section 6.1). The
/// event-id mapping is never disclosed; only the opaque ids the mod should
/// poll for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModSeedView {
    /// Total layer depth of the final boss.
    pub total_layers: u32,
    /// Sorted event flag ids the mod polls game memory for.
    pub event_ids: Vec<FlagId>,
    /// The flag id that signals a finish.
    pub finish_event: FlagId,
}

/// Seed graph view sent to a spectator, present only when the viewer passes
/// the DAG access rule (spec.md section 4.7).
#[derive(Debug, Clone, Serialize)]
pub struct SpectatorSeedView {
    /// The full DAG, included only when gated access allows it.
    pub graph: Option<SeedGraph>,
    /// Metadata total node count; always included regardless of gating.
    pub total_nodes: u64,
    /// Metadata total distinct path count; always included regardless of
    /// gating.
    pub total_paths: u64,
}

/// One row of a `leaderboard_update`/`player_update`/`auth_ok.participants`
/// payload.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantView {
    /// Participant id.
    pub id: ParticipantId,
    /// The registered user.
    pub user_id: UserId,
    /// Lifecycle status.
    pub status: ParticipantStatus,
    /// Current DAG node, if any.
    pub current_zone: Option<NodeId>,
    /// High-watermark layer depth.
    pub current_layer: u32,
    /// Canonical race clock.
    pub igt_ms: u64,
    /// Death counter.
    pub death_count: u32,
    /// Display color index.
    pub color_index: u32,
    /// Registration order within the race.
    pub arrival_order: u64,
    /// Time gap versus the current leader, in milliseconds. `None` when no
    /// gap applies (spec.md section 4.5).
    pub gap_ms: Option<i64>,
    /// Full visit history; included only for FINISHED participants in a
    /// finished race's payloads (spec.md sections 6.1, 4.7).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_history: Option<Vec<ZoneHistoryEntry>>,
}

// ============================================================================
// SECTION: Mod endpoint — inbound
// ============================================================================

/// Inbound messages on `/ws/mod/{race_id}` (spec.md section 6.1).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModInbound {
    /// First message; must arrive within 5s of connect.
    Auth {
        /// The participant's authentication secret.
        mod_token: ModToken,
    },
    /// REGISTERED -> READY.
    Ready {},
    /// Periodic progress report.
    StatusUpdate {
        /// Canonical race clock value.
        igt_ms: u64,
        /// Cumulative death counter.
        death_count: u32,
    },
    /// An in-game memory flag fired.
    EventFlag {
        /// The flag id read from game memory.
        flag_id: FlagId,
        /// Canonical race clock value at the moment the flag fired.
        igt_ms: u64,
    },
    /// A resolver hint for the mod's current position.
    ZoneQuery {
        /// In-game grace entity id, if resting.
        #[serde(default)]
        grace_entity_id: Option<String>,
        /// In-game map id.
        #[serde(default)]
        map_id: Option<String>,
        /// Submap/region discriminator.
        #[serde(default)]
        play_region_id: Option<String>,
    },
    /// Heartbeat reply.
    Pong {},
}

// ============================================================================
// SECTION: Mod endpoint — outbound
// ============================================================================

/// Outbound messages on `/ws/mod/{race_id}` (spec.md section 6.1).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModOutbound {
    /// Sent once auth succeeds, with the initial snapshot.
    AuthOk {
        /// The authenticated participant's id.
        participant_id: ParticipantId,
        /// Minimal race identity.
        race: RaceSummary,
        /// Seed metadata the mod needs to start polling event flags.
        seed: ModSeedView,
        /// Every participant currently registered in the race.
        participants: Vec<ParticipantView>,
    },
    /// Auth failed: bad token, race finished, or duplicate connection.
    AuthError {
        /// Human-readable reason.
        message: String,
    },
    /// An in-loop message was rejected (spec.md section 7:
    /// `StateGuardFailure`).
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// The race has started.
    RaceStart {},
    /// The race's lifecycle status changed.
    RaceStatusChange {
        /// New status.
        status: RaceStatus,
        /// Start timestamp, present only when transitioning to RUNNING.
        started_at: Option<i64>,
    },
    /// A fresh, sorted leaderboard snapshot.
    LeaderboardUpdate {
        /// Participants in sort order (spec.md section 4.5).
        participants: Vec<ParticipantView>,
    },
    /// Unicast to one mod describing its current zone.
    ZoneUpdate {
        /// The resolved DAG node id.
        node_id: NodeId,
        /// Display name of the node.
        display_name: String,
        /// Optional difficulty/variant tier.
        tier: Option<String>,
        /// Outbound traversal exits from this node.
        exits: Vec<Exit>,
    },
    /// A single participant's row changed; sent to spectators.
    PlayerUpdate {
        /// The updated participant.
        player: ParticipantView,
    },
    /// Heartbeat probe, sent every 30s.
    Ping {},
}

// ============================================================================
// SECTION: Spectator endpoint — inbound/outbound
// ============================================================================

/// Inbound messages on `/ws/race/{race_id}` (spec.md section 6.2).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpectatorInbound {
    /// Optional auth, must arrive within 2s if sent at all.
    Auth {
        /// The viewer's bearer token.
        token: String,
    },
}

/// Outbound messages on `/ws/race/{race_id}` (spec.md section 6.2).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpectatorOutbound {
    /// Full per-viewer race snapshot, re-sent on every status transition.
    RaceState {
        /// Minimal race identity.
        race: RaceSummary,
        /// Seed view, gated per spec.md section 4.7.
        seed: SpectatorSeedView,
        /// Every participant currently registered in the race.
        participants: Vec<ParticipantView>,
    },
    /// A single participant's row changed.
    PlayerUpdate {
        /// The updated participant.
        player: ParticipantView,
    },
    /// A fresh, sorted leaderboard snapshot.
    LeaderboardUpdate {
        /// Participants in sort order.
        participants: Vec<ParticipantView>,
    },
    /// The race's lifecycle status changed.
    RaceStatusChange {
        /// New status.
        status: RaceStatus,
        /// Start timestamp, present only when transitioning to RUNNING.
        started_at: Option<i64>,
    },
    /// Current live spectator count.
    SpectatorCount {
        /// Number of connected spectators.
        count: usize,
    },
    /// Heartbeat probe, sent every 30s.
    Ping {},
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    #[test]
    fn mod_inbound_auth_parses_snake_case_tag() {
        let json = r#"{"type":"auth","mod_token":"abc-123"}"#;
        let parsed: ModInbound = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, ModInbound::Auth { mod_token } if mod_token.as_str() == "abc-123"));
    }

    #[test]
    fn mod_inbound_zone_query_defaults_missing_fields() {
        let json = r#"{"type":"zone_query"}"#;
        let parsed: ModInbound = serde_json::from_str(json).unwrap();
        assert!(matches!(
            parsed,
            ModInbound::ZoneQuery { grace_entity_id: None, map_id: None, play_region_id: None }
        ));
    }

    #[test]
    fn mod_outbound_serializes_with_type_tag() {
        let msg = ModOutbound::RaceStart {};
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"race_start"}"#);
    }

    #[test]
    fn participant_view_omits_zone_history_when_none() {
        let view = ParticipantView {
            id: ParticipantId::new(),
            user_id: UserId::new(),
            status: ParticipantStatus::Playing,
            current_zone: None,
            current_layer: 0,
            igt_ms: 0,
            death_count: 0,
            color_index: 0,
            arrival_order: 0,
            gap_ms: None,
            zone_history: None,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("zone_history"));
    }
}

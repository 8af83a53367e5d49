// crates/speedfog-core/src/entities.rs
// ============================================================================
// Module: SpeedFog Entities
// Description: Users, races, participants, seeds, and invites — the data
// model described in spec.md section 3.
// Purpose: Hold entity state and the invariants the store enforces on it.
// Dependencies: crate::identifiers, crate::graph, serde, time
// ============================================================================

//! ## Overview
//! Entities here are plain data. Invariant enforcement (I1-I8) lives in the
//! store (`crate::store`), which is the only code allowed to mutate them.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::graph::SeedGraph;
use crate::identifiers::InviteId;
use crate::identifiers::ModToken;
use crate::identifiers::NodeId;
use crate::identifiers::ParticipantId;
use crate::identifiers::RaceId;
use crate::identifiers::SeedId;
use crate::identifiers::UserId;

// ============================================================================
// SECTION: User
// ============================================================================

/// A user's role within the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// An ordinary registered user.
    User,
    /// A user who may create and manage races.
    Organizer,
    /// A platform administrator.
    Admin,
}

/// Identity sourced from an external OAuth provider (out of scope; see
/// spec.md section 1). Only the fields the coordination core reads or
/// displays are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier.
    pub id: UserId,
    /// External provider username.
    pub external_username: String,
    /// Display name shown in leaderboards and rooms.
    pub display_name: String,
    /// Avatar URL, if any.
    pub avatar: Option<String>,
    /// Per-user API token (rotatable); never logged.
    #[serde(skip_serializing)]
    pub api_token: String,
    /// Role governing organizer-only actions.
    pub role: UserRole,
    /// Locale used to localize spectator/overlay text.
    pub locale: String,
}

// ============================================================================
// SECTION: Race
// ============================================================================

/// Race lifecycle status (spec.md section 3, I6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    /// Accepting registrations; seed may still be rerolled.
    Setup,
    /// In progress.
    Running,
    /// Terminal: all participants finished or abandoned, or force-finished.
    Finished,
}

/// A coordination unit: one seed, many participants, one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    /// Race identifier.
    pub id: RaceId,
    /// Display name.
    pub name: String,
    /// Organizing user.
    pub organizer_user_id: UserId,
    /// The race's single assigned seed (I1).
    pub seed_id: SeedId,
    /// Lifecycle status.
    pub status: RaceStatus,
    /// Monotonically increasing version for optimistic concurrency (I6).
    pub version: u64,
    /// When the race most recently transitioned to RUNNING.
    pub started_at: Option<OffsetDateTime>,
    /// When seeds were released to participants; sticky across reset (I8).
    pub seeds_released_at: Option<OffsetDateTime>,
    /// Whether the race is publicly listed.
    pub is_public: bool,
    /// Optional scheduled start time.
    pub scheduled_at: Option<OffsetDateTime>,
    /// Free-form organizer configuration (out of scope for validation here).
    pub config: serde_json::Value,
    /// Counter used to assign `Participant::arrival_order` on registration;
    /// preserved across reset so identities/ordering survive I8-style resets.
    pub next_arrival_order: u64,
}

impl Race {
    /// Returns whether `to` is a legal transition target from `self.status`,
    /// per the edges in spec.md I6: SETUP -> RUNNING -> FINISHED, plus a
    /// reset edge RUNNING|FINISHED -> SETUP.
    #[must_use]
    pub fn allows_transition(from: RaceStatus, to: RaceStatus) -> bool {
        matches!(
            (from, to),
            (RaceStatus::Setup, RaceStatus::Running)
                | (RaceStatus::Running, RaceStatus::Finished)
                | (RaceStatus::Running, RaceStatus::Setup)
                | (RaceStatus::Finished, RaceStatus::Setup)
        )
    }
}

// ============================================================================
// SECTION: Participant
// ============================================================================

/// Participant lifecycle status (spec.md section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Registered but not yet confirmed ready.
    Registered,
    /// Confirmed ready; awaiting race start.
    Ready,
    /// Actively playing.
    Playing,
    /// Terminal: reached the finish event (I5).
    Finished,
    /// Terminal: swept by a background monitor or force-abandoned (I5).
    Abandoned,
}

impl ParticipantStatus {
    /// Terminal states silently discard further gameplay messages (I5).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Abandoned)
    }
}

/// One entry in a participant's append-only zone history (I4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneHistoryEntry {
    /// The node visited.
    pub node_id: NodeId,
    /// In-game time at the moment of this visit.
    pub igt_ms: u64,
    /// Deaths attributed to this visit (most-recent-matching-entry
    /// attribution; see spec.md section 9 open question).
    pub deaths: u32,
}

/// A user registered for one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Owning race.
    pub race_id: RaceId,
    /// The registered user.
    pub user_id: UserId,
    /// Opaque secret the game client uses to authenticate (I7 keys off
    /// this). Never logged.
    #[serde(skip_serializing)]
    pub mod_token: ModToken,
    /// Lifecycle status.
    pub status: ParticipantStatus,
    /// Current DAG node, if any.
    pub current_zone: Option<NodeId>,
    /// High-watermark layer depth (I3).
    pub current_layer: u32,
    /// Append-only visit history (I4).
    pub zone_history: Vec<ZoneHistoryEntry>,
    /// Canonical race clock.
    pub igt_ms: u64,
    /// Death counter.
    pub death_count: u32,
    /// When this participant finished, if terminal-finished.
    pub finished_at: Option<OffsetDateTime>,
    /// When `igt_ms` last changed; drives the inactivity monitor (C10).
    pub last_igt_change_at: Option<OffsetDateTime>,
    /// Display color index.
    pub color_index: u32,
    /// Registration order within the race; used as the READY/REGISTERED
    /// leaderboard tiebreaker (spec.md section 4.5).
    pub arrival_order: u64,
}

impl Participant {
    /// Returns the most recent `zone_history` entry matching `node_id`, per
    /// the death-attribution open question in spec.md section 9 ("ties to
    /// the most recent matching entry").
    pub fn most_recent_entry_for_mut(&mut self, node_id: &NodeId) -> Option<&mut ZoneHistoryEntry> {
        self.zone_history
            .iter_mut()
            .rev()
            .find(|entry| &entry.node_id == node_id)
    }
}

// ============================================================================
// SECTION: Seed
// ============================================================================

/// Seed lifecycle status (I2: DISCARDED is terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStatus {
    /// Available for assignment.
    Available,
    /// Assigned to exactly one race.
    Consumed,
    /// Retired; never returns to available (I2).
    Discarded,
}

/// A prebuilt randomized scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// Seed identifier.
    pub id: SeedId,
    /// Pool name this seed was generated into.
    pub pool: String,
    /// Numeric identifier within the pool.
    pub numeric_id: u64,
    /// The seed's DAG.
    pub graph: SeedGraph,
    /// Lifecycle status.
    pub status: SeedStatus,
    /// On-disk path to the seed pack artifact (opaque to the core).
    pub file_path: String,
}

// ============================================================================
// SECTION: Invite
// ============================================================================

/// A pending invitation by external username, consumed on acceptance to
/// yield a `Participant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Invite identifier.
    pub id: InviteId,
    /// Target race.
    pub race_id: RaceId,
    /// External username the invite was sent to.
    pub external_username: String,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// Whether this invite has already been consumed.
    pub consumed: bool,
}

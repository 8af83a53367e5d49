// crates/speedfog-race/src/controller.rs
// ============================================================================
// Module: SpeedFog Race Controller
// Description: Orchestrates race status transitions and the broadcast
// sequences that follow them (spec.md section 4.9, C9).
// Purpose: The only code that drives a race through SETUP -> RUNNING ->
// FINISHED (plus reset), keeping the optimistic-transition call and its
// broadcast sequence atomic from another sequence's perspective.
// Dependencies: speedfog-core, speedfog-rooms, speedfog-resolve
// ============================================================================

//! ## Overview
//! Every public method here does at most one `transition_race` call, then
//! (on success) builds and sends its documented broadcast sequence while
//! holding the room's sequence lock, per spec.md section 5 ("broadcast
//! sequences ... are emitted atomically from the caller's perspective").

use std::sync::Arc;

use thiserror::Error;

use speedfog_core::clock::Clock;
use speedfog_core::entities::Race;
use speedfog_core::entities::RaceStatus;
use speedfog_core::error::StoreError;
use speedfog_core::identifiers::RaceId;
use speedfog_core::store::RaceStore;
use speedfog_core::store::RaceTransition;
use speedfog_core::store::SeedStore;
use speedfog_core::store::Store;
use speedfog_core::store::TransitionOutcome;
use speedfog_core::wire::millis_opt;
use speedfog_core::wire::ModOutbound;
use speedfog_core::wire::RaceSummary;
use speedfog_core::wire::SpectatorOutbound;
use speedfog_rooms::Room;
use speedfog_rooms::RoomRegistry;

use crate::gating::spectator_seed_view;
use crate::metrics::RaceMetrics;
use crate::notify::NotificationPublisher;
use crate::views::leaderboard_views;

/// Errors raised by race controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The race does not exist.
    #[error("race not found")]
    RaceNotFound,
    /// The race's assigned seed does not exist, or lacks the expected node.
    #[error("race seed data missing or inconsistent")]
    SeedNotFound,
    /// The optimistic transition lost its race (version or status mismatch).
    /// Organizer-initiated callers should surface this as HTTP 409
    /// (spec.md section 7); `auto_finish_check` treats it as a silent no-op.
    #[error("transition conflict")]
    Conflict,
    /// A broadcast payload failed to serialize (should not happen for the
    /// fixed wire shapes this crate produces).
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Orchestrates race-level status transitions and their broadcast
/// sequences (C9).
pub struct RaceController {
    store: Arc<dyn Store>,
    rooms: Arc<RoomRegistry>,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn NotificationPublisher>,
    metrics: Arc<dyn RaceMetrics>,
}

impl RaceController {
    /// Builds a controller over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        rooms: Arc<RoomRegistry>,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn NotificationPublisher>,
        metrics: Arc<dyn RaceMetrics>,
    ) -> Self {
        Self { store, rooms, clock, publisher, metrics }
    }

    /// SETUP -> RUNNING. Runs the start broadcast sequence (spec.md section
    /// 4.9): `race_start`, a start-node `zone_update`, `race_status_change`,
    /// then a per-viewer `race_state` to every spectator.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Conflict`] if the race has already left
    /// SETUP or another writer changed its version first.
    pub async fn start(&self, race_id: &RaceId, expected_version: u64) -> Result<Race, ControllerError> {
        let started_at = self.clock.now();
        let outcome =
            self.store.transition_race(race_id, expected_version, RaceTransition::Start { started_at })?;
        let race = outcome.applied().ok_or(ControllerError::Conflict)?;

        let seed = self.store.load_seed(&race.seed_id)?.ok_or(ControllerError::SeedNotFound)?;
        let start_node = seed.graph.node(&seed.graph.start_node).ok_or(ControllerError::SeedNotFound)?;

        let room = self.rooms.get_or_create(race_id).await;
        let _sequence = room.lock_sequence().await;

        let race_start = serde_json::to_string(&ModOutbound::RaceStart {})?;
        room.broadcast_to_mods(&race_start).await;

        let zone_update = serde_json::to_string(&ModOutbound::ZoneUpdate {
            node_id: start_node.id.clone(),
            display_name: start_node.display_name.clone(),
            tier: start_node.tier.clone(),
            exits: start_node.exits.clone(),
        })?;
        room.broadcast_to_mods(&zone_update).await;

        self.broadcast_status_change(&room, race.status, race.started_at).await?;
        self.broadcast_race_state(&room, &race, &seed).await?;

        drop(_sequence);
        self.metrics.race_started();
        self.publisher.notify_race_started(&race);
        Ok(race)
    }

    /// Runs the auto-finish check (spec.md section 4.9): if every
    /// participant is terminal, attempts RUNNING -> FINISHED. A lost
    /// optimistic race is treated as a silent no-op (P4: exactly one finish
    /// broadcast sequence survives, regardless of how many callers race to
    /// trigger it).
    ///
    /// # Errors
    ///
    /// Returns a store or serialization error; a lost transition is *not*
    /// an error (it returns `Ok(None)`).
    pub async fn auto_finish_check(&self, race_id: &RaceId) -> Result<Option<Race>, ControllerError> {
        let race = self.store.load_race(race_id)?.ok_or(ControllerError::RaceNotFound)?;
        if race.status != RaceStatus::Running {
            return Ok(None);
        }
        let participants = self.store.list_participants(race_id)?;
        if !participants.iter().all(|p| p.status.is_terminal()) {
            return Ok(None);
        }

        let outcome = self.store.transition_race(race_id, race.version, RaceTransition::Finish)?;
        match outcome {
            TransitionOutcome::Applied(finished) => {
                self.run_finish_sequence(&finished).await?;
                Ok(Some(finished))
            }
            TransitionOutcome::Conflict => {
                self.metrics.auto_finish_conflict();
                Ok(None)
            }
        }
    }

    /// Organizer-triggered RUNNING -> FINISHED, regardless of participant
    /// status. Runs the same finish broadcast sequence as
    /// [`Self::auto_finish_check`].
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Conflict`] on a lost optimistic race —
    /// unlike auto-finish, this is organizer-initiated and should be
    /// surfaced (spec.md section 7: HTTP 409).
    pub async fn force_finish(&self, race_id: &RaceId, expected_version: u64) -> Result<Race, ControllerError> {
        let outcome = self.store.transition_race(race_id, expected_version, RaceTransition::Finish)?;
        let race = outcome.applied().ok_or(ControllerError::Conflict)?;
        self.run_finish_sequence(&race).await?;
        Ok(race)
    }

    /// RUNNING|FINISHED -> SETUP. Closes the room with code 1000 *before*
    /// the transition (spec.md section 4.9); the store resets every
    /// participant to REGISTERED as part of the same atomic transition
    /// (I4, I8). Mods and spectators reconnect on their own.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Conflict`] on a lost optimistic race.
    pub async fn reset(&self, race_id: &RaceId, expected_version: u64) -> Result<Race, ControllerError> {
        self.rooms.close_room(race_id, 1000).await;
        let outcome = self.store.transition_race(race_id, expected_version, RaceTransition::Reset)?;
        outcome.applied().ok_or(ControllerError::Conflict)
    }

    async fn run_finish_sequence(&self, race: &Race) -> Result<(), ControllerError> {
        let seed = self.store.load_seed(&race.seed_id)?.ok_or(ControllerError::SeedNotFound)?;
        let room = self.rooms.get_or_create(&race.id).await;
        let _sequence = room.lock_sequence().await;

        self.broadcast_race_state(&room, race, &seed).await?;
        self.broadcast_status_change(&room, race.status, race.started_at).await?;

        let participants = self.store.list_participants(&race.id)?;
        let views = leaderboard_views(&seed.graph, participants);
        let mod_leaderboard = serde_json::to_string(&ModOutbound::LeaderboardUpdate { participants: views.clone() })?;
        room.broadcast_to_mods(&mod_leaderboard).await;
        let spectator_leaderboard =
            serde_json::to_string(&SpectatorOutbound::LeaderboardUpdate { participants: views })?;
        room.broadcast_to_spectators(|_conn| spectator_leaderboard.clone()).await;

        drop(_sequence);
        self.metrics.race_finished();
        self.publisher.notify_race_finished(race);
        Ok(())
    }

    async fn broadcast_status_change(
        &self,
        room: &Room,
        status: RaceStatus,
        started_at: Option<time::OffsetDateTime>,
    ) -> Result<(), ControllerError> {
        let started_at = millis_opt(started_at);
        let mod_payload = serde_json::to_string(&ModOutbound::RaceStatusChange { status, started_at })?;
        room.broadcast_to_mods(&mod_payload).await;
        let spectator_payload =
            serde_json::to_string(&SpectatorOutbound::RaceStatusChange { status, started_at })?;
        room.broadcast_to_spectators(|_conn| spectator_payload.clone()).await;
        Ok(())
    }

    async fn broadcast_race_state(
        &self,
        room: &Room,
        race: &Race,
        seed: &speedfog_core::entities::Seed,
    ) -> Result<(), ControllerError> {
        let participants = self.store.list_participants(&race.id)?;
        let views = leaderboard_views(&seed.graph, participants);
        let summary = RaceSummary { id: race.id.clone(), name: race.name.clone(), status: race.status };
        room.broadcast_to_spectators(|conn| {
            let seed_view = spectator_seed_view(race.status, conn.viewer(), seed);
            let payload = SpectatorOutbound::RaceState {
                race: summary.clone(),
                seed: seed_view,
                participants: views.clone(),
            };
            serde_json::to_string(&payload).unwrap_or_default()
        })
        .await;
        Ok(())
    }
}

// crates/speedfog-core/src/store.rs
// ============================================================================
// Module: SpeedFog State Store Interfaces
// Description: Backend-agnostic, versioned, invariant-enforcing persistence
// interfaces for races, participants, and seeds (spec.md section 4.1, C1).
// Purpose: Define the contract surfaces storage backends must satisfy.
// Dependencies: crate::entities, crate::error, time
// ============================================================================

//! ## Overview
//! Handlers open one logical transaction per inbound message: load a
//! detached snapshot, mutate it in memory while applying business rules from
//! `speedfog-resolve`/`speedfog-race`, then call `save_*` to commit. The
//! store is the only place invariants are enforced as a last line of
//! defense — callers are expected to already respect them, but a concurrent
//! writer (the background monitor) must never be able to resurrect a
//! terminal participant or roll back a layer (I3, I5).
//!
//! Security posture: none of these interfaces trust caller-supplied
//! `version`/`status` fields beyond what the optimistic check in
//! [`RaceStore::transition_race`] verifies.

use time::OffsetDateTime;

use crate::entities::Participant;
use crate::entities::Race;
use crate::entities::RaceStatus;
use crate::entities::Seed;
use crate::entities::SeedStatus;
use crate::error::StoreError;
use crate::identifiers::ModToken;
use crate::identifiers::ParticipantId;
use crate::identifiers::RaceId;
use crate::identifiers::SeedId;
use crate::identifiers::UserId;

// ============================================================================
// SECTION: Race Transitions
// ============================================================================

/// A race status transition, with the extra field mutations each one
/// carries (spec.md section 4.9).
#[derive(Debug, Clone, Copy)]
pub enum RaceTransition {
    /// SETUP -> RUNNING: records `started_at`.
    Start {
        /// The moment the race started.
        started_at: OffsetDateTime,
    },
    /// RUNNING -> FINISHED: no extra field changes.
    Finish,
    /// RUNNING|FINISHED -> SETUP: clears `started_at`, preserves
    /// `seeds_released_at` (I8).
    Reset,
}

impl RaceTransition {
    /// Statuses this transition may legally originate from.
    #[must_use]
    pub const fn allowed_from(self) -> &'static [RaceStatus] {
        match self {
            Self::Start { .. } => &[RaceStatus::Setup],
            Self::Finish => &[RaceStatus::Running],
            Self::Reset => &[RaceStatus::Running, RaceStatus::Finished],
        }
    }

    /// The status this transition moves to.
    #[must_use]
    pub const fn target(self) -> RaceStatus {
        match self {
            Self::Start { .. } => RaceStatus::Running,
            Self::Finish => RaceStatus::Finished,
            Self::Reset => RaceStatus::Setup,
        }
    }
}

/// Outcome of an optimistic transition attempt (I6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome<T> {
    /// The transition committed; carries the new, detached snapshot.
    Applied(T),
    /// `status` was not in `allowed_from` or `version` did not match.
    /// The caller lost the race; no mutation occurred.
    Conflict,
}

impl<T> TransitionOutcome<T> {
    /// Returns `Some(value)` if applied, `None` on conflict.
    #[must_use]
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Conflict => None,
        }
    }

    /// Returns whether this outcome is a conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

// ============================================================================
// SECTION: Race / Participant Store
// ============================================================================

/// Fields required to create a new race (organizer/invite glue is out of
/// scope; see spec.md section 1).
#[derive(Debug, Clone)]
pub struct NewRace {
    /// Display name.
    pub name: String,
    /// Organizing user.
    pub organizer_user_id: UserId,
    /// The race's initially assigned seed.
    pub seed_id: SeedId,
    /// Whether the race is publicly listed.
    pub is_public: bool,
    /// Optional scheduled start time.
    pub scheduled_at: Option<OffsetDateTime>,
    /// Organizer configuration payload.
    pub config: serde_json::Value,
}

/// Durable, transactional access to races and participants (C1).
pub trait RaceStore: Send + Sync {
    /// Creates a new race in SETUP with the given seed assigned (I1).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn create_race(&self, new: NewRace) -> Result<Race, StoreError>;

    /// Loads a race by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn load_race(&self, id: &RaceId) -> Result<Option<Race>, StoreError>;

    /// Lists every race currently in `status`, in no particular order. Used
    /// by the background monitor (spec.md section 4.10, C10) to find the
    /// RUNNING races it needs to sweep without scanning every race in every
    /// status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn list_races_by_status(&self, status: RaceStatus) -> Result<Vec<Race>, StoreError>;

    /// Atomically applies a status transition iff `race.status` is in
    /// `transition.allowed_from()` and `race.version == expected_version`
    /// (I6). On success the version increments by one. On a lost race,
    /// returns `TransitionOutcome::Conflict` with no mutation performed.
    ///
    /// A `Reset` transition additionally resets every participant in the
    /// race to `REGISTERED` with zeroed progress (I4, I8) as part of the
    /// same atomic unit the backend provides.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails (distinct from a lost
    /// optimistic race, which is a non-error `Conflict` outcome).
    fn transition_race(
        &self,
        id: &RaceId,
        expected_version: u64,
        transition: RaceTransition,
    ) -> Result<TransitionOutcome<Race>, StoreError>;

    /// Sets `seeds_released_at` to `at` if not already set. No-op if a
    /// release timestamp already exists (I8 keeps it sticky).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn release_seed(&self, id: &RaceId, at: OffsetDateTime) -> Result<Race, StoreError>;

    /// Replaces the race's assigned seed (used only by reroll, which the
    /// caller has already verified is legal: SETUP and not yet released).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn set_race_seed(&self, id: &RaceId, seed_id: &SeedId) -> Result<Race, StoreError>;

    /// Registers `user_id` for `race_id`, assigning the next arrival order
    /// and a fresh mod token. Starts in REGISTERED.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn register_participant(
        &self,
        race_id: &RaceId,
        user_id: &UserId,
    ) -> Result<Participant, StoreError>;

    /// Loads a participant by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn load_participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError>;

    /// Loads a participant by race and mod token, used for auth (I7).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn load_participant_by_token(
        &self,
        race_id: &RaceId,
        token: &ModToken,
    ) -> Result<Option<Participant>, StoreError>;

    /// Lists every participant in a race, in no particular order (callers
    /// sort via `speedfog-resolve`'s leaderboard engine).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn list_participants(&self, race_id: &RaceId) -> Result<Vec<Participant>, StoreError>;

    /// Commits a mutated participant snapshot. Enforces, as a last line of
    /// defense against concurrent writers:
    /// - I5: if the currently stored row is already terminal, the save is
    ///   rejected and the unchanged stored row is returned.
    /// - I3: `current_layer` is clamped to
    ///   `max(stored.current_layer, participant.current_layer)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn save_participant(&self, participant: Participant) -> Result<Participant, StoreError>;

    /// Resets every participant in `race_id` to REGISTERED with zeroed
    /// progress, preserving identity (`id`, `user_id`, `mod_token`,
    /// `arrival_order`, `color_index`) (I8). Used standalone by tests; in
    /// production this runs inside `transition_race(.., Reset)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn reset_participants(&self, race_id: &RaceId) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Seed Store
// ============================================================================

/// Durable access to seeds (backs C8's seed service).
pub trait SeedStore: Send + Sync {
    /// Inserts a seed (offline generation tooling is out of scope; this
    /// exists for test fixtures and pool provisioning).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn put_seed(&self, seed: Seed) -> Result<Seed, StoreError>;

    /// Loads a seed by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn load_seed(&self, id: &SeedId) -> Result<Option<Seed>, StoreError>;

    /// Picks a uniformly random AVAILABLE seed in `pool`, excluding ids in
    /// `exclude`. Returns `None` if none qualify.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn pick_available(
        &self,
        pool: &str,
        exclude: &[SeedId],
    ) -> Result<Option<Seed>, StoreError>;

    /// Sets a seed's status unconditionally (I2 is enforced by callers: a
    /// seed service never calls this to move a DISCARDED seed back to
    /// AVAILABLE).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn set_seed_status(&self, id: &SeedId, status: SeedStatus) -> Result<Seed, StoreError>;

    /// Sets every AVAILABLE or CONSUMED seed in `pool` to DISCARDED in one
    /// atomic statement (I2's terminal-retirement guarantee). Returns the
    /// number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn discard_pool(&self, pool: &str) -> Result<u64, StoreError>;
}

/// Convenience supertrait for backends implementing both halves of the
/// store (most callers want both).
pub trait Store: RaceStore + SeedStore {}

impl<T: RaceStore + SeedStore> Store for T {}

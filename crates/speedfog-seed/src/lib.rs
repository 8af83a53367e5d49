// crates/speedfog-seed/src/lib.rs
// ============================================================================
// Crate: speedfog-seed
// Description: Seed lifecycle service: assign, reroll, discard, release
// (spec.md section 4.8, C8).
// Purpose: Compose speedfog-core's SeedStore/RaceStore into the four seed
// operations, each within its own transactional store call.
// Dependencies: speedfog-core, thiserror
// ============================================================================

#![forbid(unsafe_code)]

//! ## Overview
//! Every operation here checks availability before mutating anything, so a
//! failed reroll never leaves a seed in an inconsistent state (I1, I2).

use std::slice;
use std::sync::Arc;

use thiserror::Error;

use speedfog_core::clock::Clock;
use speedfog_core::entities::Race;
use speedfog_core::entities::RaceStatus;
use speedfog_core::entities::Seed;
use speedfog_core::entities::SeedStatus;
use speedfog_core::error::StoreError;
use speedfog_core::identifiers::RaceId;
use speedfog_core::store::RaceStore;
use speedfog_core::store::SeedStore;
use speedfog_core::store::Store;

/// Errors raised by seed lifecycle operations.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The race does not exist.
    #[error("race not found")]
    RaceNotFound,
    /// The race's currently assigned seed does not exist (data corruption).
    #[error("assigned seed not found")]
    SeedNotFound,
    /// No AVAILABLE seed exists in the requested pool (excluding, for
    /// reroll, the currently assigned one).
    #[error("no available seed in pool")]
    NoAvailableSeed,
    /// `reroll` was attempted outside SETUP.
    #[error("race is not in setup")]
    NotInSetup,
    /// `reroll` was attempted after seeds were released to participants.
    #[error("seeds already released")]
    SeedsAlreadyReleased,
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Seed lifecycle operations atop a shared `Store`.
pub struct SeedService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SeedService {
    /// Builds a service over `store`, using `clock` for release timestamps.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Picks a uniformly random AVAILABLE seed in `pool`, marks it CONSUMED,
    /// and assigns it to `race_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::NoAvailableSeed`] if the pool is exhausted, or
    /// [`SeedError::Store`] on persistence failure.
    pub fn assign(&self, race_id: &RaceId, pool: &str) -> Result<Seed, SeedError> {
        let seed = self.store.pick_available(pool, &[])?.ok_or(SeedError::NoAvailableSeed)?;
        self.store.set_seed_status(&seed.id, SeedStatus::Consumed)?;
        self.store.set_race_seed(race_id, &seed.id)?;
        self.store.load_seed(&seed.id)?.ok_or(SeedError::SeedNotFound)
    }

    /// Rerolls `race_id`'s seed within the same pool, excluding the current
    /// one. Valid only in SETUP with seeds not yet released (spec.md section
    /// 4.8, 9).
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::NotInSetup`], [`SeedError::SeedsAlreadyReleased`],
    /// or [`SeedError::NoAvailableSeed`] if no replacement exists — the
    /// current seed is left untouched in that case (I1, I2).
    pub fn reroll(&self, race_id: &RaceId) -> Result<Seed, SeedError> {
        let race = self.store.load_race(race_id)?.ok_or(SeedError::RaceNotFound)?;
        if race.status != RaceStatus::Setup {
            return Err(SeedError::NotInSetup);
        }
        if race.seeds_released_at.is_some() {
            return Err(SeedError::SeedsAlreadyReleased);
        }
        let current = self.store.load_seed(&race.seed_id)?.ok_or(SeedError::SeedNotFound)?;
        let replacement = self
            .store
            .pick_available(&current.pool, slice::from_ref(&current.id))?
            .ok_or(SeedError::NoAvailableSeed)?;

        if current.status != SeedStatus::Discarded {
            self.store.set_seed_status(&current.id, SeedStatus::Available)?;
        }
        self.store.set_seed_status(&replacement.id, SeedStatus::Consumed)?;
        let updated_race = self.store.set_race_seed(race_id, &replacement.id)?;
        self.store.load_seed(&updated_race.seed_id)?.ok_or(SeedError::SeedNotFound)
    }

    /// Retires every AVAILABLE or CONSUMED seed in `pool` in one atomic
    /// statement (I2).
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Store`] on persistence failure.
    pub fn discard_pool(&self, pool: &str) -> Result<u64, SeedError> {
        Ok(self.store.discard_pool(pool)?)
    }

    /// Marks a race's seed as released to participants (sticky, I8).
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Store`] on persistence failure.
    pub fn release(&self, race_id: &RaceId) -> Result<Race, SeedError> {
        Ok(self.store.release_seed(race_id, self.clock.now())?)
    }
}

// crates/speedfog-core/src/store_memory.rs
// ============================================================================
// Module: SpeedFog In-Memory Store
// Description: A `Mutex`-guarded in-memory `RaceStore`/`SeedStore` for tests
// and examples.
// Purpose: Exercise store invariants without a database dependency.
// Dependencies: std::sync::Mutex, rand
// ============================================================================

//! ## Overview
//! Lock order is always races before participants before seeds, matching the
//! room-before-connection hierarchy the room registry uses (spec.md
//! section 5) — never acquired in the opposite order anywhere in this file.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use time::OffsetDateTime;

use crate::entities::Participant;
use crate::entities::ParticipantStatus;
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
use crate::store::NewRace;
use crate::store::RaceStore;
use crate::store::RaceTransition;
use crate::store::SeedStore;
use crate::store::TransitionOutcome;

/// In-memory store backing tests and local examples.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    races: Mutex<BTreeMap<RaceId, Race>>,
    participants: Mutex<BTreeMap<ParticipantId, Participant>>,
    seeds: Mutex<BTreeMap<SeedId, Seed>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_races(&self) -> std::sync::MutexGuard<'_, BTreeMap<RaceId, Race>> {
        #[allow(clippy::unwrap_used, reason = "poisoning indicates a prior panic; unrecoverable")]
        self.races.lock().unwrap()
    }

    fn lock_participants(&self) -> std::sync::MutexGuard<'_, BTreeMap<ParticipantId, Participant>> {
        #[allow(clippy::unwrap_used, reason = "poisoning indicates a prior panic; unrecoverable")]
        self.participants.lock().unwrap()
    }

    fn lock_seeds(&self) -> std::sync::MutexGuard<'_, BTreeMap<SeedId, Seed>> {
        #[allow(clippy::unwrap_used, reason = "poisoning indicates a prior panic; unrecoverable")]
        self.seeds.lock().unwrap()
    }
}

impl RaceStore for InMemoryStore {
    fn create_race(&self, new: NewRace) -> Result<Race, StoreError> {
        let race = Race {
            id: RaceId::new(),
            name: new.name,
            organizer_user_id: new.organizer_user_id,
            seed_id: new.seed_id,
            status: RaceStatus::Setup,
            version: 0,
            started_at: None,
            seeds_released_at: None,
            is_public: new.is_public,
            scheduled_at: new.scheduled_at,
            config: new.config,
            next_arrival_order: 0,
        };
        self.lock_races().insert(race.id.clone(), race.clone());
        Ok(race)
    }

    fn load_race(&self, id: &RaceId) -> Result<Option<Race>, StoreError> {
        Ok(self.lock_races().get(id).cloned())
    }

    fn list_races_by_status(&self, status: RaceStatus) -> Result<Vec<Race>, StoreError> {
        Ok(self.lock_races().values().filter(|race| race.status == status).cloned().collect())
    }

    fn transition_race(
        &self,
        id: &RaceId,
        expected_version: u64,
        transition: RaceTransition,
    ) -> Result<TransitionOutcome<Race>, StoreError> {
        let mut races = self.lock_races();
        let Some(race) = races.get_mut(id) else {
            return Err(StoreError::NotFound(format!("race {id}")));
        };
        if race.version != expected_version || !transition.allowed_from().contains(&race.status) {
            return Ok(TransitionOutcome::Conflict);
        }
        race.status = transition.target();
        race.version += 1;
        match transition {
            RaceTransition::Start { started_at } => race.started_at = Some(started_at),
            RaceTransition::Finish => {}
            RaceTransition::Reset => race.started_at = None,
        }
        let snapshot = race.clone();
        drop(races);
        if matches!(transition, RaceTransition::Reset) {
            self.reset_participants(id)?;
        }
        Ok(TransitionOutcome::Applied(snapshot))
    }

    fn release_seed(&self, id: &RaceId, at: OffsetDateTime) -> Result<Race, StoreError> {
        let mut races = self.lock_races();
        let race = races.get_mut(id).ok_or_else(|| StoreError::NotFound(format!("race {id}")))?;
        if race.seeds_released_at.is_none() {
            race.seeds_released_at = Some(at);
        }
        Ok(race.clone())
    }

    fn set_race_seed(&self, id: &RaceId, seed_id: &SeedId) -> Result<Race, StoreError> {
        let mut races = self.lock_races();
        let race = races.get_mut(id).ok_or_else(|| StoreError::NotFound(format!("race {id}")))?;
        race.seed_id = seed_id.clone();
        Ok(race.clone())
    }

    fn register_participant(
        &self,
        race_id: &RaceId,
        user_id: &UserId,
    ) -> Result<Participant, StoreError> {
        let arrival_order = {
            let mut races = self.lock_races();
            let race =
                races.get_mut(race_id).ok_or_else(|| StoreError::NotFound(format!("race {race_id}")))?;
            let order = race.next_arrival_order;
            race.next_arrival_order += 1;
            order
        };
        let color_index = {
            let participants = self.lock_participants();
            u32::try_from(
                participants.values().filter(|p| p.race_id == *race_id).count(),
            )
            .unwrap_or(u32::MAX)
        };
        let participant = Participant {
            id: ParticipantId::new(),
            race_id: race_id.clone(),
            user_id: user_id.clone(),
            mod_token: ModToken::new(),
            status: ParticipantStatus::Registered,
            current_zone: None,
            current_layer: 0,
            zone_history: Vec::new(),
            igt_ms: 0,
            death_count: 0,
            finished_at: None,
            last_igt_change_at: None,
            color_index,
            arrival_order,
        };
        self.lock_participants().insert(participant.id.clone(), participant.clone());
        Ok(participant)
    }

    fn load_participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        Ok(self.lock_participants().get(id).cloned())
    }

    fn load_participant_by_token(
        &self,
        race_id: &RaceId,
        token: &ModToken,
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self
            .lock_participants()
            .values()
            .find(|p| p.race_id == *race_id && p.mod_token == *token)
            .cloned())
    }

    fn list_participants(&self, race_id: &RaceId) -> Result<Vec<Participant>, StoreError> {
        Ok(self
            .lock_participants()
            .values()
            .filter(|p| p.race_id == *race_id)
            .cloned()
            .collect())
    }

    fn save_participant(&self, participant: Participant) -> Result<Participant, StoreError> {
        let mut participants = self.lock_participants();
        let Some(existing) = participants.get(&participant.id) else {
            participants.insert(participant.id.clone(), participant.clone());
            return Ok(participant);
        };
        if existing.status.is_terminal() {
            return Ok(existing.clone());
        }
        let mut next = participant;
        next.current_layer = next.current_layer.max(existing.current_layer);
        participants.insert(next.id.clone(), next.clone());
        Ok(next)
    }

    fn reset_participants(&self, race_id: &RaceId) -> Result<(), StoreError> {
        let mut participants = self.lock_participants();
        for participant in participants.values_mut() {
            if participant.race_id != *race_id {
                continue;
            }
            participant.status = ParticipantStatus::Registered;
            participant.current_zone = None;
            participant.current_layer = 0;
            participant.igt_ms = 0;
            participant.death_count = 0;
            participant.zone_history.clear();
            participant.finished_at = None;
            participant.last_igt_change_at = None;
        }
        Ok(())
    }
}

impl SeedStore for InMemoryStore {
    fn put_seed(&self, seed: Seed) -> Result<Seed, StoreError> {
        self.lock_seeds().insert(seed.id.clone(), seed.clone());
        Ok(seed)
    }

    fn load_seed(&self, id: &SeedId) -> Result<Option<Seed>, StoreError> {
        Ok(self.lock_seeds().get(id).cloned())
    }

    fn pick_available(&self, pool: &str, exclude: &[SeedId]) -> Result<Option<Seed>, StoreError> {
        let seeds = self.lock_seeds();
        let mut candidates: Vec<&Seed> = seeds
            .values()
            .filter(|s| s.pool == pool && s.status == SeedStatus::Available && !exclude.contains(&s.id))
            .collect();
        candidates.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(candidates.choose(&mut rand::thread_rng()).map(|s| (*s).clone()))
    }

    fn set_seed_status(&self, id: &SeedId, status: SeedStatus) -> Result<Seed, StoreError> {
        let mut seeds = self.lock_seeds();
        let seed = seeds.get_mut(id).ok_or_else(|| StoreError::NotFound(format!("seed {id}")))?;
        seed.status = status;
        Ok(seed.clone())
    }

    fn discard_pool(&self, pool: &str) -> Result<u64, StoreError> {
        let mut seeds = self.lock_seeds();
        let mut count = 0_u64;
        for seed in seeds.values_mut() {
            if seed.pool == pool && matches!(seed.status, SeedStatus::Available | SeedStatus::Consumed) {
                seed.status = SeedStatus::Discarded;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use crate::graph::SeedGraph;
    use crate::identifiers::FlagId;
    use crate::identifiers::NodeId;
    use crate::identifiers::SeedId;

    fn sample_seed(pool: &str) -> Seed {
        Seed {
            id: SeedId::new(),
            pool: pool.to_string(),
            numeric_id: 1,
            graph: SeedGraph {
                start_node: NodeId::from_raw("n_s"),
                nodes: std::collections::BTreeMap::new(),
                event_map: std::collections::BTreeMap::new(),
                finish_event: FlagId::new(9999),
                total_layers: 1,
                total_nodes: 1,
                total_paths: 1,
            },
            status: SeedStatus::Available,
            file_path: "seeds/s1.zip".to_string(),
        }
    }

    #[test]
    fn transition_race_rejects_version_mismatch() {
        let store = InMemoryStore::new();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let outcome = store
            .transition_race(
                &race.id,
                race.version + 1,
                RaceTransition::Start { started_at: OffsetDateTime::now_utc() },
            )
            .unwrap();
        assert!(outcome.is_conflict());
    }

    #[test]
    fn transition_race_reset_clears_participants_but_keeps_identity() {
        let store = InMemoryStore::new();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let user = UserId::new();
        let participant = store.register_participant(&race.id, &user).unwrap();
        let mut mutated = participant.clone();
        mutated.status = ParticipantStatus::Playing;
        mutated.current_layer = 2;
        mutated.igt_ms = 5000;
        store.save_participant(mutated).unwrap();

        let started = store
            .transition_race(&race.id, 0, RaceTransition::Start { started_at: OffsetDateTime::now_utc() })
            .unwrap()
            .applied()
            .unwrap();
        let reset = store.transition_race(&race.id, started.version, RaceTransition::Reset).unwrap();
        assert!(matches!(reset, TransitionOutcome::Applied(_)));

        let after = store.load_participant(&participant.id).unwrap().unwrap();
        assert_eq!(after.id, participant.id);
        assert_eq!(after.status, ParticipantStatus::Registered);
        assert_eq!(after.current_layer, 0);
        assert_eq!(after.igt_ms, 0);
    }

    #[test]
    fn save_participant_rejects_mutation_of_terminal_row() {
        let store = InMemoryStore::new();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let participant = store.register_participant(&race.id, &UserId::new()).unwrap();
        let mut finished = participant.clone();
        finished.status = ParticipantStatus::Finished;
        let saved = store.save_participant(finished).unwrap();
        assert_eq!(saved.status, ParticipantStatus::Finished);

        let mut sneaky = saved.clone();
        sneaky.status = ParticipantStatus::Playing;
        sneaky.igt_ms = 99999;
        let after = store.save_participant(sneaky).unwrap();
        assert_eq!(after.status, ParticipantStatus::Finished);
        assert_eq!(after.igt_ms, saved.igt_ms);
    }

    #[test]
    fn save_participant_never_lowers_layer() {
        let store = InMemoryStore::new();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let participant = store.register_participant(&race.id, &UserId::new()).unwrap();
        let mut at_layer_two = participant.clone();
        at_layer_two.current_layer = 2;
        store.save_participant(at_layer_two).unwrap();

        let mut regress = participant;
        regress.current_layer = 1;
        let after = store.save_participant(regress).unwrap();
        assert_eq!(after.current_layer, 2);
    }

    #[test]
    fn list_races_by_status_only_returns_matching_races() {
        let store = InMemoryStore::new();
        let running = store
            .create_race(NewRace {
                name: "running".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        store
            .create_race(NewRace {
                name: "setup".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        store.transition_race(&running.id, 0, RaceTransition::Start { started_at: OffsetDateTime::now_utc() }).unwrap();

        let running_races = store.list_races_by_status(RaceStatus::Running).unwrap();
        assert_eq!(running_races.len(), 1);
        assert_eq!(running_races[0].id, running.id);
    }

    #[test]
    fn discard_pool_is_terminal_for_available_and_consumed() {
        let store = InMemoryStore::new();
        let seed = store.put_seed(sample_seed("pool-a")).unwrap();
        store.set_seed_status(&seed.id, SeedStatus::Consumed).unwrap();
        let affected = store.discard_pool("pool-a").unwrap();
        assert_eq!(affected, 1);
        let after = store.load_seed(&seed.id).unwrap().unwrap();
        assert_eq!(after.status, SeedStatus::Discarded);

        // A later reroll must never resurrect it.
        let picked = store.pick_available("pool-a", &[]).unwrap();
        assert!(picked.is_none());
    }
}

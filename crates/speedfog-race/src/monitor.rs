// crates/speedfog-race/src/monitor.rs
// ============================================================================
// Module: SpeedFog Background Monitors
// Description: The periodic inactivity/no-show sweep (spec.md section 4.10,
// C10).
// Purpose: Abandon participants who have gone silent and drive every
// RUNNING race through auto-finish whenever that sweep leaves none active.
// Dependencies: speedfog-core, tokio, tracing
// ============================================================================

//! ## Overview
//! A single loop, not two: every 60s it sweeps every RUNNING race once,
//! applying both the inactivity and no-show rules, then asks the controller
//! to auto-finish check. Terminal participant states are sticky (I5), so
//! running the sweep twice in a row is a no-op the second time (P9).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::Duration as TimeDuration;
use tracing::debug;
use tracing::warn;

use speedfog_core::clock::Clock;
use speedfog_core::entities::ParticipantStatus;
use speedfog_core::entities::RaceStatus;
use speedfog_core::store::RaceStore;
use speedfog_core::store::Store;

use crate::controller::RaceController;
use crate::metrics::RaceMetrics;

/// Thresholds and cadence for the background sweep.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// How often the sweep runs.
    pub sweep_interval: StdDuration,
    /// A PLAYING participant idle longer than this is abandoned.
    pub inactivity_threshold: TimeDuration,
    /// A REGISTERED/READY participant in a race running longer than this is
    /// abandoned as a no-show.
    pub no_show_threshold: TimeDuration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: StdDuration::from_secs(60),
            inactivity_threshold: TimeDuration::minutes(15),
            no_show_threshold: TimeDuration::minutes(15),
        }
    }
}

/// Runs one sweep over every RUNNING race: abandons idle/no-show
/// participants, then gives each affected race a chance to auto-finish.
///
/// # Errors
///
/// Returns a [`crate::controller::ControllerError`] only if a store read
/// fails outright; individual auto-finish conflicts are swallowed (a
/// concurrent sequence already handled that race, per spec.md section
/// 4.9's "silent no-op on conflict").
pub async fn run_sweep_once(
    store: &dyn Store,
    controller: &RaceController,
    clock: &dyn Clock,
    metrics: &dyn RaceMetrics,
    config: &MonitorConfig,
) -> Result<(), speedfog_core::error::StoreError> {
    let started = std::time::Instant::now();
    let now = clock.now();
    let running = store.list_races_by_status(RaceStatus::Running)?;

    for race in running {
        let participants = store.list_participants(&race.id)?;
        let mut any_abandoned = false;

        for participant in participants {
            if participant.status.is_terminal() {
                continue;
            }
            let should_abandon = match participant.status {
                ParticipantStatus::Playing => participant
                    .last_igt_change_at
                    .is_some_and(|last_change| now - last_change > config.inactivity_threshold),
                ParticipantStatus::Registered | ParticipantStatus::Ready => race
                    .started_at
                    .is_some_and(|started_at| now - started_at > config.no_show_threshold),
                ParticipantStatus::Finished | ParticipantStatus::Abandoned => false,
            };
            if !should_abandon {
                continue;
            }
            let mut abandoned = participant;
            abandoned.status = ParticipantStatus::Abandoned;
            store.save_participant(abandoned)?;
            any_abandoned = true;
        }

        if any_abandoned {
            debug!(race_id = %race.id, "monitor abandoned one or more participants");
            if let Err(err) = controller.auto_finish_check(&race.id).await {
                warn!(race_id = %race.id, error = %err, "auto-finish check failed during sweep");
            }
        }
    }

    metrics.monitor_sweep_duration(started.elapsed());
    Ok(())
}

/// Runs [`run_sweep_once`] on `config.sweep_interval`, forever, until
/// `shutdown` is notified. Intended to be spawned once per process
/// (spec.md section 5's "small pool of background monitors" is, in
/// practice, this one task).
pub async fn spawn_monitor_loop(
    store: Arc<dyn Store>,
    controller: Arc<RaceController>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn RaceMetrics>,
    config: MonitorConfig,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) =
                    run_sweep_once(store.as_ref(), controller.as_ref(), clock.as_ref(), metrics.as_ref(), &config).await
                {
                    warn!(error = %err, "monitor sweep failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("monitor loop shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    use speedfog_core::clock::FixedClock;
    use speedfog_core::entities::Participant;
    use speedfog_core::graph::SeedGraph;
    use speedfog_core::identifiers::FlagId;
    use speedfog_core::identifiers::NodeId;
    use speedfog_core::identifiers::SeedId;
    use speedfog_core::identifiers::UserId;
    use speedfog_core::store::NewRace;
    use speedfog_core::store::RaceTransition;
    use speedfog_core::store_memory::InMemoryStore;
    use speedfog_rooms::RoomRegistry;

    use crate::metrics::NoopMetrics;
    use crate::notify::NoopPublisher;

    fn sample_seed() -> speedfog_core::entities::Seed {
        speedfog_core::entities::Seed {
            id: SeedId::new(),
            pool: "weekly".to_string(),
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
            status: speedfog_core::entities::SeedStatus::Consumed,
            file_path: "seeds/s.zip".to_string(),
        }
    }

    fn harness() -> (Arc<InMemoryStore>, Arc<RaceController>, Arc<FixedClock>) {
        let store = Arc::new(InMemoryStore::new());
        let seed = store.put_seed(sample_seed()).unwrap();
        let clock =
            Arc::new(FixedClock::new(time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()));
        let rooms = Arc::new(RoomRegistry::new(std::time::Duration::from_secs(5)));
        let controller = Arc::new(RaceController::new(
            store.clone(),
            rooms,
            clock.clone(),
            Arc::new(NoopPublisher),
            Arc::new(NoopMetrics),
        ));
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: seed.id,
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        store.transition_race(&race.id, 0, RaceTransition::Start { started_at: clock.now() }).unwrap();
        (store, controller, clock)
    }

    fn register(store: &InMemoryStore, race_id: &speedfog_core::identifiers::RaceId) -> Participant {
        store.register_participant(race_id, &UserId::new()).unwrap()
    }

    #[tokio::test]
    async fn inactivity_sweep_abandons_idle_playing_participant() {
        let (store, controller, clock) = harness();
        let race = store.list_races_by_status(RaceStatus::Running).unwrap().remove(0);
        let mut participant = register(&store, &race.id);
        participant.status = ParticipantStatus::Playing;
        participant.last_igt_change_at = Some(clock.now());
        store.save_participant(participant.clone()).unwrap();

        clock.advance(TimeDuration::minutes(16));
        let config = MonitorConfig::default();
        run_sweep_once(store.as_ref(), controller.as_ref(), clock.as_ref(), &NoopMetrics, &config)
            .await
            .unwrap();

        let after = store.load_participant(&participant.id).unwrap().unwrap();
        assert_eq!(after.status, ParticipantStatus::Abandoned);
    }

    #[tokio::test]
    async fn no_show_sweep_abandons_registered_participant_after_threshold() {
        let (store, controller, clock) = harness();
        let race = store.list_races_by_status(RaceStatus::Running).unwrap().remove(0);
        let participant = register(&store, &race.id);

        clock.advance(TimeDuration::minutes(16));
        let config = MonitorConfig::default();
        run_sweep_once(store.as_ref(), controller.as_ref(), clock.as_ref(), &NoopMetrics, &config)
            .await
            .unwrap();

        let after = store.load_participant(&participant.id).unwrap().unwrap();
        assert_eq!(after.status, ParticipantStatus::Abandoned);
    }

    #[tokio::test]
    async fn sweep_leaves_active_participants_untouched() {
        let (store, controller, clock) = harness();
        let race = store.list_races_by_status(RaceStatus::Running).unwrap().remove(0);
        let mut participant = register(&store, &race.id);
        participant.status = ParticipantStatus::Playing;
        participant.last_igt_change_at = Some(clock.now());
        store.save_participant(participant.clone()).unwrap();

        clock.advance(TimeDuration::minutes(5));
        let config = MonitorConfig::default();
        run_sweep_once(store.as_ref(), controller.as_ref(), clock.as_ref(), &NoopMetrics, &config)
            .await
            .unwrap();

        let after = store.load_participant(&participant.id).unwrap().unwrap();
        assert_eq!(after.status, ParticipantStatus::Playing);
    }

    #[tokio::test]
    async fn sweep_is_idempotent_when_run_twice() {
        let (store, controller, clock) = harness();
        let race = store.list_races_by_status(RaceStatus::Running).unwrap().remove(0);
        let participant = register(&store, &race.id);

        clock.advance(TimeDuration::minutes(16));
        let config = MonitorConfig::default();
        run_sweep_once(store.as_ref(), controller.as_ref(), clock.as_ref(), &NoopMetrics, &config)
            .await
            .unwrap();
        run_sweep_once(store.as_ref(), controller.as_ref(), clock.as_ref(), &NoopMetrics, &config)
            .await
            .unwrap();

        let after = store.load_participant(&participant.id).unwrap().unwrap();
        assert_eq!(after.status, ParticipantStatus::Abandoned);
    }

    #[tokio::test]
    async fn sweep_auto_finishes_race_when_last_participant_abandoned() {
        let (store, controller, clock) = harness();
        let race = store.list_races_by_status(RaceStatus::Running).unwrap().remove(0);
        let mut participant = register(&store, &race.id);
        participant.status = ParticipantStatus::Playing;
        participant.last_igt_change_at = Some(clock.now());
        store.save_participant(participant).unwrap();

        clock.advance(TimeDuration::minutes(16));
        let config = MonitorConfig::default();
        run_sweep_once(store.as_ref(), controller.as_ref(), clock.as_ref(), &NoopMetrics, &config)
            .await
            .unwrap();

        let after_race = store.load_race(&race.id).unwrap().unwrap();
        assert_eq!(after_race.status, RaceStatus::Finished);
    }
}

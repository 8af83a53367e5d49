// system-tests/tests/suites/inactivity_abandon.rs
// ============================================================================
// Module: Inactivity Abandon Suite
// Description: End-to-end coverage of spec.md section 8 scenario S5.
// Purpose: Assert the monitor sweep abandons an inactive participant and
// auto-finishes a race left with no other non-terminal participant (C10).
// Dependencies: helpers
// ============================================================================

use serde_json::json;
use speedfog_core::entities::ParticipantStatus;
use speedfog_core::entities::RaceStatus;
use speedfog_core::store::RaceStore;
use speedfog_race::MonitorConfig;

use crate::helpers::fixtures;
use crate::helpers::harness;
use crate::helpers::ws_client::TestSocket;

#[tokio::test]
async fn monitor_abandons_inactive_participant_and_auto_finishes() {
    let server = harness::spawn_server().await;
    let (race, participants) = fixtures::race_with_participants(&server.store, 1);
    let p1 = &participants[0];
    server.controller.start(&race.id, race.version).await.expect("start race");

    let mut sock = TestSocket::connect(&server.mod_ws_url(race.id.as_str())).await;
    sock.send_json(&json!({"type": "auth", "mod_token": p1.mod_token.as_str()})).await;
    sock.recv_until_type("auth_ok").await;
    sock.send_json(&json!({"type": "ready"})).await;
    sock.send_json(&json!({"type": "status_update", "igt_ms": 50000, "death_count": 0})).await;
    sock.recv_until_type("leaderboard_update").await;

    server.clock.advance(time::Duration::minutes(15) + time::Duration::seconds(1));

    let config = MonitorConfig::default();
    speedfog_race::run_sweep_once(
        server.store.as_ref(),
        server.controller.as_ref(),
        server.clock.as_ref(),
        &speedfog_race::NoopMetrics,
        &config,
    )
    .await
    .expect("sweep");

    let stored = server.store.load_participant(&p1.id).expect("load participant").expect("participant exists");
    assert_eq!(stored.status, ParticipantStatus::Abandoned);

    let stored_race = server.store.load_race(&race.id).expect("load race").expect("race exists");
    assert_eq!(stored_race.status, RaceStatus::Finished, "last non-terminal participant abandoned => auto-finish");

    // Running the sweep again must not double-finish the race (P4, P9).
    speedfog_race::run_sweep_once(
        server.store.as_ref(),
        server.controller.as_ref(),
        server.clock.as_ref(),
        &speedfog_race::NoopMetrics,
        &config,
    )
    .await
    .expect("second sweep");
    let stored_again = server.store.load_race(&race.id).expect("load race").expect("race exists");
    assert_eq!(stored_again.version, stored_race.version, "idempotent sweep leaves race version unchanged");
}

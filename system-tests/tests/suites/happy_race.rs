// system-tests/tests/suites/happy_race.rs
// ============================================================================
// Module: Happy Race Suite
// Description: End-to-end coverage of spec.md section 8 scenario S1.
// Purpose: Exercise the full mod protocol loop (auth -> ready -> status
// update -> event flags) against a live router and assert the auto-finish
// and leaderboard-ordering invariants (P1, P2, P4, P6, P7).
// Dependencies: helpers
// ============================================================================

use serde_json::json;
use speedfog_core::entities::ParticipantStatus;
use speedfog_core::store::RaceStore;

use crate::helpers::fixtures;
use crate::helpers::harness;
use crate::helpers::ws_client::TestSocket;

#[tokio::test]
async fn happy_race_auto_finishes_with_correct_leaderboard_order() {
    let server = harness::spawn_server().await;
    let (race, participants) = fixtures::race_with_participants(&server.store, 2);
    let p1 = &participants[0];
    let p2 = &participants[1];

    server.controller.start(&race.id, race.version).await.expect("start race");

    let mut p1_sock = TestSocket::connect(&server.mod_ws_url(race.id.as_str())).await;
    p1_sock.send_json(&json!({"type": "auth", "mod_token": p1.mod_token.as_str()})).await;
    let auth_ok = p1_sock.recv_until_type("auth_ok").await;
    assert_eq!(auth_ok["participant_id"], json!(p1.id.as_str()));

    let mut p2_sock = TestSocket::connect(&server.mod_ws_url(race.id.as_str())).await;
    p2_sock.send_json(&json!({"type": "auth", "mod_token": p2.mod_token.as_str()})).await;
    p2_sock.recv_until_type("auth_ok").await;

    // Ready -> Playing seeds zone_history with the start node at igt_ms=0 (P6).
    p1_sock.send_json(&json!({"type": "ready"})).await;
    p1_sock.send_json(&json!({"type": "status_update", "igt_ms": 0, "death_count": 0})).await;
    p2_sock.send_json(&json!({"type": "ready"})).await;
    p2_sock.send_json(&json!({"type": "status_update", "igt_ms": 0, "death_count": 0})).await;

    p1_sock.send_json(&json!({"type": "event_flag", "flag_id": 1001, "igt_ms": 30000})).await;
    let lb = p1_sock.recv_until_type("leaderboard_update").await;
    let p1_row = find_row(&lb, p1.id.as_str());
    assert_eq!(p1_row["current_zone"], json!("n_a"));
    assert_eq!(p1_row["current_layer"], json!(1));

    p2_sock.send_json(&json!({"type": "event_flag", "flag_id": 1001, "igt_ms": 40000})).await;
    p2_sock.recv_until_type("leaderboard_update").await;
    p2_sock.send_json(&json!({"type": "event_flag", "flag_id": 1010, "igt_ms": 90000})).await;
    p2_sock.recv_until_type("leaderboard_update").await;

    p1_sock.send_json(&json!({"type": "event_flag", "flag_id": 1010, "igt_ms": 100000})).await;

    // The race auto-finishes once both participants are terminal; every
    // connected mod observes exactly one terminal status change (P4).
    let status_change = p1_sock.recv_until_type("race_status_change").await;
    assert_eq!(status_change["status"], json!("finished"));

    let final_lb = p1_sock.recv_until_type("leaderboard_update").await;
    let participants_json = final_lb["participants"].as_array().expect("participants array");
    let order: Vec<&str> = participants_json.iter().map(|row| row["id"].as_str().expect("id")).collect();
    assert_eq!(order, vec![p2.id.as_str(), p1.id.as_str()], "P2 finished first, so leads the leaderboard");

    let stored_p1 = server.store.load_participant(&p1.id).expect("load p1").expect("p1 exists");
    let stored_p2 = server.store.load_participant(&p2.id).expect("load p2").expect("p2 exists");
    assert_eq!(stored_p1.status, ParticipantStatus::Finished);
    assert_eq!(stored_p2.status, ParticipantStatus::Finished);
    assert_eq!(stored_p1.current_layer, 3);
    assert_eq!(stored_p2.current_layer, 3);

    let stored_race = server.store.load_race(&race.id).expect("load race").expect("race exists");
    assert_eq!(stored_race.status, speedfog_core::entities::RaceStatus::Finished);
}

fn find_row<'a>(leaderboard: &'a serde_json::Value, participant_id: &str) -> &'a serde_json::Value {
    leaderboard["participants"]
        .as_array()
        .expect("participants array")
        .iter()
        .find(|row| row["id"] == json!(participant_id))
        .expect("participant present in leaderboard")
}

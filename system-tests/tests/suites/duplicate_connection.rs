// system-tests/tests/suites/duplicate_connection.rs
// ============================================================================
// Module: Duplicate Mod Connection Suite
// Description: End-to-end coverage of spec.md section 8 scenario S3.
// Purpose: Assert the room rejects a second live connection for the same
// participant (P5) without disturbing the first.
// Dependencies: helpers
// ============================================================================

use serde_json::json;

use crate::helpers::fixtures;
use crate::helpers::harness;
use crate::helpers::ws_client::TestSocket;

#[tokio::test]
async fn second_auth_with_same_token_is_rejected() {
    let server = harness::spawn_server().await;
    let (race, participants) = fixtures::race_with_participants(&server.store, 1);
    let p1 = &participants[0];
    server.controller.start(&race.id, race.version).await.expect("start race");

    let mut first = TestSocket::connect(&server.mod_ws_url(race.id.as_str())).await;
    first.send_json(&json!({"type": "auth", "mod_token": p1.mod_token.as_str()})).await;
    first.recv_until_type("auth_ok").await;

    let mut second = TestSocket::connect(&server.mod_ws_url(race.id.as_str())).await;
    second.send_json(&json!({"type": "auth", "mod_token": p1.mod_token.as_str()})).await;
    let close = second.expect_close().await;
    assert_eq!(close.map(|frame| u16::from(frame.code)), Some(4003u16), "duplicate connection must close with 4003");

    // The first connection is unaffected: it can still send and receive.
    first.send_json(&json!({"type": "ready"})).await;
    let leaderboard = first.recv_until_type("leaderboard_update").await;
    let rows = leaderboard["participants"].as_array().expect("participants array");
    assert_eq!(rows.len(), 1);
}

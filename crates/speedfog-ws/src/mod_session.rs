// crates/speedfog-ws/src/mod_session.rs
// ============================================================================
// Module: SpeedFog Mod Session Handler
// Description: Per-connection protocol driver for `/ws/mod/{race_id}`
// (spec.md section 4.6, C6): OPEN -> AUTHENTICATED -> LOOP -> CLOSED.
// Purpose: The only code that mutates a participant in response to game-mod
// traffic; everything it does is one load -> mutate -> save per message,
// followed by whatever broadcast spec.md section 4.6 documents for that
// message (section 5: nothing suspends between load and save).
// Dependencies: axum, speedfog-core, speedfog-rooms, speedfog-race,
// speedfog-resolve
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use futures::stream::SplitStream;
use futures::StreamExt;
use tracing::warn;

use speedfog_core::entities::Participant;
use speedfog_core::entities::ParticipantStatus;
use speedfog_core::entities::RaceStatus;
use speedfog_core::entities::ZoneHistoryEntry;
use speedfog_core::graph::Exit;
use speedfog_core::graph::SeedGraph;
use speedfog_core::identifiers::FlagId;
use speedfog_core::identifiers::NodeId;
use speedfog_core::identifiers::ParticipantId;
use speedfog_core::identifiers::RaceId;
use speedfog_core::store::RaceStore;
use speedfog_core::store::SeedStore;
use speedfog_core::wire::ModInbound;
use speedfog_core::wire::ModOutbound;
use speedfog_core::wire::ModSeedView;
use speedfog_core::wire::RaceSummary;
use speedfog_core::wire::SpectatorOutbound;
use speedfog_race::leaderboard_views;
use speedfog_race::solo_view;
use speedfog_resolve::resolve_event_flag;
use speedfog_resolve::resolve_zone_query;
use speedfog_resolve::FlagResolution;
use speedfog_resolve::ZoneQueryHint;
use speedfog_rooms::Room;
use speedfog_rooms::RoomError;

use crate::conn::AxumModConn;
use crate::sockutil::close_with;
use crate::state::WsState;

/// Drives one mod WebSocket connection through its whole lifecycle.
pub async fn handle_mod_connection(socket: WebSocket, state: Arc<WsState>, race_id: RaceId) {
    let (sink, stream) = socket.split();

    let (participant, sink, mut stream) = match authenticate(sink, stream, &state, &race_id).await {
        Ok(authenticated) => authenticated,
        Err(()) => return,
    };

    let conn = AxumModConn::new(participant.id.clone(), sink);
    let room = state.rooms.get_or_create(&race_id).await;

    if room.has_mod(&participant.id).await {
        conn.close(4003).await;
        return;
    }

    if let Err(err) = send_initial_snapshot(&state, &conn, &race_id, &participant).await {
        warn!(race_id = %race_id, participant_id = %participant.id, error = %err, "failed to send auth_ok");
        return;
    }

    if let Err(RoomError::AlreadyConnected) =
        room.connect_mod(participant.id.clone(), Arc::clone(&conn) as Arc<dyn speedfog_rooms::ModConn>).await
    {
        conn.close(4003).await;
        return;
    }
    broadcast_mod_leaderboard(&state, &room, &race_id).await;

    let heartbeat = spawn_heartbeat(Arc::clone(&conn), state.timeouts.heartbeat_interval);

    run_loop(&mut stream, &conn, &room, &state, &race_id, &participant.id).await;

    heartbeat.abort();
    room.disconnect_mod(&participant.id).await;
    state.rooms.reap_if_empty(&race_id).await;
}

type ModSplitSink = futures::stream::SplitSink<WebSocket, Message>;

async fn authenticate(
    mut sink: ModSplitSink,
    mut stream: SplitStream<WebSocket>,
    state: &WsState,
    race_id: &RaceId,
) -> Result<(Participant, ModSplitSink, SplitStream<WebSocket>), ()> {
    let first = tokio::time::timeout(state.timeouts.auth_timeout, stream.next()).await;
    let text = match first {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) | Ok(Some(Err(_))) | Ok(None) => {
            close_with(&mut sink, 4003, "first message must be auth").await;
            return Err(());
        }
        Err(_) => {
            close_with(&mut sink, 4001, "auth timeout").await;
            return Err(());
        }
    };

    let mod_token = match serde_json::from_str::<ModInbound>(&text) {
        Ok(ModInbound::Auth { mod_token }) => mod_token,
        _ => {
            close_with(&mut sink, 4003, "first message must be auth").await;
            return Err(());
        }
    };

    let participant = match state.store.load_participant_by_token(race_id, &mod_token) {
        Ok(Some(participant)) => participant,
        Ok(None) => {
            close_with(&mut sink, 4003, "unknown mod token").await;
            return Err(());
        }
        Err(err) => {
            warn!(race_id = %race_id, error = %err, "store error during mod auth");
            close_with(&mut sink, 4003, "auth failed").await;
            return Err(());
        }
    };

    let race = match state.store.load_race(race_id) {
        Ok(Some(race)) => race,
        Ok(None) | Err(_) => {
            close_with(&mut sink, 4003, "race not found").await;
            return Err(());
        }
    };
    if race.status == RaceStatus::Finished {
        close_with(&mut sink, 4003, "race finished").await;
        return Err(());
    }

    Ok((participant, sink, stream))
}

async fn send_initial_snapshot(
    state: &WsState,
    conn: &Arc<AxumModConn>,
    race_id: &RaceId,
    participant: &Participant,
) -> Result<(), serde_json::Error> {
    let race = state.store.load_race(race_id).ok().flatten();
    let seed = race.as_ref().and_then(|race| state.store.load_seed(&race.seed_id).ok().flatten());
    let participants = state.store.list_participants(race_id).unwrap_or_default();

    let (Some(race), Some(seed)) = (race, seed) else {
        return Ok(());
    };

    let seed_view = ModSeedView {
        total_layers: seed.graph.total_layers,
        event_ids: seed.graph.sorted_event_ids(),
        finish_event: seed.graph.finish_event,
    };
    let summary = RaceSummary { id: race.id.clone(), name: race.name.clone(), status: race.status };
    let auth_ok = ModOutbound::AuthOk {
        participant_id: participant.id.clone(),
        race: summary,
        seed: seed_view,
        participants: leaderboard_views(&seed.graph, participants),
    };
    let payload = serde_json::to_string(&auth_ok)?;
    let _ = conn.send(&payload).await;

    if race.status == RaceStatus::Running {
        if let Some(current_zone) = participant.current_zone.clone() {
            if let Some(update) = build_zone_update(&seed.graph, &current_zone, participant) {
                let payload = serde_json::to_string(&update)?;
                let _ = conn.send(&payload).await;
            }
        }
    }
    Ok(())
}

fn build_zone_update(graph: &SeedGraph, node_id: &NodeId, participant: &Participant) -> Option<ModOutbound> {
    let node = graph.node(node_id)?;
    let exits: Vec<Exit> = node
        .exits
        .iter()
        .map(|exit| Exit {
            text: exit.text.clone(),
            to: exit.to.clone(),
            to_name: exit.to_name.clone(),
            discovered: participant.zone_history.iter().any(|entry| entry.node_id == exit.to),
        })
        .collect();
    Some(ModOutbound::ZoneUpdate {
        node_id: node.id.clone(),
        display_name: node.display_name.clone(),
        tier: node.tier.clone(),
        exits,
    })
}

fn spawn_heartbeat(conn: Arc<AxumModConn>, interval: Duration) -> tokio::task::JoinHandle<()> {
    use speedfog_rooms::ModConn as _;
    tokio::spawn(async move {
        let Ok(payload) = serde_json::to_string(&ModOutbound::Ping {}) else { return };
        loop {
            tokio::time::sleep(interval).await;
            if conn.send(&payload).await.is_err() {
                conn.close(1011).await;
                break;
            }
        }
    })
}

async fn run_loop(
    stream: &mut SplitStream<WebSocket>,
    conn: &Arc<AxumModConn>,
    room: &Room,
    state: &WsState,
    race_id: &RaceId,
    participant_id: &ParticipantId,
) {
    use speedfog_rooms::ModConn as _;
    let mut last_status_broadcast: Option<Instant> = None;

    while let Some(frame) = stream.next().await {
        let Ok(frame) = frame else { break };
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let inbound: ModInbound = match serde_json::from_str(&text) {
            Ok(inbound) => inbound,
            Err(_) => {
                let _ = conn.send(&error_payload("malformed message")).await;
                continue;
            }
        };

        match inbound {
            ModInbound::Auth { .. } => {
                let _ = conn.send(&error_payload("already authenticated")).await;
            }
            ModInbound::Ready {} => handle_ready(state, room, race_id, participant_id).await,
            ModInbound::StatusUpdate { igt_ms, death_count } => {
                handle_status_update(
                    state,
                    conn,
                    room,
                    race_id,
                    participant_id,
                    igt_ms,
                    death_count,
                    &mut last_status_broadcast,
                )
                .await;
            }
            ModInbound::EventFlag { flag_id, igt_ms } => {
                handle_event_flag(state, conn, room, race_id, participant_id, flag_id, igt_ms).await;
            }
            ModInbound::ZoneQuery { grace_entity_id, map_id, play_region_id } => {
                handle_zone_query(state, conn, room, race_id, participant_id, grace_entity_id, map_id, play_region_id)
                    .await;
            }
            ModInbound::Pong {} => {}
        }
    }
}

fn error_payload(message: &str) -> String {
    serde_json::to_string(&ModOutbound::Error { message: message.to_string() })
        .unwrap_or_else(|_| r#"{"type":"error","message":"internal error"}"#.to_string())
}

async fn handle_ready(state: &WsState, room: &Room, race_id: &RaceId, participant_id: &ParticipantId) {
    let Ok(Some(mut participant)) = state.store.load_participant(participant_id) else { return };
    if participant.status == ParticipantStatus::Registered {
        participant.status = ParticipantStatus::Ready;
        if state.store.save_participant(participant).is_err() {
            return;
        }
    }
    broadcast_mod_leaderboard(state, room, race_id).await;
}

#[allow(clippy::too_many_arguments, reason = "session handlers thread the same five collaborators throughout")]
async fn handle_status_update(
    state: &WsState,
    conn: &Arc<AxumModConn>,
    room: &Room,
    race_id: &RaceId,
    participant_id: &ParticipantId,
    igt_ms: u64,
    death_count: u32,
    last_broadcast: &mut Option<Instant>,
) {
    use speedfog_rooms::ModConn as _;
    let Ok(Some(race)) = state.store.load_race(race_id) else { return };
    if race.status != RaceStatus::Running {
        let _ = conn.send(&error_payload("race is not running")).await;
        return;
    }
    let Ok(Some(mut participant)) = state.store.load_participant(participant_id) else { return };
    if participant.status.is_terminal() {
        return;
    }
    let Ok(Some(seed)) = state.store.load_seed(&race.seed_id) else { return };

    if participant.status == ParticipantStatus::Ready {
        participant.status = ParticipantStatus::Playing;
        participant.current_zone = Some(seed.graph.start_node.clone());
        participant.zone_history.push(ZoneHistoryEntry {
            node_id: seed.graph.start_node.clone(),
            igt_ms: 0,
            deaths: 0,
        });
    }

    if participant.igt_ms != igt_ms {
        participant.last_igt_change_at = Some(state.clock.now());
    }
    let death_increase = death_count.saturating_sub(participant.death_count);
    participant.igt_ms = igt_ms;
    participant.death_count = death_count;
    if death_increase > 0 {
        let current_zone = participant.current_zone.clone();
        if let Some(current_zone) = current_zone {
            if let Some(entry) = participant.most_recent_entry_for_mut(&current_zone) {
                entry.deaths += death_increase;
            }
        }
    }

    if state.store.save_participant(participant).is_err() {
        return;
    }

    let should_broadcast = match last_broadcast {
        Some(at) => at.elapsed() >= Duration::from_secs(1),
        None => true,
    };
    if should_broadcast {
        *last_broadcast = Some(Instant::now());
        broadcast_mod_leaderboard(state, room, race_id).await;
    }
}

#[allow(clippy::too_many_arguments, reason = "session handlers thread the same five collaborators throughout")]
async fn handle_event_flag(
    state: &WsState,
    conn: &Arc<AxumModConn>,
    room: &Room,
    race_id: &RaceId,
    participant_id: &ParticipantId,
    flag_id: FlagId,
    igt_ms: u64,
) {
    use speedfog_rooms::ModConn as _;
    let Ok(Some(race)) = state.store.load_race(race_id) else { return };
    if race.status != RaceStatus::Running {
        let _ = conn.send(&error_payload("race is not running")).await;
        return;
    }
    let Ok(Some(mut participant)) = state.store.load_participant(participant_id) else { return };
    if participant.status.is_terminal() {
        return;
    }
    let Ok(Some(seed)) = state.store.load_seed(&race.seed_id) else { return };

    match resolve_event_flag(&seed.graph, flag_id) {
        FlagResolution::Finish => {
            participant.current_layer = seed.graph.total_layers;
            participant.finished_at = Some(state.clock.now());
            participant.igt_ms = igt_ms;
            participant.status = ParticipantStatus::Finished;
            if state.store.save_participant(participant).is_err() {
                return;
            }
            broadcast_mod_leaderboard(state, room, race_id).await;
            broadcast_spectator_leaderboard(state, room, race_id).await;
            if let Err(err) = state.controller.auto_finish_check(race_id).await {
                warn!(race_id = %race_id, error = %err, "auto-finish check failed after mod finish event");
            }
        }
        FlagResolution::Node(node_id) => {
            let revisit = participant.zone_history.iter().any(|entry| entry.node_id == node_id);
            if !revisit {
                let layer = seed.graph.node(&node_id).map_or(participant.current_layer, |node| node.layer);
                participant.current_layer = participant.current_layer.max(layer);
            }
            participant.igt_ms = igt_ms;
            participant.current_zone = Some(node_id.clone());
            participant.zone_history.push(ZoneHistoryEntry { node_id: node_id.clone(), igt_ms, deaths: 0 });

            let Ok(saved) = state.store.save_participant(participant) else { return };

            if !revisit {
                broadcast_mod_leaderboard(state, room, race_id).await;
            }
            if let Some(update) = build_zone_update(&seed.graph, &node_id, &saved) {
                if let Ok(payload) = serde_json::to_string(&update) {
                    let _ = conn.send(&payload).await;
                }
            }
            if revisit {
                broadcast_spectator_player_update(room, &saved).await;
            }
        }
        FlagResolution::Unknown => {
            tracing::debug!(race_id = %race_id, %flag_id, "unresolved event flag ignored");
        }
    }
}

#[allow(clippy::too_many_arguments, reason = "session handlers thread the same five collaborators throughout")]
async fn handle_zone_query(
    state: &WsState,
    conn: &Arc<AxumModConn>,
    room: &Room,
    race_id: &RaceId,
    participant_id: &ParticipantId,
    grace_entity_id: Option<String>,
    map_id: Option<String>,
    play_region_id: Option<String>,
) {
    use speedfog_rooms::ModConn as _;
    let Ok(Some(race)) = state.store.load_race(race_id) else { return };
    if race.status != RaceStatus::Running {
        let _ = conn.send(&error_payload("race is not running")).await;
        return;
    }
    let Ok(Some(mut participant)) = state.store.load_participant(participant_id) else { return };
    if participant.status.is_terminal() {
        return;
    }
    let Ok(Some(seed)) = state.store.load_seed(&race.seed_id) else { return };

    let visited: Vec<NodeId> = participant.zone_history.iter().map(|entry| entry.node_id.clone()).collect();
    let hint = ZoneQueryHint { grace_entity_id, map_id, play_region_id };
    let Some(node_id) = resolve_zone_query(&state.resolver_tables, &hint, &seed.graph, &visited) else {
        tracing::debug!(race_id = %race_id, participant_id = %participant_id, "zone query did not resolve");
        return;
    };

    participant.current_zone = Some(node_id.clone());
    let Ok(saved) = state.store.save_participant(participant) else { return };

    if let Some(update) = build_zone_update(&seed.graph, &node_id, &saved) {
        if let Ok(payload) = serde_json::to_string(&update) {
            let _ = conn.send(&payload).await;
        }
    }
    broadcast_spectator_player_update(room, &saved).await;
}

async fn broadcast_mod_leaderboard(state: &WsState, room: &Room, race_id: &RaceId) {
    let Ok(Some(race)) = state.store.load_race(race_id) else { return };
    let Ok(Some(seed)) = state.store.load_seed(&race.seed_id) else { return };
    let Ok(participants) = state.store.list_participants(race_id) else { return };
    let views = leaderboard_views(&seed.graph, participants);
    if let Ok(payload) = serde_json::to_string(&ModOutbound::LeaderboardUpdate { participants: views }) {
        room.broadcast_to_mods(&payload).await;
    }
}

async fn broadcast_spectator_leaderboard(state: &WsState, room: &Room, race_id: &RaceId) {
    let Ok(Some(race)) = state.store.load_race(race_id) else { return };
    let Ok(Some(seed)) = state.store.load_seed(&race.seed_id) else { return };
    let Ok(participants) = state.store.list_participants(race_id) else { return };
    let views = leaderboard_views(&seed.graph, participants);
    if let Ok(payload) = serde_json::to_string(&SpectatorOutbound::LeaderboardUpdate { participants: views }) {
        room.broadcast_to_spectators(|_conn| payload.clone()).await;
    }
}

async fn broadcast_spectator_player_update(room: &Room, participant: &Participant) {
    if let Ok(payload) = serde_json::to_string(&SpectatorOutbound::PlayerUpdate { player: solo_view(participant) }) {
        room.broadcast_to_spectators(|_conn| payload.clone()).await;
    }
}

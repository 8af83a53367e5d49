// crates/speedfog-resolve/src/leaderboard.rs
// ============================================================================
// Module: SpeedFog Leaderboard & Gap Engine
// Description: Stable participant sort order and leader-relative time gaps
// (spec.md section 4.5).
// Purpose: Pure, stateless scoring logic shared by every broadcast path
// that sends a `leaderboard_update`.
// Dependencies: speedfog-core::entities, speedfog-core::graph
// ============================================================================

//! ## Overview
//! [`sort_leaderboard`] and [`gap_for`] never read or write a store; callers
//! pass in whatever participant snapshot they already loaded.

use std::collections::BTreeMap;

use speedfog_core::entities::Participant;
use speedfog_core::entities::ParticipantStatus;
use speedfog_core::graph::SeedGraph;

fn sort_group(status: ParticipantStatus) -> u8 {
    match status {
        ParticipantStatus::Finished => 0,
        ParticipantStatus::Playing => 1,
        ParticipantStatus::Ready => 2,
        ParticipantStatus::Registered => 3,
        ParticipantStatus::Abandoned => 4,
    }
}

fn leaderboard_cmp(a: &Participant, b: &Participant) -> std::cmp::Ordering {
    sort_group(a.status).cmp(&sort_group(b.status)).then_with(|| match a.status {
        ParticipantStatus::Finished => a.igt_ms.cmp(&b.igt_ms),
        ParticipantStatus::Playing | ParticipantStatus::Abandoned => {
            b.current_layer.cmp(&a.current_layer).then_with(|| a.igt_ms.cmp(&b.igt_ms))
        }
        ParticipantStatus::Ready | ParticipantStatus::Registered => a.arrival_order.cmp(&b.arrival_order),
    })
}

/// Sorts `participants` in place per the stable order in spec.md section 4.5.
pub fn sort_leaderboard(participants: &mut [Participant]) {
    participants.sort_by(leaderboard_cmp);
}

/// For each layer, the earliest `igt_ms` at which `participant` first
/// reached it, derived from `zone_history`. Entries whose node is absent
/// from `graph` are skipped.
#[must_use]
pub fn layer_splits(graph: &SeedGraph, participant: &Participant) -> BTreeMap<u32, u64> {
    let mut splits = BTreeMap::new();
    for entry in &participant.zone_history {
        if let Some(node) = graph.node(&entry.node_id) {
            splits.entry(node.layer).or_insert(entry.igt_ms);
        }
    }
    splits
}

/// Computes `participant`'s time gap versus `leader`, per the table in
/// spec.md section 4.5. Returns `None` when no gap applies.
#[must_use]
pub fn gap_for(
    graph: &SeedGraph,
    leader: &Participant,
    leader_splits: &BTreeMap<u32, u64>,
    participant: &Participant,
) -> Option<i64> {
    if participant.id == leader.id {
        return None;
    }
    match participant.status {
        ParticipantStatus::Finished => {
            Some(i64::try_from(participant.igt_ms).ok()? - i64::try_from(leader.igt_ms).ok()?)
        }
        ParticipantStatus::Playing => gap_for_playing(graph, leader_splits, participant),
        _ => None,
    }
}

fn gap_for_playing(
    graph: &SeedGraph,
    leader_splits: &BTreeMap<u32, u64>,
    participant: &Participant,
) -> Option<i64> {
    let current_split = *leader_splits.get(&participant.current_layer)?;
    let next_split = leader_splits.get(&(participant.current_layer + 1));

    // "Exceeded budget" only applies once the leader has actually finished
    // the current layer (a next-layer split exists); otherwise the player
    // is still within whatever pace the leader is setting.
    match next_split {
        Some(&next) if participant.igt_ms > next => {
            Some(i64::try_from(participant.igt_ms).ok()? - i64::try_from(next).ok()?)
        }
        _ => {
            let own_splits = layer_splits(graph, participant);
            let entry_igt = own_splits.get(&participant.current_layer).copied().unwrap_or(participant.igt_ms);
            Some(i64::try_from(entry_igt).ok()? - i64::try_from(current_split).ok()?)
        }
    }
}

// crates/speedfog-race/src/views.rs
// ============================================================================
// Module: SpeedFog Participant Views
// Description: Builds the wire-facing `ParticipantView` rows from stored
// `Participant` snapshots, sorted and gap-annotated (spec.md sections 4.5,
// 6.1).
// Purpose: One shared builder for every broadcast path (controller sequences
// and, later, speedfog-ws's in-loop broadcasts) so sort order and gap
// computation are never reimplemented per call site.
// Dependencies: speedfog-resolve, speedfog-core
// ============================================================================

use speedfog_core::entities::Participant;
use speedfog_core::entities::ParticipantStatus;
use speedfog_core::graph::SeedGraph;
use speedfog_core::wire::ParticipantView;
use speedfog_resolve::gap_for;
use speedfog_resolve::layer_splits;
use speedfog_resolve::sort_leaderboard;

fn view_of(participant: &Participant, gap_ms: Option<i64>) -> ParticipantView {
    let zone_history = (participant.status == ParticipantStatus::Finished)
        .then(|| participant.zone_history.clone());
    ParticipantView {
        id: participant.id.clone(),
        user_id: participant.user_id.clone(),
        status: participant.status,
        current_zone: participant.current_zone.clone(),
        current_layer: participant.current_layer,
        igt_ms: participant.igt_ms,
        death_count: participant.death_count,
        color_index: participant.color_index,
        arrival_order: participant.arrival_order,
        gap_ms,
        zone_history,
    }
}

/// Sorts `participants` per spec.md section 4.5 and annotates each row with
/// its time gap versus the current leader. `zone_history` is included only
/// for participants who are themselves FINISHED (spec.md section 6.1: "
/// finish-only fields include `zone_history`").
#[must_use]
pub fn leaderboard_views(graph: &SeedGraph, mut participants: Vec<Participant>) -> Vec<ParticipantView> {
    sort_leaderboard(&mut participants);
    let Some(leader) = participants.first().cloned() else {
        return Vec::new();
    };
    let leader_splits = layer_splits(graph, &leader);
    participants
        .iter()
        .map(|participant| {
            let gap_ms = gap_for(graph, &leader, &leader_splits, participant);
            view_of(participant, gap_ms)
        })
        .collect()
}

/// Builds a single participant's view with no gap computed, used for
/// `player_update` unicasts/broadcasts where a full leaderboard pass isn't
/// warranted.
#[must_use]
pub fn solo_view(participant: &Participant) -> ParticipantView {
    view_of(participant, None)
}

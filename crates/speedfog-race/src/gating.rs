// crates/speedfog-race/src/gating.rs
// ============================================================================
// Module: SpeedFog Spectator DAG Gating
// Description: Per-viewer seed graph visibility rule (spec.md section 4.7).
// Purpose: Shared by the race controller's broadcast sequences and
// speedfog-ws's spectator session handler so both build the same
// `race_state` payload shape.
// Dependencies: speedfog-core, speedfog-rooms
// ============================================================================

use speedfog_core::entities::RaceStatus;
use speedfog_core::entities::Seed;
use speedfog_core::wire::SpectatorSeedView;
use speedfog_rooms::ViewerContext;

/// Builds the seed view one spectator should receive, gating the full DAG
/// per the table in spec.md section 4.7:
///
/// | Race status | Who sees the graph |
/// |-------------|---------------------|
/// | FINISHED    | everyone |
/// | RUNNING     | everyone except participants |
/// | SETUP       | only non-participating privileged viewers |
#[must_use]
pub fn spectator_seed_view(status: RaceStatus, viewer: &ViewerContext, seed: &Seed) -> SpectatorSeedView {
    let show_graph = match status {
        RaceStatus::Finished => true,
        RaceStatus::Running => !viewer.is_participant,
        RaceStatus::Setup => viewer.is_privileged && !viewer.is_participant,
    };
    SpectatorSeedView {
        graph: show_graph.then(|| seed.graph.clone()),
        total_nodes: seed.graph.total_nodes,
        total_paths: seed.graph.total_paths,
    }
}

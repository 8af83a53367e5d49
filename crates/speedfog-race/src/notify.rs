// crates/speedfog-race/src/notify.rs
// ============================================================================
// Module: SpeedFog Notification Publisher
// Description: Fire-and-forget collaborator boundary for chat/Discord side
// effects (spec.md section 1, SPEC_FULL.md section C).
// Purpose: Let the race controller announce race-level events without
// depending on any concrete notification backend.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! The race controller never blocks on a publisher: implementations are
//! expected to hand off to their own queue/task if delivery is slow.

use speedfog_core::entities::Race;

/// Race-level events the controller announces.
pub trait NotificationPublisher: Send + Sync {
    /// The race transitioned SETUP -> RUNNING.
    fn notify_race_started(&self, race: &Race);

    /// The race transitioned to FINISHED.
    fn notify_race_finished(&self, race: &Race);
}

/// Discards every notification. Default for tests and embeddings that don't
/// wire a chat/Discord backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl NotificationPublisher for NoopPublisher {
    fn notify_race_started(&self, _race: &Race) {}

    fn notify_race_finished(&self, _race: &Race) {}
}

/// Logs each event at `info` via `tracing`. A reasonable default for
/// deployments that haven't wired a real chat/Discord sink yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl NotificationPublisher for LogPublisher {
    fn notify_race_started(&self, race: &Race) {
        tracing::info!(race_id = %race.id, name = %race.name, "race started");
    }

    fn notify_race_finished(&self, race: &Race) {
        tracing::info!(race_id = %race.id, name = %race.name, "race finished");
    }
}

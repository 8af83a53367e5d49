// crates/speedfog-race/src/metrics.rs
// ============================================================================
// Module: SpeedFog Race Metrics
// Description: Lightweight operational counters for the race controller and
// background monitors (SPEC_FULL.md section B).
// Purpose: Basic observability without pulling in a concrete metrics
// backend; the Non-goals exclude analytics, not operational visibility.
// Dependencies: std::time
// ============================================================================

use std::time::Duration;

/// Operational counters the race controller and monitor loop emit.
pub trait RaceMetrics: Send + Sync {
    /// A race transitioned SETUP -> RUNNING.
    fn race_started(&self);

    /// A race transitioned to FINISHED, by any path (auto-finish,
    /// force-finish, or monitor-driven abandonment).
    fn race_finished(&self);

    /// An auto-finish attempt lost its optimistic race (the expected, silent
    /// no-op path in P4).
    fn auto_finish_conflict(&self);

    /// One pass of the background monitor loop completed in `duration`.
    fn monitor_sweep_duration(&self, duration: Duration);
}

/// Discards every metric.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl RaceMetrics for NoopMetrics {
    fn race_started(&self) {}

    fn race_finished(&self) {}

    fn auto_finish_conflict(&self) {}

    fn monitor_sweep_duration(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_accepts_every_call() {
        let metrics = NoopMetrics;
        metrics.race_started();
        metrics.race_finished();
        metrics.auto_finish_conflict();
        metrics.monitor_sweep_duration(Duration::from_millis(5));
    }
}

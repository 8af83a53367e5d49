// crates/speedfog-race/src/lib.rs
// ============================================================================
// Crate: speedfog-race
// Description: The race controller's broadcast sequences (spec.md section
// 4.9, C9) and the background inactivity/no-show monitor (section 4.10,
// C10).
// Purpose: Own every state transition that fans out to a room, so
// speedfog-ws's session handlers never build broadcast payloads themselves.
// ============================================================================

#![forbid(unsafe_code)]

pub mod controller;
pub mod gating;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod views;

pub use controller::ControllerError;
pub use controller::RaceController;
pub use gating::spectator_seed_view;
pub use metrics::NoopMetrics;
pub use metrics::RaceMetrics;
pub use monitor::run_sweep_once;
pub use monitor::spawn_monitor_loop;
pub use monitor::MonitorConfig;
pub use notify::LogPublisher;
pub use notify::NoopPublisher;
pub use notify::NotificationPublisher;
pub use views::leaderboard_views;
pub use views::solo_view;

// crates/speedfog-resolve/src/lib.rs
// ============================================================================
// Crate: speedfog-resolve
// Description: Pure, stateless resolution and scoring logic: the grace/map
// resolver (C3), the event-flag resolver (C4), and the leaderboard/gap
// engine (C5).
// Purpose: Keep the hardest-to-get-right business logic testable without a
// runtime, a store, or a network socket.
// ============================================================================

#![forbid(unsafe_code)]

pub mod flags;
pub mod grace;
pub mod leaderboard;

pub use flags::resolve_event_flag;
pub use flags::FlagResolution;
pub use grace::resolve_zone_query;
pub use grace::MapZoneCandidate;
pub use grace::ResolverTables;
pub use grace::ZoneQueryHint;
pub use leaderboard::gap_for;
pub use leaderboard::layer_splits;
pub use leaderboard::sort_leaderboard;

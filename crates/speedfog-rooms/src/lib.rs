// crates/speedfog-rooms/src/lib.rs
// ============================================================================
// Crate: speedfog-rooms
// Description: The room registry: per-race connection tracking and
// snapshot-before-broadcast fan-out (spec.md section 4.2, C2).
// Purpose: The only long-lived shared mutable in-memory structure in the
// service (spec.md section 5).
// ============================================================================

#![forbid(unsafe_code)]

pub mod conn;
pub mod registry;
pub mod room;

pub use conn::ModConn;
pub use conn::SpectatorConn;
pub use conn::ViewerContext;
pub use registry::RoomRegistry;
pub use room::Room;
pub use room::RoomError;

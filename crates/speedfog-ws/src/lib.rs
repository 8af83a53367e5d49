// crates/speedfog-ws/src/lib.rs
// ============================================================================
// Crate: speedfog-ws
// Description: The two WebSocket endpoints (spec.md section 6): the mod
// session handler (C6) and spectator session handler (C7), as `axum`
// upgrade handlers.
// Purpose: Turn inbound frames into store mutations and room broadcasts;
// own no state of its own beyond one connection's socket halves.
// Dependencies: axum, speedfog-core, speedfog-rooms, speedfog-race,
// speedfog-resolve
// ============================================================================

#![forbid(unsafe_code)]

pub mod auth;
pub mod conn;
pub mod mod_session;
mod sockutil;
pub mod spectator_session;
pub mod state;

mod router;

pub use auth::AnonymousAuthResolver;
pub use auth::SpectatorAuthResolver;
pub use conn::AxumModConn;
pub use conn::AxumSpectatorConn;
pub use mod_session::handle_mod_connection;
pub use router::router;
pub use spectator_session::handle_spectator_connection;
pub use state::SessionTimeouts;
pub use state::WsState;

/// Wire protocol types, re-exported from `speedfog-core` so callers only
/// need to depend on this crate for both the handlers and their messages.
pub use speedfog_core::wire::*;

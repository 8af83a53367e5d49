// crates/speedfog-rooms/src/conn.rs
// ============================================================================
// Module: SpeedFog Connection Traits
// Description: Sender-side abstractions a room broadcasts through (spec.md
// section 4.2, C2).
// Purpose: Let speedfog-ws supply real `axum` WebSocket senders while tests
// supply in-memory channel stand-ins.
// Dependencies: async-trait
// ============================================================================

use async_trait::async_trait;

use speedfog_core::identifiers::ParticipantId;
use speedfog_core::identifiers::UserId;

/// A connected game-mod's send half.
#[async_trait]
pub trait ModConn: Send + Sync {
    /// Sends a pre-serialized JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an opaque error string on send failure; the room treats any
    /// `Err` the same way, regardless of cause.
    async fn send(&self, payload: &str) -> Result<(), String>;

    /// Closes the underlying socket with a WebSocket close code.
    async fn close(&self, code: u16);

    /// The participant this connection authenticated as.
    fn participant_id(&self) -> &ParticipantId;
}

/// Per-viewer context a spectator broadcast uses to build a tailored
/// payload (DAG visibility, locale).
#[derive(Debug, Clone)]
pub struct ViewerContext {
    /// The authenticated viewer's user id, if any (spectators may be
    /// anonymous per spec.md section 4.7).
    pub user_id: Option<UserId>,
    /// Whether this viewer is a participant in the race being watched.
    pub is_participant: bool,
    /// Whether this viewer is an organizer or caster (grants DAG access
    /// while the race is in SETUP).
    pub is_privileged: bool,
    /// Locale used to localize spectator/overlay text.
    pub locale: String,
}

impl Default for ViewerContext {
    fn default() -> Self {
        Self { user_id: None, is_participant: false, is_privileged: false, locale: "en".to_string() }
    }
}

/// A connected spectator's send half.
#[async_trait]
pub trait SpectatorConn: Send + Sync {
    /// Sends a pre-serialized JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an opaque error string on send failure.
    async fn send(&self, payload: &str) -> Result<(), String>;

    /// Closes the underlying socket with a WebSocket close code.
    async fn close(&self, code: u16);

    /// This viewer's context, used to build a per-viewer payload.
    fn viewer(&self) -> &ViewerContext;
}

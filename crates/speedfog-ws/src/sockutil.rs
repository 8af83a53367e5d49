// crates/speedfog-ws/src/sockutil.rs
// ============================================================================
// Module: SpeedFog WS Socket Utilities
// Description: Small helpers shared by both session handlers.
// Purpose: Avoid duplicating the close-frame dance across C6 and C7.
// Dependencies: axum, futures
// ============================================================================

use axum::extract::ws::CloseFrame;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use futures::stream::SplitSink;
use futures::SinkExt;

/// Sends a close frame with `code`/`reason` and gives up on any send error;
/// the peer is going away either way.
pub async fn close_with(sink: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let frame = CloseFrame { code, reason: reason.to_string().into() };
    let _ = sink.send(Message::Close(Some(frame))).await;
}

// crates/speedfog-ws/src/conn.rs
// ============================================================================
// Module: SpeedFog Axum Connection Adapters
// Description: `ModConn`/`SpectatorConn` implementations over a real `axum`
// WebSocket send half (spec.md section 4.2, C2).
// Purpose: Let `speedfog-rooms` broadcast through real sockets without
// knowing anything about `axum`.
// Dependencies: axum, futures, tokio::sync::Mutex
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::CloseFrame;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;

use speedfog_core::identifiers::ParticipantId;
use speedfog_rooms::ModConn;
use speedfog_rooms::SpectatorConn;
use speedfog_rooms::ViewerContext;

/// One connected game-mod's real socket send half.
pub struct AxumModConn {
    participant_id: ParticipantId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl AxumModConn {
    /// Wraps a split WebSocket sink as a `ModConn`.
    #[must_use]
    pub fn new(participant_id: ParticipantId, sink: SplitSink<WebSocket, Message>) -> Arc<Self> {
        Arc::new(Self { participant_id, sink: Mutex::new(sink) })
    }
}

#[async_trait]
impl ModConn for AxumModConn {
    async fn send(&self, payload: &str) -> Result<(), String> {
        self.sink.lock().await.send(Message::Text(payload.to_string().into())).await.map_err(|err| err.to_string())
    }

    async fn close(&self, code: u16) {
        let frame = CloseFrame { code, reason: "".into() };
        let _ = self.sink.lock().await.send(Message::Close(Some(frame))).await;
    }

    fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }
}

/// One connected spectator's real socket send half.
pub struct AxumSpectatorConn {
    viewer: ViewerContext,
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl AxumSpectatorConn {
    /// Wraps a split WebSocket sink as a `SpectatorConn`.
    #[must_use]
    pub fn new(viewer: ViewerContext, sink: SplitSink<WebSocket, Message>) -> Arc<Self> {
        Arc::new(Self { viewer, sink: Mutex::new(sink) })
    }
}

#[async_trait]
impl SpectatorConn for AxumSpectatorConn {
    async fn send(&self, payload: &str) -> Result<(), String> {
        self.sink.lock().await.send(Message::Text(payload.to_string().into())).await.map_err(|err| err.to_string())
    }

    async fn close(&self, code: u16) {
        let frame = CloseFrame { code, reason: "".into() };
        let _ = self.sink.lock().await.send(Message::Close(Some(frame))).await;
    }

    fn viewer(&self) -> &ViewerContext {
        &self.viewer
    }
}

// system-tests/tests/helpers/ws_client.rs
// ============================================================================
// Module: WS Test Client
// Description: A thin JSON-over-WebSocket client for driving the mod and
// spectator endpoints in system-tests.
// Purpose: Avoid repeating connect/send/receive/deserialize boilerplate in
// every suite.
// Dependencies: tokio-tungstenite, serde_json
// ============================================================================

use std::time::Duration;

use futures::SinkExt;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;

/// One end-to-end WebSocket connection to a SpeedFog endpoint.
pub struct TestSocket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestSocket {
    /// Connects to `url`.
    pub async fn connect(url: &str) -> Self {
        let (inner, _response) = tokio_tungstenite::connect_async(url).await.expect("connect websocket");
        Self { inner }
    }

    /// Sends a value as a single JSON text frame.
    pub async fn send_json(&mut self, value: &impl serde::Serialize) {
        let text = serde_json::to_string(value).expect("serialize frame");
        self.inner.send(Message::Text(text)).await.expect("send frame");
    }

    /// Receives the next text frame and deserializes it, skipping any
    /// intermediate ping/pong control frames.
    pub async fn recv_json<T: serde::de::DeserializeOwned>(&mut self) -> T {
        self.recv_json_timeout(Duration::from_secs(5)).await
    }

    /// Same as [`Self::recv_json`] with an explicit timeout.
    pub async fn recv_json_timeout<T: serde::de::DeserializeOwned>(&mut self, timeout: Duration) -> T {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let next = tokio::time::timeout(remaining, self.inner.next())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for a text frame"));
            match next {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).unwrap_or_else(|err| {
                        panic!("failed to parse frame {text}: {err}");
                    });
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => panic!("unexpected frame: {other:?}"),
                Some(Err(err)) => panic!("websocket error: {err}"),
                None => panic!("connection closed before expected frame"),
            }
        }
    }

    /// Receives frames, discarding any whose `type` field doesn't match
    /// `expected_type`, until one does or the overall timeout elapses.
    /// Broadcasts fan out to every connection in a room, so tests assert on
    /// the message they care about rather than an exact per-socket count.
    pub async fn recv_until_type(&mut self, expected_type: &str) -> serde_json::Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let value: serde_json::Value = self
                .recv_json_timeout(deadline.saturating_duration_since(tokio::time::Instant::now()))
                .await;
            if value.get("type").and_then(|t| t.as_str()) == Some(expected_type) {
                return value;
            }
        }
    }

    /// Waits for the connection to be closed by the peer, returning the
    /// close frame if one was sent.
    pub async fn expect_close(&mut self) -> Option<CloseFrame<'static>> {
        loop {
            match tokio::time::timeout(Duration::from_secs(5), self.inner.next())
                .await
                .expect("timed out waiting for close")
            {
                Some(Ok(Message::Close(frame))) => return frame,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    }
}

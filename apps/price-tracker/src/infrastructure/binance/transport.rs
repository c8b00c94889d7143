//! Ticker Stream WebSocket Transport
//!
//! Connects to Binance's all-market ticker stream and turns WebSocket
//! frames into `TransportEvent`s.
//!
//! # Stream URL
//!
//! - `wss://stream.binance.com:9443/ws/!ticker@arr`
//!
//! # Protocol
//!
//! Read-only: the server pushes one JSON array per second and pings
//! periodically. The only frames sent upstream are pongs and the final
//! close frame.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FeedTransport, TransportError, TransportEvent};

/// Default all-market ticker stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.binance.com:9443/ws/!ticker@arr";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for the ticker stream.
pub struct WebSocketTransport {
    url: String,
    stream: Option<WsStream>,
    pending: VecDeque<TransportEvent>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("open", &self.stream.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl WebSocketTransport {
    /// Create a transport for `url`. Nothing is opened until `connect`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            pending: VecDeque::new(),
        }
    }

    /// Endpoint this transport connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Drop the connection after a failure and report it.
    fn fail(&mut self, err: impl std::fmt::Display) -> TransportEvent {
        self.stream = None;
        TransportEvent::Error(TransportError::Dropped(err.to_string()))
    }
}

#[async_trait]
impl FeedTransport for WebSocketTransport {
    async fn connect(&mut self) {
        self.close().await;
        self.pending.clear();

        tracing::info!(url = %self.url, "Connecting to ticker stream");

        match tokio_tungstenite::connect_async(self.url.as_str()).await {
            Ok((stream, response)) => {
                tracing::debug!(status = %response.status(), "WebSocket handshake complete");
                self.stream = Some(stream);
                self.pending.push_back(TransportEvent::Open);
            }
            Err(e) => {
                self.pending
                    .push_back(TransportEvent::Error(TransportError::Open(e.to_string())));
            }
        }
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        loop {
            let stream = self.stream.as_mut()?;
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(TransportEvent::message(text.as_str()));
                }
                Some(Ok(Message::Binary(data))) => {
                    // passed on unchanged; the decoder rejects invalid UTF-8
                    return Some(TransportEvent::message(data.to_vec()));
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = stream.send(Message::Pong(data)).await {
                        return Some(self.fail(e));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server sent close frame");
                    self.stream = None;
                    let (code, reason) = frame.map_or((None, String::new()), |f| {
                        (Some(u16::from(f.code)), f.reason.as_str().to_owned())
                    });
                    return Some(TransportEvent::Close { code, reason });
                }
                Some(Ok(_)) => {
                    // Pong and raw frames carry nothing for us
                }
                Some(Err(e)) => return Some(self.fail(e)),
                None => {
                    tracing::info!("WebSocket stream ended");
                    self.stream = None;
                    return Some(TransportEvent::Close {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Error while closing WebSocket");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::binance::TickerCodec;
    use tokio::net::TcpListener;

    /// Serve one WebSocket client on a local port: send `frames`, then close.
    async fn serve(frames: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            let _ = ws.close(None).await;
        });
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn unopened_transport_has_no_events() {
        let mut transport = WebSocketTransport::new(DEFAULT_STREAM_URL);
        assert!(!transport.is_open());
        assert!(transport.next_event().await.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent_when_never_opened() {
        let mut transport = WebSocketTransport::new(DEFAULT_STREAM_URL);
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn failed_connect_reports_open_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut transport = WebSocketTransport::new(format!("ws://{addr}/ws"));
        transport.connect().await;

        assert!(matches!(
            transport.next_event().await,
            Some(TransportEvent::Error(TransportError::Open(_)))
        ));
        assert!(!transport.is_open());
        assert!(transport.next_event().await.is_none());
    }

    #[test]
    fn debug_does_not_expose_stream() {
        let transport = WebSocketTransport::new("ws://localhost:1/ws");
        let debug = format!("{transport:?}");
        assert!(debug.contains("open: false"));
    }

    #[tokio::test]
    async fn binary_frame_bytes_reach_the_decoder_unchanged() {
        let valid = r#"[{"s":"BTCUSDT","c":"1","P":"1"}]"#;
        let invalid = b"[{\"s\":\"BTCUSDT\",\"c\":\"1\",\"P\":\"1\",\"x\":\"\xff\"}]".to_vec();
        let url = serve(vec![
            Message::binary(valid.as_bytes().to_vec()),
            Message::binary(invalid.clone()),
        ])
        .await;

        let mut transport = WebSocketTransport::new(url);
        transport.connect().await;
        assert_eq!(transport.next_event().await, Some(TransportEvent::Open));

        let codec = TickerCodec::new();
        let Some(TransportEvent::Message(first)) = transport.next_event().await else {
            panic!("expected the valid binary frame");
        };
        assert_eq!(codec.decode(&first).unwrap().len(), 1);

        let Some(TransportEvent::Message(second)) = transport.next_event().await else {
            panic!("expected the invalid binary frame");
        };
        assert_eq!(second, invalid);
        assert!(codec.decode(&second).is_err());

        assert!(matches!(
            transport.next_event().await,
            Some(TransportEvent::Close { .. })
        ));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn text_frames_become_messages() {
        let url = serve(vec![Message::text("[]")]).await;

        let mut transport = WebSocketTransport::new(url);
        transport.connect().await;
        assert_eq!(transport.next_event().await, Some(TransportEvent::Open));
        assert_eq!(
            transport.next_event().await,
            Some(TransportEvent::message("[]"))
        );
    }
}

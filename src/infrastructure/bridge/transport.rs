//! Websocket transport seams
//!
//! Both legs of a relay session are driven through the `MediaTransport`
//! trait so the session loop can run against in-memory fakes in tests.
//! Production implementations wrap the axum server socket (carrier leg)
//! and the tungstenite client socket (speech leg).

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Socket-level failure on either leg
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("websocket failure: {0}")]
    Socket(String),

    #[error("frame encoding failed: {0}")]
    Encode(String),
}

/// Text-frame transport over a websocket-shaped connection
#[async_trait]
pub trait MediaTransport: Send {
    /// Next text frame from the peer. `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Closing an already closed transport is a
    /// no-op.
    async fn close(&mut self);
}

#[async_trait]
impl MediaTransport for Box<dyn MediaTransport> {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        (**self).recv().await
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        (**self).send_text(text).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}

/// Produces the upstream speech transport for a new session
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MediaTransport>, TransportError>;
}

/// Carrier media socket accepted by the HTTP server
pub struct CarrierSocket {
    socket: WebSocket,
    closed: bool,
}

impl CarrierSocket {
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl MediaTransport for CarrierSocket {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.socket.recv().await {
                Some(Ok(WsMessage::Text(text))) => return Some(Ok(text)),
                Some(Ok(WsMessage::Close(_))) | None => return None,
                // The carrier only speaks text frames; everything else
                // is keepalive traffic.
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Some(Err(TransportError::Socket(err.to_string()))),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(WsMessage::Text(text))
            .await
            .map_err(|err| TransportError::Socket(err.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.socket.send(WsMessage::Close(None)).await;
    }
}

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client socket connected to the realtime speech endpoint
pub struct SpeechSocket {
    socket: ClientStream,
    closed: bool,
}

impl SpeechSocket {
    pub fn new(socket: ClientStream) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait]
impl MediaTransport for SpeechSocket {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.socket.next().await {
                Some(Ok(TungsteniteMessage::Text(text))) => return Some(Ok(text)),
                Some(Ok(TungsteniteMessage::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Some(Err(TransportError::Socket(err.to_string()))),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(TungsteniteMessage::Text(text))
            .await
            .map_err(|err| TransportError::Socket(err.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.socket.close(None).await;
    }
}

/// Dials the realtime speech endpoint with bearer auth
pub struct RealtimeConnector {
    url: String,
    api_key: String,
}

impl RealtimeConnector {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl UpstreamConnector for RealtimeConnector {
    async fn connect(&self) -> Result<Box<dyn MediaTransport>, TransportError> {
        let mut request = self
            .url
            .clone()
            .into_client_request()
            .map_err(|err| TransportError::Connect(format!("bad speech endpoint: {}", err)))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|err| TransportError::Connect(format!("bad api key: {}", err)))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", bearer);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        debug!(url = %self.url, "dialing speech endpoint");
        let (socket, _response) = connect_async(request)
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        Ok(Box::new(SpeechSocket::new(socket)))
    }
}

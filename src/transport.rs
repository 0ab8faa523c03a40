//! The transport boundary and its WebSocket implementation.
//!
//! The engine drives a [`Transport`] split into a sink half (outbound
//! frames) and a stream half (inbound frames), so the run loop can pump
//! both directions concurrently. [`WsTransport`] is the production
//! implementation over `tokio-tungstenite`; tests and embedders can supply
//! their own through `initialize_with_transport`.

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http::StatusCode;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::UspConfig;
use crate::error::UspError;

/// One frame on the wire, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFrame {
    /// A text frame (inbound events).
    Text(String),
    /// A binary frame (outbound audio).
    Binary(Bytes),
}

/// Outbound half of a connection.
#[async_trait::async_trait]
pub trait TransportSink: Send {
    /// Send one frame. Ordering across calls is preserved.
    async fn send(&mut self, frame: TransportFrame) -> Result<(), UspError>;

    /// Close the connection gracefully. Idempotent best-effort.
    async fn close(&mut self) -> Result<(), UspError>;
}

/// Inbound half of a connection.
#[async_trait::async_trait]
pub trait TransportStream: Send {
    /// Receive the next frame. `None` means the peer closed the
    /// connection; `Some(Err(_))` is a transport failure.
    async fn recv(&mut self) -> Option<Result<TransportFrame, UspError>>;
}

/// A connected, not-yet-split transport.
pub trait Transport: Send {
    /// Split into independently driven halves.
    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportStream>);
}

type WsStreamInner = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug)]
pub struct WsTransport {
    stream: WsStreamInner,
}

impl WsTransport {
    /// Connect to the configured endpoint.
    ///
    /// The handshake carries the credentials and a fresh `X-ConnectionId`;
    /// the whole attempt is bounded by `config.connect_timeout`.
    pub async fn connect(config: &UspConfig) -> Result<Self, UspError> {
        let ws_url = config.build_websocket_url();
        let host = host_header(&ws_url)?;
        let (auth_name, auth_value) = config.auth.header();
        let connection_id = Uuid::new_v4().simple().to_string();

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(&ws_url)
            .header("Host", host)
            .header("Upgrade", "websocket")
            .header("Connection", "upgrade")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header(auth_name, auth_value)
            .header("X-ConnectionId", &connection_id)
            .body(())
            .map_err(|e| {
                UspError::InitializationFailure(format!("failed to build connect request: {e}"))
            })?;

        let stream = match timeout(config.connect_timeout, connect_async(request)).await {
            Err(_) => return Err(UspError::ConnectionTimeout),
            Ok(Err(e)) => return Err(map_connect_error(e)),
            Ok(Ok((stream, _response))) => stream,
        };

        info!(connection_id = %connection_id, "connected to speech service");
        Ok(Self { stream })
    }
}

impl Transport for WsTransport {
    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportStream>) {
        let (sink, stream) = self.stream.split();
        (Box::new(WsSink { sink }), Box::new(WsStream { stream }))
    }
}

struct WsSink {
    sink: SplitSink<WsStreamInner, Message>,
}

#[async_trait::async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, frame: TransportFrame) -> Result<(), UspError> {
        let message = match frame {
            TransportFrame::Text(text) => Message::Text(text.into()),
            TransportFrame::Binary(bytes) => Message::Binary(bytes),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| UspError::WriteError(format!("failed to send frame: {e}")))
    }

    async fn close(&mut self) -> Result<(), UspError> {
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            debug!("close frame not sent: {e}");
        }
        if let Err(e) = self.sink.close().await {
            debug!("sink close failed: {e}");
        }
        Ok(())
    }
}

struct WsStream {
    stream: SplitStream<WsStreamInner>,
}

#[async_trait::async_trait]
impl TransportStream for WsStream {
    async fn recv(&mut self) -> Option<Result<TransportFrame, UspError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(Ok(TransportFrame::Text(text.as_str().to_owned())));
                }
                Ok(Message::Binary(bytes)) => return Some(Ok(TransportFrame::Binary(bytes))),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    debug!("keep-alive frame");
                    continue;
                }
                Ok(Message::Close(frame)) => {
                    info!("service closed the connection: {frame:?}");
                    return None;
                }
                Ok(Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => return None,
                Err(WsError::Io(e)) => {
                    warn!("socket error: {e}");
                    return Some(Err(UspError::NoConnection));
                }
                Err(e) => {
                    return Some(Err(UspError::TransportError(format!(
                        "websocket error: {e}"
                    ))));
                }
            }
        }
    }
}

/// `Host` header value for the connect request, including a non-default
/// port.
fn host_header(ws_url: &str) -> Result<String, UspError> {
    let url = Url::parse(ws_url)
        .map_err(|e| UspError::InvalidParameter(format!("invalid endpoint url: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| UspError::InvalidParameter("endpoint has no host".to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn map_connect_error(error: WsError) -> UspError {
    match error {
        WsError::Http(response) => {
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                UspError::AuthError(format!("service rejected the handshake ({status})"))
            } else {
                UspError::TransportError(format!("handshake failed with status {status}"))
            }
        }
        WsError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            UspError::NoConnection
        }
        other => UspError::TransportError(format!("failed to connect: {other}")),
    }
}

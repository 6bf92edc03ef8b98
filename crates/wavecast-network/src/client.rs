//! Viewer side of the connection: receive STL payloads from a server

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use std::thread;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use wavecast_mesh::{DecodeError, ModelPipeline, ModelSummary, SceneDisplay};

/// Text frame sent once after connecting
pub const GREETING: &str = "wavecast viewer connected";

/// Errors on the client side of a connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to start transport runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Largest payload a viewer accepts unless configured otherwise
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024; // 100MB

/// Configuration for a viewer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Maximum payload size in bytes.
    ///
    /// The server sends each file as a single frame, so this caps both the
    /// message and the frame size.
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_max_message_mb(max_message_size_mb: usize) -> Self {
        Self {
            max_message_size: max_message_size_mb * 1024 * 1024,
        }
    }

    fn websocket(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

/// Statistics about received data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub payloads_received: u64,
    pub bytes_received: u64,
}

/// An open connection to a broadcaster
pub struct MeshStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    stats: StreamStats,
}

impl MeshStream {
    /// Connect and announce ourselves with a greeting
    pub async fn connect(url: &str, config: &ClientConfig) -> Result<Self, ConnectionError> {
        debug!(
            "Connecting to {} (max message size {} bytes)",
            url, config.max_message_size
        );
        let handshake = connect_async_with_config(url, Some(config.websocket()), false);
        let (mut socket, _response) = handshake.await?;
        socket.send(Message::Text(GREETING.into())).await?;
        info!("Connected to {}", url);

        Ok(Self {
            socket,
            stats: StreamStats::default(),
        })
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Wait for the next binary message.
    ///
    /// Returns `Ok(None)` once the server closes the connection. Text and
    /// control frames are skipped.
    pub async fn next_payload(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Binary(data) => {
                    let payload = Bytes::from(data);
                    self.stats.payloads_received += 1;
                    self.stats.bytes_received += payload.len() as u64;
                    debug!("Received payload of {} bytes", payload.len());
                    return Ok(Some(payload));
                }
                Message::Text(text) => debug!("Ignoring text message: {:?}", text),
                Message::Close(frame) => {
                    debug!("Server closed connection: {:?}", frame);
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> Result<(), ConnectionError> {
        self.socket.close(None).await?;
        Ok(())
    }
}

/// What the background transport reports
#[derive(Debug)]
pub enum TransportEvent {
    Connected { url: String },
    Payload(Bytes),
    /// The connection ended; `None` means an orderly close
    Closed(Option<ConnectionError>),
}

/// Run a [`MeshStream`] on its own thread and hand events over a channel.
///
/// The thread drives a current-thread tokio runtime so that callers without
/// an async runtime (such as a Bevy app) can poll the receiver each frame.
/// The connection is not retried once it ends.
pub fn spawn_transport(
    url: impl Into<String>,
    config: ClientConfig,
) -> (Receiver<TransportEvent>, thread::JoinHandle<()>) {
    let url = url.into();
    let (tx, rx) = unbounded();

    let handle = thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = tx.send(TransportEvent::Closed(Some(e.into())));
                return;
            }
        };

        let outcome = runtime.block_on(pump(&url, &config, &tx));
        if let Err(e) = &outcome {
            warn!("Connection to {} ended: {}", url, e);
        }
        let _ = tx.send(TransportEvent::Closed(outcome.err()));
    });

    (rx, handle)
}

async fn pump(
    url: &str,
    config: &ClientConfig,
    tx: &Sender<TransportEvent>,
) -> Result<(), ConnectionError> {
    let mut stream = MeshStream::connect(url, config).await?;
    if tx
        .send(TransportEvent::Connected {
            url: url.to_string(),
        })
        .is_err()
    {
        return Ok(());
    }

    while let Some(payload) = stream.next_payload().await? {
        if tx.send(TransportEvent::Payload(payload)).is_err() {
            debug!("Transport receiver dropped, closing connection");
            return stream.close().await;
        }
    }

    info!(
        "Server closed connection after {} payloads",
        stream.stats().payloads_received
    );
    Ok(())
}

/// Connect and feed every payload through `pipeline` into `display`.
///
/// `on_update` sees the outcome of each payload and returns `false` to stop.
/// Undecodable payloads are reported but do not end the loop. Returns the
/// number of payloads processed.
pub async fn run_pipeline<D, F>(
    url: &str,
    config: &ClientConfig,
    pipeline: &mut ModelPipeline<D::Handle>,
    display: &mut D,
    mut on_update: F,
) -> Result<u64, ConnectionError>
where
    D: SceneDisplay,
    F: FnMut(&Result<ModelSummary, DecodeError>) -> bool,
{
    let mut stream = MeshStream::connect(url, config).await?;
    let mut processed = 0;

    while let Some(payload) = stream.next_payload().await? {
        let outcome = pipeline.apply(display, &payload);
        processed += 1;
        if !on_update(&outcome) {
            if let Err(e) = stream.close().await {
                debug!("Error while closing {}: {}", url, e);
            }
            break;
        }
    }

    Ok(processed)
}

//! HTTP/WebSocket front end of the broadcaster

use crate::config::{ConfigError, ServerConfig};
use crate::hub::{Hub, HubEvent, HubSender};
use crate::registry::{ConnectionHandle, ConnectionId};
use crate::watcher::{FileWatcher, MeshFileReader, WatchError};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Errors that stop the server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to start file watcher: {0}")]
    Watch(#[from] WatchError),

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
struct AppState {
    hub: HubSender,
}

/// Build the router: the WebSocket endpoint plus optional static assets
pub fn router(config: &ServerConfig, hub: HubSender) -> Router {
    let router = Router::new()
        .route(&config.ws_path, get(ws_handler))
        .with_state(AppState { hub });

    let router = match &config.static_root {
        Some(root) => {
            info!("Serving static files from {:?}", root);
            router.fallback_service(ServeDir::new(root))
        }
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state.hub))
}

/// Pump one viewer connection until either side goes away
async fn handle_socket(socket: WebSocket, peer: SocketAddr, hub: HubSender) {
    let id = ConnectionId::new();
    let (handle, mut outbound) = ConnectionHandle::channel(Some(peer));
    if hub.send(HubEvent::Connected { id, handle }).is_err() {
        debug!("Hub is gone, dropping connection from {}", peer);
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = sender.send(Message::Binary(payload)).await {
                        debug!("Send to {} failed: {}", id, e);
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = hub.send(HubEvent::MessageReceived {
                        id,
                        text: text.as_str().to_owned(),
                    });
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Receive from {} failed: {}", id, e);
                    break;
                }
            },
        }
    }

    // Close the queue before reporting so broadcasts already see it as closed
    drop(outbound);
    let _ = hub.send(HubEvent::Disconnected { id });
}

/// Resolves once Ctrl-C is received
pub async fn ctrl_c_shutdown() {
    shutdown_on(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. If the signal cannot be installed this never
/// resolves, so the server keeps running until the process is killed.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

/// A bound, not yet running broadcaster
pub struct WavecastServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl WavecastServer {
    /// Validate the config and bind the listening socket
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            config,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run until the process is stopped
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Run the watcher, reader, hub and HTTP server until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (hub_tx, hub_rx) = mpsc::unbounded_channel();
        let (read_tx, read_rx) = mpsc::unbounded_channel();

        // Nothing is spawned until the watcher is up, so a failure here leaks no tasks
        let _watcher = FileWatcher::spawn(
            &self.config.watch_path,
            self.config.debounce(),
            hub_tx.clone(),
        )?;

        let reader = MeshFileReader::new(&self.config.watch_path, read_rx, hub_tx.clone());
        let reader_task = tokio::spawn(reader.run());
        let hub_task = tokio::spawn(Hub::new(hub_rx, read_tx).run());

        let app = router(&self.config, hub_tx.clone());
        info!(
            "Broadcasting {:?} on ws://{}{}",
            self.config.watch_path, self.local_addr, self.config.ws_path
        );

        let result = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        let _ = hub_tx.send(HubEvent::Shutdown);
        match hub_task.await {
            Ok(stats) => info!(
                "Served {} connections, {} broadcasts, {} read failures",
                stats.connections_total, stats.broadcasts, stats.read_failures
            ),
            Err(e) => error!("Hub task failed: {}", e),
        }
        reader_task.abort();

        result.map_err(ServerError::Serve)
    }
}

//! Live mesh broadcasting over WebSockets
//!
//! The server side watches one STL file and sends its full contents to every
//! connected viewer each time it changes, and to each new viewer on connect.
//! The client side receives those payloads and can drive a
//! [`wavecast_mesh::ModelPipeline`] from them.

pub mod client;
pub mod config;
pub mod hub;
pub mod registry;
pub mod server;
pub mod watcher;

// Re-export commonly used types
pub use client::{
    run_pipeline, spawn_transport, ClientConfig, ConnectionError, MeshStream, StreamStats,
    TransportEvent, DEFAULT_MAX_MESSAGE_SIZE, GREETING,
};
pub use config::{ConfigError, ServerArgs, ServerConfig};
pub use hub::{Hub, HubEvent, HubSender, HubStats, ReadRequest, ReadTarget};
pub use registry::{BroadcastReport, ClientRegistry, ConnectionHandle, ConnectionId};
pub use server::{ctrl_c_shutdown, router, ServerError, WavecastServer};
pub use watcher::{read_mesh_file, FileReadError, FileWatcher, MeshFileReader, WatchError};

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

//! Receiving meshes from a server (or a local file) and swapping them in

use bevy::prelude::*;
use crossbeam_channel::{Receiver, TryRecvError};
use std::path::PathBuf;
use wavecast_mesh::{ModelPipeline, ModelSummary};
use wavecast_network::{spawn_transport, ClientConfig, TransportEvent};

use crate::display::{BevyDisplay, ModelMaterials};

pub struct MeshStreamPlugin;

impl Plugin for MeshStreamPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelMaterials>()
            .init_resource::<Transport>()
            .init_resource::<ViewerPipeline>()
            .init_resource::<ConnectionStatus>()
            .add_message::<ModelReplaced>()
            .add_systems(Startup, start_mesh_source)
            .add_systems(Update, poll_transport);
    }
}

/// Where meshes come from
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub enum MeshSource {
    /// Live updates from a wavecast server
    Server { url: String, config: ClientConfig },
    /// A single local file, shown once
    File(PathBuf),
}

/// State of the server connection
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// The connection ended, with the error if it was not an orderly close
    Closed(Option<String>),
}

/// Receiving end of the background transport thread
#[derive(Resource, Default)]
pub struct Transport {
    receiver: Option<Receiver<TransportEvent>>,
}

impl Transport {
    pub fn new(receiver: Receiver<TransportEvent>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

/// The pipeline holding the currently displayed model root
#[derive(Resource, Default)]
pub struct ViewerPipeline(pub ModelPipeline<Entity>);

/// Written each time a new model replaces the displayed one
#[derive(Message, Debug, Clone)]
pub struct ModelReplaced {
    pub root: Entity,
    pub summary: ModelSummary,
}

/// Run one payload through the pipeline, announcing the result on success
pub fn apply_payload(
    pipeline: &mut ViewerPipeline,
    display: &mut BevyDisplay,
    replaced: &mut MessageWriter<ModelReplaced>,
    payload: &[u8],
) -> bool {
    // Decode failures are logged by the pipeline; the old model stays up
    let Ok(summary) = pipeline.0.apply(display, payload) else {
        return false;
    };
    if let Some(&root) = pipeline.0.current() {
        replaced.write(ModelReplaced { root, summary });
    }
    true
}

fn start_mesh_source(
    source: Option<Res<MeshSource>>,
    mut transport: ResMut<Transport>,
    mut status: ResMut<ConnectionStatus>,
    mut pipeline: ResMut<ViewerPipeline>,
    mut display: BevyDisplay,
    mut replaced: MessageWriter<ModelReplaced>,
    mut exit: MessageWriter<AppExit>,
) {
    let Some(source) = source else {
        warn!("No mesh source configured");
        return;
    };

    match &*source {
        MeshSource::Server { url, config } => {
            info!("Connecting to {}", url);
            // The thread ends on its own once the connection closes
            let (receiver, _handle) = spawn_transport(url.clone(), config.clone());
            *transport = Transport::new(receiver);
            *status = ConnectionStatus::Connecting;
        }
        MeshSource::File(path) => match std::fs::read(path) {
            Ok(bytes) => {
                info!("Showing {:?}", path);
                if !apply_payload(&mut pipeline, &mut display, &mut replaced, &bytes) {
                    error!("{:?} is not a readable STL file", path);
                }
            }
            Err(e) => {
                error!("Failed to read {:?}: {}", path, e);
                exit.write(AppExit::error());
            }
        },
    }
}

/// Drain everything the transport has delivered since the last frame.
///
/// Payloads are applied in arrival order; none are skipped.
pub fn poll_transport(
    mut transport: ResMut<Transport>,
    mut status: ResMut<ConnectionStatus>,
    mut pipeline: ResMut<ViewerPipeline>,
    mut display: BevyDisplay,
    mut replaced: MessageWriter<ModelReplaced>,
) {
    let Some(receiver) = &transport.receiver else {
        return;
    };

    let mut finished = false;
    loop {
        match receiver.try_recv() {
            Ok(TransportEvent::Connected { url }) => {
                info!("Connected to {}", url);
                *status = ConnectionStatus::Connected;
            }
            Ok(TransportEvent::Payload(payload)) => {
                apply_payload(&mut pipeline, &mut display, &mut replaced, &payload);
            }
            Ok(TransportEvent::Closed(reason)) => {
                match &reason {
                    Some(e) => error!("Connection lost: {}", e),
                    None => info!("Server closed the connection"),
                }
                *status = ConnectionStatus::Closed(reason.map(|e| e.to_string()));
                finished = true;
                break;
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                finished = true;
                break;
            }
        }
    }

    if finished {
        transport.receiver = None;
    }
}

//! Bevy front end for wavecast
//!
//! Shows whatever mesh a `wavecast-server` broadcasts, replacing the model
//! each time a new file arrives.

pub mod camera;
pub mod cli;
pub mod display;
pub mod network;

pub use camera::{orbit_camera_controller, OrbitCamera};
pub use display::{BevyDisplay, LiveModel, ModelMaterials, ModelPart, CLEAR_COLOR};
pub use network::{
    ConnectionStatus, MeshSource, MeshStreamPlugin, ModelReplaced, Transport, ViewerPipeline,
};

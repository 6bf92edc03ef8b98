use bevy::log::{Level, LogPlugin};
use bevy::prelude::*;
use bevy::winit::{UpdateMode, WinitSettings};
use std::time::Duration;
use wavecast_network::ClientConfig;

use wavecast::cli::Args;
use wavecast::{orbit_camera_controller, MeshSource, MeshStreamPlugin, OrbitCamera, CLEAR_COLOR};

/// How often the app wakes up to look for new meshes when nothing else happens
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() {
    let args = Args::parse_args();

    let source = match &args.file {
        Some(path) => MeshSource::File(path.clone()),
        None => MeshSource::Server {
            url: args.server_url.clone(),
            config: ClientConfig::with_max_message_mb(args.max_message_mb),
        },
    };

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    App::new()
        .add_plugins(DefaultPlugins.set(LogPlugin { level, ..default() }))
        // Draw on demand: input, window events, RequestRedraw, or the poll timer
        .insert_resource(WinitSettings {
            focused_mode: UpdateMode::reactive(POLL_INTERVAL),
            unfocused_mode: UpdateMode::reactive_low_power(POLL_INTERVAL),
            ..default()
        })
        .insert_resource(ClearColor(CLEAR_COLOR))
        .insert_resource(source)
        .add_plugins(MeshStreamPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, orbit_camera_controller)
        .run();
}

fn setup(mut commands: Commands) {
    let orbit = OrbitCamera::default();
    commands.spawn((Camera3d::default(), orbit.transform(), orbit));
}

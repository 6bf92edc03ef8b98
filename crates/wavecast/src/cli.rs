use bevy::prelude::Resource;
use clap::Parser;
use std::path::PathBuf;

/// Default server endpoint, matching `wavecast-server`'s defaults
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3000/ws";

#[derive(Parser, Debug, Resource)]
#[command(name = "wavecast")]
#[command(about = "Live viewer for STL meshes pushed over a WebSocket", long_about = None)]
pub struct Args {
    /// WebSocket URL of a wavecast server
    #[arg(short, long, default_value = DEFAULT_SERVER_URL, value_name = "URL")]
    pub server_url: String,

    /// Largest mesh the viewer accepts from the server, in MB
    #[arg(long, default_value_t = 100, value_name = "MB")]
    pub max_message_mb: usize,

    /// Show a local STL file once instead of connecting to a server
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_local_server() {
        let args = Args::try_parse_from(["wavecast"]).unwrap();
        assert_eq!(args.server_url, DEFAULT_SERVER_URL);
        assert!(args.file.is_none());
        assert_eq!(args.max_message_mb, 100);
        assert!(!args.verbose);
    }

    #[test]
    fn test_file_mode() {
        let args = Args::try_parse_from(["wavecast", "--file", "part.stl", "-v"]).unwrap();
        assert_eq!(args.file, Some(PathBuf::from("part.stl")));
        assert!(args.verbose);
    }

    #[test]
    fn test_max_message_mb() {
        let args = Args::try_parse_from(["wavecast", "--max-message-mb", "512"]).unwrap();
        assert_eq!(args.max_message_mb, 512);
    }
}

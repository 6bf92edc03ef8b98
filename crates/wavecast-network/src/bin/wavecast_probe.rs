use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use wavecast_mesh::{HeadlessDisplay, ModelPipeline};
use wavecast_network::{run_pipeline, ClientConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Connect to a wavecast server and report every mesh it sends"
)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short, long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Largest payload to accept, in MB
    #[arg(long, default_value_t = 100)]
    max_message_mb: usize,

    /// Stop after this many payloads
    #[arg(short, long)]
    count: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut display = HeadlessDisplay::new();
    let mut pipeline = ModelPipeline::default();
    let config = ClientConfig::with_max_message_mb(args.max_message_mb);
    let mut seen = 0u64;

    let result = run_pipeline(&args.url, &config, &mut pipeline, &mut display, |outcome| {
        seen += 1;
        match outcome {
            Ok(summary) => {
                info!(
                    "Update {}: {} vertices, {} triangles, {} edges ({} duplicates merged)",
                    seen,
                    summary.vertices,
                    summary.triangles,
                    summary.edges,
                    summary.duplicates_removed
                );
                if let Some(bounds) = &summary.bounds {
                    let (center, size) = (bounds.center(), bounds.size());
                    debug!("Update {}: centre {:?}, size {:?}", seen, center, size);
                }
            }
            Err(e) => warn!("Update {}: undecodable payload: {}", seen, e),
        }
        args.count.map_or(true, |count| seen < count)
    })
    .await;

    match result {
        Ok(processed) => {
            let stats = pipeline.stats();
            info!(
                "Processed {} payloads ({} displayed, {} rejected)",
                processed, stats.applied, stats.rejected
            );
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

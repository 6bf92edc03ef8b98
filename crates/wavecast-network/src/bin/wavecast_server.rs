use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wavecast_network::{ctrl_c_shutdown, ServerArgs, WavecastServer};

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse_args();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let server = match WavecastServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", server.local_addr());

    if let Err(e) = server.serve_with_shutdown(ctrl_c_shutdown()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

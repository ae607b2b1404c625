use clap::Parser;
use log::{error, info};
use server::arena::Arena;
use server::config::{DeathPolicy, ServerConfig};
use server::network::{Server, ServerError};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Snapshots broadcast per second
    #[arg(short, long, default_value = "20")]
    snapshot_rate: u32,

    /// Maximum concurrent players
    #[arg(short, long, default_value = "16")]
    max_players: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    timeout_secs: u64,

    /// What happens when a player's health reaches zero
    #[arg(long, value_enum, default_value_t = DeathPolicy::Respawn)]
    death_policy: DeathPolicy,

    /// JSON file with the arena's wall rectangles
    #[arg(short, long)]
    walls: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            tick_rate: self.tick_rate,
            snapshot_rate: self.snapshot_rate,
            max_players: self.max_players,
            timeout: Duration::from_secs(self.timeout_secs),
            death_policy: self.death_policy,
            walls_file: self.walls,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();

    let arena = match &config.walls_file {
        Some(path) => {
            let arena = Arena::from_json_file(path)?;
            info!("Loaded {} walls from {}", arena.walls.len(), path.display());
            arena
        }
        None => Arena::default_arena(),
    };

    info!(
        "Starting server on {} ({} players max, death policy {:?})",
        config.bind_address(),
        config.max_players,
        config.death_policy
    );

    let mut server = Server::new(config, arena).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                handle.stop();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await
}

use clap::Parser;
use log::{error, info};
use server::network::{BoxError, Server, ServerConfig};
use shared::{DEFAULT_GRID_SIZE, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative Connect Dots game server")]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Dots along each side of the board
    #[arg(short, long, default_value_t = DEFAULT_GRID_SIZE)]
    grid_size: u32,

    /// Players to seat before the game starts (at most 4)
    #[arg(short, long, default_value = "2")]
    max_players: usize,

    /// Give up on a client write after this many milliseconds
    #[arg(long, default_value = "2000")]
    write_timeout_ms: u64,

    /// Tell a player why their move was refused
    #[arg(long)]
    notify_rejections: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        grid_size: args.grid_size,
        max_players: args.max_players,
        write_timeout: Duration::from_millis(args.write_timeout_ms),
        notify_rejections: args.notify_rejections,
        ..ServerConfig::default()
    };

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return Err(e);
        }
    };

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

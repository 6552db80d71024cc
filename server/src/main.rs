use clap::Parser;
use env_logger::Env;
use log::info;
use server::config::ServerConfig;
use server::names::RandomNames;
use server::network::Server;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, then runs the relay server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8090")]
        port: u16,
        /// Delay before a new session and its peers are introduced (ms)
        #[clap(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
        announce_delay_ms: u64,
        /// Interval of the presence heartbeat (ms)
        #[clap(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
        reannounce_ms: u64,
        /// Interval of each session's collision scan (ms)
        #[clap(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..))]
        collision_ms: u64,
    }

    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig {
        announce_delay: Duration::from_millis(args.announce_delay_ms),
        reannounce_interval: Duration::from_millis(args.reannounce_ms),
        collision_interval: Duration::from_millis(args.collision_ms),
        ..ServerConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config, Box::new(RandomNames)).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

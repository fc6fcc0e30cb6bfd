use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use huddle_core::{DEFAULT_STUN_URLS, IceServerConfig};
use huddle_server::ServerConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Signaling relay for small mesh video calls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "HUDDLE_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    #[arg(long, env = "HUDDLE_HEARTBEAT_SECS", default_value_t = 15)]
    heartbeat_secs: u64,

    /// Heartbeat intervals of silence before a session is dropped (at least 2).
    #[arg(long, env = "HUDDLE_MISSED_HEARTBEATS", default_value_t = 2)]
    missed_heartbeats: u32,

    /// STUN servers announced to clients; comma separated in the environment.
    #[arg(long = "stun", env = "HUDDLE_STUN_URLS", value_delimiter = ',')]
    stun_urls: Vec<String>,

    #[arg(long, env = "TURN_URL")]
    turn_url: Option<String>,

    #[arg(long, env = "TURN_USERNAME", requires = "turn_url")]
    turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL", requires = "turn_url")]
    turn_credential: Option<String>,

    /// Used when RUST_LOG is not set.
    #[arg(long, env = "HUDDLE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl ServeArgs {
    fn ice_servers(&self) -> Vec<IceServerConfig> {
        let mut servers: Vec<IceServerConfig> = if self.stun_urls.is_empty() {
            DEFAULT_STUN_URLS
                .iter()
                .map(|url| IceServerConfig::stun(*url))
                .collect()
        } else {
            self.stun_urls
                .iter()
                .map(|url| url.trim())
                .filter(|url| !url.is_empty())
                .map(IceServerConfig::stun)
                .collect()
        };

        if let Some(url) = &self.turn_url {
            servers.push(IceServerConfig {
                urls: vec![url.clone()],
                username: self.turn_username.clone(),
                credential: self.turn_credential.clone(),
            });
        }
        servers
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_bind_addr(self.bind)
            .with_heartbeat(
                Duration::from_secs(self.heartbeat_secs.max(1)),
                self.missed_heartbeats,
            )
            .with_ice_servers(self.ice_servers())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.server_config();
    print_banner(&config);

    huddle_server::serve(config, shutdown_signal()).await?;

    info!("Relay stopped");
    Ok(())
}

fn print_banner(config: &ServerConfig) {
    let addr = config.bind_addr;
    println!("{}", "📡 Huddle relay starting".green().bold());
    println!("   🔌 WebSocket: ws://{addr}/ws?roomId=..&participantId=..");
    println!("   📊 Status:    http://{addr}/status");
    println!("   🏠 Rooms:     http://{addr}/rooms");
    println!(
        "   💓 Heartbeat: every {:?}, stale after {:?}",
        config.heartbeat_interval,
        config.stale_after()
    );
    for server in &config.ice_servers {
        println!("   🧊 ICE:       {}", server.urls.join(", ").cyan());
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
    }
}

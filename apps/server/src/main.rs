//! Parley chat server entry point.

mod config;

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use parley_relay::ChatServer;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TCP port to listen on (overrides the config file).
    port: Option<u16>,

    /// Address to bind (overrides the config file).
    #[arg(long)]
    bind: Option<IpAddr>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting Parley server");

    let config = config::resolve(args.config.as_deref(), args.port, args.bind)?;
    let server = ChatServer::new(config);

    let runner = server.clone();
    let mut task = tokio::spawn(async move { runner.run().await });

    let finished = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("interrupt received");
            server.shutdown();
            None
        }
        result = &mut task => Some(result),
    };
    match finished {
        Some(result) => result??,
        None => task.await??,
    }

    tracing::info!("server shut down cleanly");
    Ok(())
}

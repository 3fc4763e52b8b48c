//! Mock Route Server - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use mock_route_server::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_ROUTES_FILE};
use mock_route_server::{MockServer, ServerSettings};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mock-route-server",
    about = "Declarative HTTP mock server with simulated latency",
    version
)]
struct Args {
    /// Path to the route definitions [env: MOCK_ROUTES_FILE]
    #[arg(long, default_value = DEFAULT_ROUTES_FILE)]
    routes_file: PathBuf,

    /// Host address the server listens to [env: MOCK_SERVER_HOST]
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port the server listens to [env: MOCK_SERVER_PORT]
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log every route definition while loading [env: MOCK_SERVER_VERBOSE]
    #[arg(long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print the example route file and exit
    #[arg(long)]
    print_routes: bool,

    /// Validate the route file and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_routes {
        println!("{}", include_str!("../example.routes.json"));
        return Ok(());
    }

    // Environment variables override flags
    let settings = ServerSettings {
        routes_file: args.routes_file,
        host: args.host,
        port: args.port,
        verbose: args.verbose,
    }
    .with_env_overrides(|name| std::env::var(name).ok())?;

    // Initialize logging
    let max_level = if settings.verbose {
        args.log_level.max(Level::DEBUG)
    } else {
        args.log_level
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        routes_file = %settings.routes_file.display(),
        host = %settings.host,
        port = settings.port,
        verbose = settings.verbose,
        "Configuration resolved"
    );

    let server = MockServer::from_settings(&settings)?;

    if args.validate {
        println!(
            "Route file is valid ({} routes registered)",
            server.route_count()
        );
        return Ok(());
    }

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    server.run(listener).await?;

    Ok(())
}

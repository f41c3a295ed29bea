mod config;
mod models_cmd;
mod status_cmd;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coldmail_gateway::{build_router, start_server, AppState};
use coldmail_inference::HttpProviderFactory;
use coldmail_logging::{init_logger, redact_sensitive_data};
use coldmail_store::Store;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use config::Config;

#[derive(Parser)]
#[command(name = "coldmail")]
#[command(about = "ColdMail: AI cold-outreach assistant backed by a local or hosted LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show the status of a running server
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List models on the configured inference endpoint
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logger(config.log_dir.as_deref(), &config.log_level);

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                ..config
            };
            run_server(config).await?;
        }
        Commands::Status { port } => status_cmd::run(port.unwrap_or(config.port)).await?,
        Commands::Models => models_cmd::run(&config.inference()).await?,
    }

    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let inference = config.inference();
    info!(
        port = config.port,
        bind = %config.bind_address,
        db = %config.db_path,
        base_url = %redact_sensitive_data(&inference.base_url),
        model = %inference.model,
        protocol = %inference.protocol,
        "Starting ColdMail"
    );
    if config.paystack_secret_key.is_none() {
        warn!("PAYSTACK_SECRET_KEY not set; payment webhooks will be rejected");
    }

    let store = Arc::new(Store::open(&config.db_path)?);
    let state = Arc::new(AppState::new(
        store,
        Arc::new(HttpProviderFactory::new()),
        inference,
        config.paystack_secret_key.clone(),
    ));

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;

    start_server(addr, app).await
}

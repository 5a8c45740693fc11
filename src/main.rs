use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricegate::config::PricegateConfig;
use pricegate::server::{PriceCatalog, Server};

/// Rate-limited UDP price lookup service.
#[derive(Parser, Debug)]
#[command(name = "pricegate", version, about)]
struct Args {
    /// Path to a configuration file (YAML or TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// UDP port to listen on, overriding the configured address
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a YAML price catalog
    #[arg(long)]
    catalog: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    match args.log_format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    info!("Starting Pricegate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = PricegateConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.bind_addr.set_port(port);
    }
    if let Some(catalog) = args.catalog {
        config.server.catalog_path = Some(catalog);
    }
    info!(bind_addr = %config.server.bind_addr, "Configuration loaded");

    let catalog = match config.server.catalog_path.as_deref() {
        Some(path) => PriceCatalog::from_file(path)?,
        None => PriceCatalog::default(),
    };

    let server = Server::new(config, catalog);
    server.run_with_shutdown(shutdown_signal()).await?;

    info!("Pricegate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

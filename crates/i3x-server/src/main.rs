//! The I3X server binary: parses a `--config` TOML file, wires the
//! configured data source(s) into the graph/subscription engines, and
//! serves the HTTP API of spec.md §6.

mod app;
mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use app::Runtime;
use config::ServerConfig;

#[derive(Parser)]
#[command(about = "I3X protocol-mediating server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file describing data sources and routing.
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Overrides the bind address from the config file.
    #[arg(long, value_name = "HOST:PORT")]
    bind: Option<String>,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let runtime = Runtime::start(&config).await.context("starting data source(s)")?;
    let state = i3x_api::AppState::new(runtime.graph.clone(), runtime.subscriptions.clone());
    let router = i3x_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "i3x-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    runtime.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

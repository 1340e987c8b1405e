//! code-executor-daemon - HTTP front end for the execution engine
//!
//! Endpoints:
//! - `GET /health` liveness probe
//! - `POST /execute` run a submission, answer with the execution result

use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod server;

use config::DaemonConfig;

/// Sandboxed Python execution service
#[derive(Parser, Debug)]
#[command(name = "code-executor-daemon")]
#[command(version)]
struct Args {
    /// Port to listen on
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    host: Option<IpAddr>,

    /// Interpreter used for workers
    #[arg(long)]
    python: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = DaemonConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(python) = args.python {
        config.executor.python_path = python.into();
    }

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        python = %config.executor.python_path.display(),
        timeout_secs = config.executor.default_timeout.as_secs(),
        max_timeout_secs = config.executor.max_timeout.as_secs(),
        memory_mb = config.executor.memory_limit_mb(),
        "code executor listening"
    );
    tracing::info!("health check: GET http://{addr}/health");
    tracing::info!("execute code: POST http://{addr}/execute");

    server::run(listener, config, shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

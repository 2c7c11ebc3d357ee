//! opensrc binary entry point: parse CLI flags, load layered config,
//! initialize logging, bootstrap the `App`, and serve the MCP
//! `execute` tool over stdio until the transport closes or a shutdown
//! signal arrives (spec §4.8).

use clap::Parser;
use opensrc_infrastructure::ConfigLoader;
use opensrc_infrastructure::logging::init_logging;
use opensrc_infrastructure::paths::resolve_data_dir;
use opensrc_server::{App, OpensrcServer};
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use std::path::PathBuf;
use std::process::ExitCode;

/// opensrc — fetch and search third-party source code from an agent script.
#[derive(Debug, Parser)]
#[command(name = "opensrc", version, about)]
struct Cli {
    /// Path to an `opensrc.toml` config file; defaults to `./opensrc.toml`
    /// if present, otherwise built-in defaults layered with `OPENSRC_*` env vars.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the data directory (packages, repos, index, logs).
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("opensrc: configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir;
    }

    let data_dir = resolve_data_dir(config.data_dir.clone());
    let _log_guard = match init_logging(&data_dir.join("logs"), &config.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("opensrc: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), data_dir = %data_dir.display(), "starting opensrc");

    let app = match App::bootstrap(config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to bootstrap app");
            return ExitCode::FAILURE;
        }
    };

    let server = OpensrcServer::new(app.clone());
    let running = match server.serve(stdio()).await {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(error = %e, "failed to start MCP transport");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = running.waiting() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "MCP transport ended with an error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Err(e) = app.shutdown().await {
        tracing::error!(error = %e, "error during shutdown");
    }
    tracing::info!("opensrc shut down");
    ExitCode::SUCCESS
}

/// Resolves once SIGINT or (on Unix) SIGTERM is received, so a process
/// manager's graceful-stop signal persists the manifest before exit
/// just like a Ctrl-C does (spec §4.8).
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

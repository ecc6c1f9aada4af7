// EMAP Runner - configuration templating and validation runs for EMAP
// Copyright (c) 2025 EMAP Contributors
// Licensed under the MIT License

use clap::Parser;
use emap_runner::cli::{Cli, Commands};
use emap_runner::config::LoggingConfig;
use emap_runner::logging::init_logging;
use std::process;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Optional; a missing .env is ignored
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    let logging_config = match &cli.log_dir {
        Some(dir) => LoggingConfig {
            local_enabled: true,
            local_path: dir.clone(),
            ..Default::default()
        },
        None => LoggingConfig::default(),
    };
    let logging_guard = match init_logging(log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.filename,
        "EMAP runner"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown_signal(shutdown_tx.clone()));

    let exit_code = match execute_command(&cli, shutdown_rx).await {
        Ok(code) => code,
        Err(e) => {
            emap_runner::log_error_with_context!(e, "Command execution failed");
            eprintln!("Error: {e}");
            5
        }
    };

    drop(shutdown_tx);
    drop(logging_guard);
    process::exit(exit_code);
}

/// Sends `true` on the channel on SIGINT or SIGTERM
async fn forward_shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT (Ctrl+C), stopping");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, stopping");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received SIGINT (Ctrl+C), stopping");
    }

    let _ = shutdown_tx.send(true);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, shutdown_signal: watch::Receiver<bool>) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Setup(args) => args.execute(&cli.filename, &cli.main_dir).await,
        Commands::Docker(args) => args.execute(&cli.filename, &cli.main_dir).await,
        Commands::Validation(args) => {
            args.execute(&cli.filename, &cli.main_dir, shutdown_signal)
                .await
        }
        Commands::ValidateConfig(args) => args.execute(&cli.filename).await,
    }
}

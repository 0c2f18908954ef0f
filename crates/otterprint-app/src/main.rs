// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// otterprint: local print bridge
//
// Entry point. Initialises logging, loads config, starts the bridge on the
// host's print backend and stops it on Ctrl-C / SIGTERM.

mod config;

use std::process::ExitCode;

use otterprint_platform::platform_directory;
use otterprint_server::LifecycleController;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "otterprint starting");

    let config = config::load();
    let directory = platform_directory(&config);
    let controller = LifecycleController::new(config);

    if let Err(e) = controller.start(directory).await {
        tracing::error!(error = %e, reason = e.reason(), "could not start print bridge");
        return ExitCode::FAILURE;
    }

    wait_for_stop_signal().await;

    match controller.shutdown().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "print bridge did not stop cleanly");
            ExitCode::FAILURE
        }
    }
}

async fn wait_for_stop_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("stop signal received");
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Start/stop control for the bridge listener.
//
// The controller is the only owner of the running server. `start` and
// `shutdown` are its only mutators and both take the same async lock, so a
// start racing a stop always observes a settled state. The lifecycle state
// sits outside that lock so `Starting` and `Draining` stay observable.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use otterprint_core::error::{BridgeError, Result};
use otterprint_core::types::LifecycleState;
use otterprint_core::BridgeConfig;
use otterprint_platform::{PrintDispatcher, PrinterDirectory, platform_dispatcher};

use crate::artifacts::TempArtifactStore;
use crate::routes::{BridgeState, router};

/// Upper bound on draining in-flight requests during shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    stop: Arc<Notify>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Owns the listener and its state machine:
/// `Stopped -> Starting -> Listening -> Draining -> Stopped`.
pub struct LifecycleController {
    config: BridgeConfig,
    dispatcher: Arc<dyn PrintDispatcher>,
    forced_exit: bool,
    state: watch::Sender<LifecycleState>,
    running: Mutex<Option<Running>>,
}

impl LifecycleController {
    /// Controller using the host's print backend.
    pub fn new(config: BridgeConfig) -> Self {
        let dispatcher = platform_dispatcher(&config);
        Self {
            config,
            dispatcher,
            forced_exit: true,
            state: watch::Sender::new(LifecycleState::Stopped),
            running: Mutex::new(None),
        }
    }

    /// Replace the print backend.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn PrintDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Whether a drain timeout terminates the process (the default) or is
    /// returned as `ShutdownTimeout`.
    pub fn with_forced_exit(mut self, forced_exit: bool) -> Self {
        self.forced_exit = forced_exit;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Current state. Never waits on an in-progress start or shutdown.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Receiver that sees every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Address the listener is bound to, while listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }

    /// Open the scratch store, bind and begin serving.
    ///
    /// Calling this while already listening returns the existing address.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the scratch directory cannot be created,
    /// `Bind` if the address is taken. The controller is back in `Stopped`
    /// either way.
    pub async fn start(&self, directory: Arc<dyn PrinterDirectory>) -> Result<SocketAddr> {
        let mut slot = self.running.lock().await;
        if let Some(running) = slot.as_ref() {
            warn!(addr = %running.addr, "bridge already listening");
            return Ok(running.addr);
        }

        self.state.send_replace(LifecycleState::Starting);
        match self.bind_and_serve(directory).await {
            Ok(running) => {
                let addr = running.addr;
                *slot = Some(running);
                self.state.send_replace(LifecycleState::Listening);
                info!(%addr, backend = self.dispatcher.backend_name(), "print bridge listening");
                Ok(addr)
            }
            Err(e) => {
                self.state.send_replace(LifecycleState::Stopped);
                error!(error = %e, "print bridge failed to start");
                Err(e)
            }
        }
    }

    async fn bind_and_serve(&self, directory: Arc<dyn PrinterDirectory>) -> Result<Running> {
        let store = TempArtifactStore::open(self.config.scratch_dir())?;
        if self.config.sweep_scratch_on_start {
            store.sweep()?;
        }

        let requested = self.config.socket_addr();
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|e| BridgeError::Bind(format!("{requested}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| BridgeError::Bind(format!("{requested}: {e}")))?;

        let state = BridgeState {
            store: Arc::new(store),
            dispatcher: self.dispatcher.clone(),
            directory,
        };
        let app = router(state, self.config.max_upload_bytes);

        let stop = Arc::new(Notify::new());
        let signal = stop.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.notified().await })
                .await
        });

        Ok(Running { addr, stop, task })
    }

    /// Stop accepting connections and wait for in-flight requests.
    ///
    /// If they have not finished after [`SHUTDOWN_TIMEOUT`] the server task
    /// is aborted and the process exits with status 1, unless forced exit
    /// was disabled, in which case `ShutdownTimeout` is returned.
    pub async fn shutdown(&self) -> Result<()> {
        let mut slot = self.running.lock().await;
        let Some(mut running) = slot.take() else {
            return Ok(());
        };

        self.state.send_replace(LifecycleState::Draining);
        info!(addr = %running.addr, "print bridge draining");
        running.stop.notify_one();

        let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut running.task).await;
        self.state.send_replace(LifecycleState::Stopped);

        match drained {
            Ok(joined) => settle(joined),
            Err(_) => {
                running.task.abort();
                let err = BridgeError::ShutdownTimeout;
                error!(
                    reason = err.reason(),
                    timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                    "in-flight requests did not drain"
                );
                if self.forced_exit {
                    std::process::exit(1);
                }
                Err(err)
            }
        }
    }
}

/// Fold the finished serve task into the shutdown result. A task that
/// panicked or was cancelled is an error, not a clean stop.
fn settle(joined: std::result::Result<std::io::Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => {
            info!("print bridge stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            warn!(error = %e, "print bridge stopped with an I/O error");
            Err(BridgeError::Io(e))
        }
        Err(e) => {
            error!(error = %e, "print bridge task ended abnormally");
            Err(BridgeError::Io(std::io::Error::other(e)))
        }
    }
}

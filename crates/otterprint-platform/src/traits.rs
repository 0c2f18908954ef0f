// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the host print subsystem.
//
// Request handling only ever sees these two traits; which implementation sits
// behind them is decided once at startup.

use std::path::Path;

use async_trait::async_trait;
use otterprint_core::error::Result;
use otterprint_core::types::{DispatchOutcome, PrintOptions, PrinterDescriptor};

/// Read-only view of the printers installed on the host.
///
/// Implementations may block (spawning `lpstat`, calling into the Windows
/// spooler). Async callers must go through `spawn_blocking`.
pub trait PrinterDirectory: Send + Sync {
    /// Query the host for its current printer list.
    ///
    /// Returns `BridgeError::DiscoveryUnavailable` when the print subsystem
    /// cannot be reached. Results are never cached.
    fn list_printers(&self) -> Result<Vec<PrinterDescriptor>>;
}

/// Hands a staged document to the host's print backend.
#[async_trait]
pub trait PrintDispatcher: Send + Sync {
    /// Short backend label for logs (e.g. "cups-lp").
    fn backend_name(&self) -> &str;

    /// Submit `document` to `printer` and wait for the backend's verdict.
    ///
    /// An empty `printer` is forwarded unchanged; the backend decides
    /// whether that means the system default or a rejection.
    async fn submit(&self, document: &Path, printer: &str, options: &PrintOptions)
    -> DispatchOutcome;
}

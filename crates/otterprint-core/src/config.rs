// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pre-agreed port the web client talks to.
pub const DEFAULT_PORT: u16 = 3001;

/// Name of the bridge's own subdirectory inside the OS temp dir.
pub const SCRATCH_DIR_NAME: &str = "otterprint";

/// Settings read once at startup. Every field has a default so a partial
/// (or missing) config file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// TCP port of the HTTP listener.
    pub port: u16,
    /// Interface to bind. Loopback unless the shell says otherwise.
    pub bind_address: IpAddr,
    /// Where documents are staged. `None` means `<temp dir>/otterprint`.
    pub scratch_dir: Option<PathBuf>,
    /// Remove documents left behind by a previous crash before listening.
    pub sweep_scratch_on_start: bool,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Upper bound on a single backend submission.
    pub dispatch_timeout_secs: u64,
    /// Paper size the Windows backend uses when the caller sets none.
    pub default_paper_size: crate::PaperSize,
    /// CUPS submission command.
    pub lp_program: String,
    /// CUPS status command used for printer discovery.
    pub lpstat_program: String,
    /// Command-line print helper used on Windows.
    pub windows_print_program: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            scratch_dir: None,
            sweep_scratch_on_start: true,
            max_upload_bytes: 64 * 1024 * 1024,
            dispatch_timeout_secs: 120,
            default_paper_size: crate::PaperSize::A4,
            lp_program: "lp".into(),
            lpstat_program: "lpstat".into(),
            windows_print_program: "SumatraPDF.exe".into(),
        }
    }
}

impl BridgeConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    /// Resolved scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(SCRATCH_DIR_NAME))
    }
}

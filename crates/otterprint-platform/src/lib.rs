// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// otterprint platform: host print backends.
//
// Defines the two capabilities the bridge needs from the operating system
// (listing printers, submitting a file) and the Unix / Windows
// implementations. The variant is chosen once, at startup.

mod command;
pub mod traits;
pub mod unix;
pub mod win;

use std::sync::Arc;

use otterprint_core::BridgeConfig;

pub use traits::{PrintDispatcher, PrinterDirectory};
pub use unix::{LpstatDirectory, UnixDispatcher};
#[cfg(windows)]
pub use win::WindowsDirectory;
pub use win::WindowsDispatcher;

/// Dispatcher for the host platform.
pub fn platform_dispatcher(config: &BridgeConfig) -> Arc<dyn PrintDispatcher> {
    if cfg!(windows) {
        Arc::new(WindowsDispatcher::new(
            &config.windows_print_program,
            config.dispatch_timeout(),
            config.default_paper_size,
        ))
    } else {
        Arc::new(UnixDispatcher::new(
            &config.lp_program,
            config.dispatch_timeout(),
        ))
    }
}

/// Printer directory for the host platform.
///
/// Hosting shells with their own enumeration capability pass that to the
/// server instead.
pub fn platform_directory(config: &BridgeConfig) -> Arc<dyn PrinterDirectory> {
    #[cfg(windows)]
    {
        let _ = config;
        Arc::new(WindowsDirectory)
    }
    #[cfg(not(windows))]
    {
        Arc::new(LpstatDirectory::new(&config.lpstat_program))
    }
}

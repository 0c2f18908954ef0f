// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Windows backend.
//
// Submission drives a SumatraPDF-compatible command-line print helper
// (`-print-to <printer> -print-settings <settings> -silent <file>`), which
// renders the document through the installed printer driver. Discovery asks
// the spooler directly through `EnumPrintersW`.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use otterprint_core::types::{DispatchOutcome, PaperSize, PrintOptions};

use crate::command::run_to_outcome;
use crate::traits::PrintDispatcher;

#[cfg(windows)]
pub use spooler::WindowsDirectory;

/// Submits documents through the Windows print helper.
pub struct WindowsDispatcher {
    program: OsString,
    timeout: Duration,
    default_paper: PaperSize,
}

impl WindowsDispatcher {
    pub fn new(
        program: impl Into<OsString>,
        timeout: Duration,
        default_paper: PaperSize,
    ) -> Self {
        Self {
            program: program.into(),
            timeout,
            default_paper,
        }
    }
}

#[async_trait]
impl PrintDispatcher for WindowsDispatcher {
    fn backend_name(&self) -> &str {
        "windows-spooler"
    }

    #[instrument(skip(self, document, options), fields(path = %document.display()))]
    async fn submit(
        &self,
        document: &Path,
        printer: &str,
        options: &PrintOptions,
    ) -> DispatchOutcome {
        let args = print_args(document, printer, options, self.default_paper);
        debug!(?args, "invoking print helper");

        let mut command = Command::new(&self.program);
        command.args(&args);

        let outcome = run_to_outcome(command, self.timeout, "print helper").await;
        match &outcome {
            DispatchOutcome::Succeeded => info!(printer, "spooler accepted job"),
            DispatchOutcome::Failed(reason) => warn!(printer, %reason, "spooler rejected job"),
        }
        outcome
    }
}

/// Build the helper's argument vector. An empty printer selects the system
/// default printer.
pub fn print_args(
    document: &Path,
    printer: &str,
    options: &PrintOptions,
    default_paper: PaperSize,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();

    if printer.is_empty() {
        args.push("-print-to-default".into());
    } else {
        args.push("-print-to".into());
        args.push(printer.into());
    }

    args.push("-print-settings".into());
    args.push(print_settings(options, default_paper).join(",").into());
    args.push("-silent".into());
    args.push(document.as_os_str().to_owned());
    args
}

/// Normalize caller options into `-print-settings` entries.
///
/// The paper size is always set; the configured default applies when the
/// caller leaves it out. Other object keys are passed through as
/// `key=value` (`key` alone for `true`) for the helper to judge.
pub fn print_settings(options: &PrintOptions, default_paper: PaperSize) -> Vec<String> {
    let mut settings: Vec<String> = Vec::new();
    let mut paper: Option<String> = None;

    if let Some(list) = options.as_list() {
        for entry in list.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            if let Some(size) = entry.strip_prefix("paper=") {
                paper = Some(size.to_owned());
            } else {
                settings.push(entry.to_owned());
            }
        }
    } else if let Some(map) = options.as_map() {
        for (key, value) in map {
            match (key.as_str(), value) {
                ("paperSize", Value::String(size)) => paper = Some(size.clone()),
                ("copies", Value::Number(n)) => settings.push(format!("{n}x")),
                ("orientation", Value::String(o)) => settings.push(o.clone()),
                ("side", Value::String(side)) => settings.push(side.clone()),
                ("monochrome", Value::Bool(mono)) => {
                    settings.push(if *mono { "monochrome" } else { "color" }.into());
                }
                ("scale", Value::String(scale)) => settings.push(scale.clone()),
                ("pages", Value::String(pages)) => settings.push(pages.clone()),
                ("bin", Value::String(bin)) => settings.push(format!("bin={bin}")),
                ("bin", Value::Number(bin)) => settings.push(format!("bin={bin}")),
                (_, Value::Null) | (_, Value::Bool(false)) => {}
                (_, Value::Bool(true)) => settings.push(key.clone()),
                (_, Value::String(v)) => settings.push(format!("{key}={v}")),
                (_, other) => {
                    debug!(key, "passing print option through to the helper");
                    settings.push(format!("{key}={other}"));
                }
            }
        }
    }

    let paper = paper.unwrap_or_else(|| default_paper.keyword().to_owned());
    settings.insert(0, format!("paper={paper}"));
    settings
}

#[cfg(windows)]
mod spooler {
    use otterprint_core::error::{BridgeError, Result};
    use otterprint_core::types::PrinterDescriptor;
    use tracing::debug;
    use windows::Win32::Graphics::Printing::{
        EnumPrintersW, GetDefaultPrinterW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL,
        PRINTER_INFO_2W,
    };
    use windows::core::PWSTR;

    use crate::traits::PrinterDirectory;

    const STATUS_PAUSED: u32 = 0x0000_0001;
    const STATUS_ERROR: u32 = 0x0000_0002;
    const STATUS_OFFLINE: u32 = 0x0000_0080;
    const STATUS_PRINTING: u32 = 0x0000_0400;

    /// Enumerates local and connected printers through the spooler.
    pub struct WindowsDirectory;

    impl PrinterDirectory for WindowsDirectory {
        fn list_printers(&self) -> Result<Vec<PrinterDescriptor>> {
            let default = default_printer();
            let mut printers = enum_printers()?;
            for printer in &mut printers {
                printer.is_default = default.as_deref() == Some(printer.name.as_str());
            }
            debug!(count = printers.len(), "spooler listed printers");
            Ok(printers)
        }
    }

    fn wide_to_string(ptr: PWSTR) -> Option<String> {
        if ptr.is_null() {
            return None;
        }
        unsafe { ptr.to_string().ok() }.filter(|s| !s.is_empty())
    }

    fn status_keyword(status: u32) -> &'static str {
        if status & STATUS_OFFLINE != 0 {
            "offline"
        } else if status & STATUS_ERROR != 0 {
            "error"
        } else if status & STATUS_PAUSED != 0 {
            "paused"
        } else if status & STATUS_PRINTING != 0 {
            "printing"
        } else {
            "idle"
        }
    }

    fn enum_printers() -> Result<Vec<PrinterDescriptor>> {
        unsafe {
            let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
            let mut needed: u32 = 0;
            let mut returned: u32 = 0;

            let _ = EnumPrintersW(flags, None, 2, None, &mut needed, &mut returned);
            if needed == 0 {
                return Ok(Vec::new());
            }

            let mut buf: Vec<u8> = vec![0; needed as usize];
            EnumPrintersW(
                flags,
                None,
                2,
                Some(buf.as_mut_slice()),
                &mut needed,
                &mut returned,
            )
            .map_err(|e| BridgeError::DiscoveryUnavailable(format!("EnumPrintersW: {e}")))?;

            let infos = std::slice::from_raw_parts(
                buf.as_ptr() as *const PRINTER_INFO_2W,
                returned as usize,
            );

            Ok(infos
                .iter()
                .filter_map(|info| {
                    let name = wide_to_string(info.pPrinterName)?;
                    let mut printer = PrinterDescriptor::named(name);
                    printer.description = wide_to_string(info.pComment);
                    printer.driver = wide_to_string(info.pDriverName);
                    printer.status = Some(status_keyword(info.Status).into());
                    if let Some(port) = wide_to_string(info.pPortName) {
                        printer.options.insert("port".into(), port);
                    }
                    if let Some(location) = wide_to_string(info.pLocation) {
                        printer.options.insert("location".into(), location);
                    }
                    Some(printer)
                })
                .collect())
        }
    }

    fn default_printer() -> Option<String> {
        unsafe {
            let mut needed: u32 = 0;
            let _ = GetDefaultPrinterW(None, &mut needed);
            if needed == 0 {
                return None;
            }

            let mut buf: Vec<u16> = vec![0; needed as usize];
            if !GetDefaultPrinterW(Some(PWSTR(buf.as_mut_ptr())), &mut needed).as_bool() {
                return None;
            }
            wide_to_string(PWSTR(buf.as_mut_ptr()))
        }
    }
}

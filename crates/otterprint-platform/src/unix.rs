// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS backend for Unix-like hosts (Linux, macOS, BSD).
//
// Submission goes through `lp`, discovery through `lpstat`. Both tools are
// run with the C locale so their output can be parsed.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command as StdCommand;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use otterprint_core::error::{BridgeError, Result};
use otterprint_core::types::{DispatchOutcome, PrintOptions, PrinterDescriptor};

use crate::command::run_to_outcome;
use crate::traits::{PrintDispatcher, PrinterDirectory};

/// Submits documents with `lp`.
pub struct UnixDispatcher {
    program: OsString,
    timeout: Duration,
}

impl UnixDispatcher {
    pub fn new(program: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PrintDispatcher for UnixDispatcher {
    fn backend_name(&self) -> &str {
        "cups-lp"
    }

    #[instrument(skip(self, document, options), fields(path = %document.display()))]
    async fn submit(
        &self,
        document: &Path,
        printer: &str,
        options: &PrintOptions,
    ) -> DispatchOutcome {
        let args = lp_args(document, printer, options);
        debug!(?args, "invoking lp");

        let mut command = Command::new(&self.program);
        command.args(&args).env("LC_ALL", "C");

        let outcome = run_to_outcome(command, self.timeout, "lp").await;
        match &outcome {
            DispatchOutcome::Succeeded => info!(printer, "lp accepted job"),
            DispatchOutcome::Failed(reason) => warn!(printer, %reason, "lp rejected job"),
        }
        outcome
    }
}

/// Build the `lp` argument vector.
///
/// List options are split into shell words, so a quoted value keeps its
/// spaces, and forwarded untouched. Object options become `-o key=value`,
/// except `copies` which maps to `-n`.
pub fn lp_args(document: &Path, printer: &str, options: &PrintOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();

    if !printer.is_empty() {
        args.push("-d".into());
        args.push(printer.into());
    }

    if let Some(tokens) = options.list_tokens() {
        args.extend(tokens.into_iter().map(OsString::from));
    } else if let Some(map) = options.as_map() {
        for (key, value) in map {
            match (key.as_str(), value) {
                (_, Value::Null) | (_, Value::Bool(false)) => {}
                ("copies", Value::Number(n)) => {
                    args.push("-n".into());
                    args.push(n.to_string().into());
                }
                (_, Value::Bool(true)) => {
                    args.push("-o".into());
                    args.push(key.into());
                }
                (_, Value::String(s)) => {
                    args.push("-o".into());
                    args.push(format!("{key}={s}").into());
                }
                (_, other) => {
                    args.push("-o".into());
                    args.push(format!("{key}={other}").into());
                }
            }
        }
    }

    args.push(document.as_os_str().to_owned());
    args
}

/// Enumerates CUPS destinations with `lpstat`.
pub struct LpstatDirectory {
    program: OsString,
}

impl LpstatDirectory {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, flag: &str) -> std::io::Result<std::process::Output> {
        StdCommand::new(&self.program)
            .arg(flag)
            .env("LC_ALL", "C")
            .output()
    }

    fn default_destination(&self) -> Option<String> {
        match self.run("-d") {
            Ok(output) if output.status.success() => {
                parse_default_destination(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(status = %output.status, "lpstat -d reported no default");
                None
            }
            Err(e) => {
                debug!(error = %e, "lpstat -d could not run");
                None
            }
        }
    }
}

impl PrinterDirectory for LpstatDirectory {
    fn list_printers(&self) -> Result<Vec<PrinterDescriptor>> {
        let output = self
            .run("-p")
            .map_err(|e| BridgeError::DiscoveryUnavailable(format!("lpstat could not run: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            // CUPS exits non-zero when there is simply nothing configured.
            if stderr.contains("No destinations added") {
                return Ok(Vec::new());
            }
            return Err(BridgeError::DiscoveryUnavailable(format!(
                "lpstat exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let mut printers = parse_lpstat_printers(&stdout);
        if let Some(default) = self.default_destination() {
            for printer in &mut printers {
                printer.is_default = printer.name == default;
            }
        }
        debug!(count = printers.len(), "lpstat listed printers");
        Ok(printers)
    }
}

/// Parse `lpstat -p` output.
///
/// Each printer starts with a `printer <name> ...` line; indented lines that
/// follow carry the printer's state message.
pub fn parse_lpstat_printers(output: &str) -> Vec<PrinterDescriptor> {
    let mut printers: Vec<PrinterDescriptor> = Vec::new();

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("printer ") {
            let mut parts = rest.splitn(2, ' ');
            let Some(name) = parts.next().filter(|n| !n.is_empty()) else {
                continue;
            };
            let detail = parts.next().unwrap_or("").trim();

            let mut printer = PrinterDescriptor::named(name);
            printer.status = Some(lpstat_state(detail).into());
            if !detail.is_empty() {
                printer.options.insert("printer-state".into(), detail.into());
            }
            printers.push(printer);
        } else if line.starts_with(char::is_whitespace) && !line.trim().is_empty() {
            if let Some(last) = printers.last_mut() {
                last.description = Some(line.trim().to_owned());
            }
        }
    }

    printers
}

fn lpstat_state(detail: &str) -> &'static str {
    if detail.contains("disabled") {
        "disabled"
    } else if detail.contains("now printing") {
        "printing"
    } else if detail.contains("is idle") {
        "idle"
    } else {
        "unknown"
    }
}

/// Parse `lpstat -d` output.
pub fn parse_default_destination(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("system default destination:"))
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
}

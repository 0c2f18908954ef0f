// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Running a backend command line and folding its exit into a DispatchOutcome.

use std::process::Stdio;
use std::time::Duration;

use otterprint_core::types::DispatchOutcome;
use tokio::process::Command;
use tracing::debug;

/// Spawn `command`, wait at most `timeout`, and translate the exit.
///
/// The child is killed if the deadline passes. A non-zero exit becomes
/// `Failed` carrying the backend's stderr (or stdout, or the bare exit
/// status when both are empty).
pub(crate) async fn run_to_outcome(
    mut command: Command,
    timeout: Duration,
    backend: &str,
) -> DispatchOutcome {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return DispatchOutcome::Failed(format!("{backend} could not be started: {e}"));
        }
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return DispatchOutcome::Failed(format!("{backend} failed: {e}")),
        Err(_) => {
            return DispatchOutcome::Failed(format!(
                "{backend} timed out after {}s",
                timeout.as_secs()
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        debug!(backend, stdout = %stdout.trim(), "backend accepted job");
        return DispatchOutcome::Succeeded;
    }

    let reason = [stderr.trim(), stdout.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("{backend} exited with {}", output.status));
    DispatchOutcome::Failed(reason)
}

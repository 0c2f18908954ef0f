// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// otterprint server: the local HTTP print bridge. Accepts documents from a
// browser or desktop shell, stages them in a scratch directory, hands them
// to the host print backend and cleans up afterwards.

pub mod artifacts;
pub mod error;
pub mod lifecycle;
pub mod routes;

pub use artifacts::{TempArtifact, TempArtifactStore};
pub use error::ApiError;
pub use lifecycle::{LifecycleController, SHUTDOWN_TIMEOUT};
pub use routes::{BridgeState, PrintAccepted, router};

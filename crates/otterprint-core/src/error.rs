// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the print bridge.

use thiserror::Error;

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Discovery --
    #[error("printer discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    // -- Request decoding --
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    // -- Scratch storage --
    #[error("scratch directory unavailable: {0}")]
    StorageUnavailable(String),

    #[error("failed to write document: {0}")]
    WriteFailed(String),

    // -- Dispatch --
    #[error("print backend rejected the job: {0}")]
    DispatchRejected(String),

    // -- Lifecycle --
    #[error("in-flight requests did not drain before the shutdown deadline")]
    ShutdownTimeout,

    #[error("failed to bind listener: {0}")]
    Bind(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Stable machine-readable reason code, safe to hand to HTTP callers.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DiscoveryUnavailable(_) => "DISCOVERY_UNAVAILABLE",
            Self::MalformedRequest(_) => "MALFORMED_REQUEST",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::WriteFailed(_) => "WRITE_FAILED",
            Self::DispatchRejected(_) => "DISPATCH_REJECTED",
            Self::ShutdownTimeout => "SHUTDOWN_TIMEOUT",
            Self::Bind(_) => "BIND_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the error was caused by the caller rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedRequest(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

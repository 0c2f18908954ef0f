// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP rendering of bridge errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use otterprint_core::BridgeError;

/// Wrapper that turns a [`BridgeError`] into a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub BridgeError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    reason: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BridgeError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            BridgeError::DiscoveryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = self.0.reason();
        if status.is_server_error() {
            error!(reason, status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(reason, status = status.as_u16(), error = %self.0, "request rejected");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            reason,
        };
        (status, Json(body)).into_response()
    }
}

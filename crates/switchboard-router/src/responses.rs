// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error-to-HTTP mapping at the router boundary.
//!
//! The closed taxonomy maps onto status codes here and nowhere else. Only
//! `bad_request` carries a field-level detail; `internal` logs a
//! correlation id and exposes nothing; `unavailable` hints a retry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use switchboard_core::SwitchboardError;
use tracing::error;

/// Wrapper making [`SwitchboardError`] an axum response.
pub struct ApiError(pub SwitchboardError);

impl From<SwitchboardError> for ApiError {
    fn from(err: SwitchboardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        match &self.0 {
            SwitchboardError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
            }
            SwitchboardError::Forbidden(_) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": code }))).into_response()
            }
            SwitchboardError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": code, "detail": detail })),
            )
                .into_response(),
            SwitchboardError::Conflict(_) => {
                (StatusCode::CONFLICT, Json(json!({ "error": code }))).into_response()
            }
            SwitchboardError::Timeout { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, Json(json!({ "error": code }))).into_response()
            }
            SwitchboardError::Unavailable { .. }
            | SwitchboardError::Storage { .. }
            | SwitchboardError::Transport { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                [("retry-after", "5")],
                Json(json!({ "error": code })),
            )
                .into_response(),
            other => {
                // Everything else is internal; log with a correlation id
                // and expose only the code.
                let correlation_id = uuid::Uuid::new_v4().to_string();
                error!(
                    correlation_id = correlation_id.as_str(),
                    error = %other,
                    "internal error at router boundary"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": code })),
                )
                    .into_response()
            }
        }
    }
}

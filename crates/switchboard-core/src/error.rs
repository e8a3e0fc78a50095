// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard control plane.

use thiserror::Error;

/// The primary error type used across all Switchboard services and stores.
///
/// The first seven variants form the closed user-visible taxonomy; the
/// remaining variants are infrastructure errors that the Request Router
/// translates at the HTTP boundary (`Storage` and `Transport` surface as
/// `unavailable`, everything else as `internal`).
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Missing or invalid credential. Carries no detail about which
    /// validator refused.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but the principal's scope does not cover the request.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Schema violation, oversized payload, or unknown kind. The message is
    /// the field-level cause.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A turn is already in flight for the session.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A deadline elapsed while awaiting a response or a dependency.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Transient dependency failure. Callers may retry.
    #[error("unavailable: {message}")]
    Unavailable { message: String },

    /// Unexpected failure. Never exposes implementation detail to clients.
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration errors (invalid TOML, missing required fields, type
    /// mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Store backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Communication substrate errors (broker unreachable, bad envelope).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Agent runtime errors (invocation failure, malformed reply).
    #[error("runtime error: {message}")]
    Runtime {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Outbound integration delivery errors.
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SwitchboardError {
    /// Stable machine-readable code for the user-visible taxonomy.
    ///
    /// Infrastructure variants collapse onto the closed set so that no
    /// internal identifiers cross the boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable { .. } | Self::Storage { .. } | Self::Transport { .. } => {
                "unavailable"
            }
            Self::Internal(_) | Self::Config(_) | Self::Runtime { .. } | Self::Delivery { .. } => {
                "internal"
            }
        }
    }

    /// Whether a delivery or runtime failure with this error is worth
    /// retrying (network-class and transient-dependency failures are,
    /// semantic failures are not).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. }
                | Self::Timeout { .. }
                | Self::Storage { .. }
                | Self::Transport { .. }
        )
    }
}

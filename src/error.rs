// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine error types shared by the producer, reconciler, and viewer.

use crate::models::push::PushParseError;
use crate::services::location::LocationError;
use crate::store::StoreError;

/// Errors surfaced by the trip engine.
///
/// Delivery failures (`BackendRejected`, `NetworkUnavailable`) are
/// recoverable: the affected sample stays unsynced in the point log and
/// local trip state advances anyway. Everything else aborts the operation
/// that raised it.
#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service is disabled")]
    ServiceDisabled,

    #[error("Backend rejected request: HTTP {status}: {body}")]
    BackendRejected { status: u16, body: String },

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Malformed push payload: {0}")]
    MalformedPush(#[from] PushParseError),

    #[error("No trip is active")]
    TripNotActive,

    #[error("A trip is already active")]
    TripAlreadyActive,

    #[error("Coordinates out of range: lat={latitude}, lon={longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Location source error: {0}")]
    Location(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TripError {
    /// Whether this error is a backend delivery failure.
    ///
    /// Delivery failures never abort a local state transition: the sample
    /// is already durable, so the caller logs the miss and carries on while
    /// the reconciler retries later.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            TripError::BackendRejected { .. } | TripError::NetworkUnavailable(_)
        )
    }
}

impl From<LocationError> for TripError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::PermissionDenied => TripError::PermissionDenied,
            LocationError::ServiceDisabled => TripError::ServiceDisabled,
            LocationError::Unavailable(msg) => TripError::Location(msg),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, TripError>;

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push intake routes for relay events.

use crate::models::PushEvent;
use crate::services::EventOutcome;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Push intake routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/push/{secret}", post(handle_push))
}

/// Handle an incoming push event (POST).
///
/// The path segment doubles as the shared secret. Once it matches, the
/// channel always gets 200 back so it never retries; anything wrong with
/// the payload is logged and dropped here.
async fn handle_push(
    State(state): State<Arc<AppState>>,
    Path(secret): Path<String>,
    body: String,
) -> StatusCode {
    // Validate path secret
    if secret != state.config.push_secret {
        tracing::warn!(
            received_secret = %secret,
            "Security Alert: Push path secret mismatch"
        );
        return StatusCode::NOT_FOUND;
    }

    tracing::debug!(payload = %body, "Push event received (raw)");

    let event = match PushEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse push event");
            return StatusCode::OK; // Still return 200 to the relay to avoid retries
        }
    };

    tracing::info!(
        trip_name = %event.trip_name,
        group_id = event.group_id,
        kind = event.kind.wire_name(),
        "Push event parsed successfully"
    );

    match state.registry.dispatch(&event).await {
        Ok(EventOutcome::Applied) => {}
        Ok(EventOutcome::IgnoredForeignTrip) => {
            tracing::debug!(
                trip_name = %event.trip_name,
                "Ignoring event for a trip we are not watching"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to apply push event");
        }
    }

    // Always return 200 OK quickly (relay requirement)
    StatusCode::OK
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background execution seam.
//!
//! Producing a trip has to outlive the foreground: the platform adapter
//! behind this trait holds whatever lease keeps sampling alive (wake lock,
//! foreground service, background task). The producer drives it on every
//! activation edge and knows nothing about what is behind it.

/// Keeps the process sampling while a trip is active.
pub trait Keepalive: Send + Sync {
    /// Called on every transition into an active trip, including resume.
    fn start(&self);

    /// Called on every transition back to idle, including discard.
    fn stop(&self);
}

/// Default collaborator for hosts that have no background lease to hold.
/// Logs the transitions so trip activations stay visible in traces.
pub struct LogKeepalive;

impl Keepalive for LogKeepalive {
    fn start(&self) {
        tracing::info!("Background keepalive started");
    }

    fn stop(&self) {
        tracing::info!("Background keepalive stopped");
    }
}

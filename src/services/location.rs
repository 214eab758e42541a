// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Location source seam and sampling policy.
//!
//! The engine never talks to a GPS directly. A platform adapter implements
//! [`LocationSource`]; the producer wraps its fix stream in a cancellable
//! subscription and filters fixes through the hybrid distance/time trigger.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::{Stream, StreamExt};
use tokio::sync::Notify;

use crate::models::geo::GeoPoint;

/// Position updates closer than this to the last recorded one are dropped
/// unless enough time has passed.
pub const DEFAULT_DISTANCE_METERS: f64 = 5.0;

/// A stationary vehicle still produces one sample per interval.
pub const DEFAULT_MAX_INTERVAL_SECONDS: i64 = 8;

/// A raw position reading from the platform location source.
///
/// Coordinates are unvalidated here; the producer validates them on ingest
/// so a misbehaving platform cannot poison the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// Outcome of a permission check or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    /// Denied, but the platform allows asking again
    Denied,
    /// Denied with no way to ask again from inside the app
    DeniedForever,
}

/// Why the location source failed.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service is disabled")]
    ServiceDisabled,

    #[error("Location source failed: {0}")]
    Unavailable(String),
}

/// Continuous stream of fixes from the platform.
pub type FixStream = Pin<Box<dyn Stream<Item = Result<Fix, LocationError>> + Send>>;

/// Delivery policy for the fix stream: record on movement or on elapsed
/// time, whichever comes first.
#[derive(Debug, Clone, Copy)]
pub struct SamplingPolicy {
    /// Minimum movement before a fix is recorded, in meters
    pub distance_meters: f64,
    /// Maximum quiet time between recorded fixes
    pub max_interval: Duration,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            distance_meters: DEFAULT_DISTANCE_METERS,
            max_interval: Duration::seconds(DEFAULT_MAX_INTERVAL_SECONDS),
        }
    }
}

/// Seam between the engine and the platform's positioning stack.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Whether positioning is switched on at the platform level.
    async fn is_service_enabled(&self) -> bool;

    /// Current permission state without prompting.
    async fn permission_status(&self) -> PermissionStatus;

    /// Prompt the user for permission and report the outcome.
    async fn request_permission(&self) -> PermissionStatus;

    /// One-shot current position, used when a trip starts or finishes.
    async fn current_fix(&self) -> Result<Fix, LocationError>;

    /// Open a continuous fix stream. The policy is a delivery hint for the
    /// platform; the engine filters fixes through its own trigger either
    /// way. The stream runs until its subscription is cancelled or the
    /// platform ends it.
    async fn subscribe(&self, policy: SamplingPolicy) -> Result<FixStream, LocationError>;
}

/// Cancellation handle shared between a subscription and the producer.
///
/// The producer keeps a clone so that finishing or discarding a trip stops
/// a subscription the embedder is still driving.
#[derive(Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the subscription. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Wait until cancelled. The flag is re-checked around every wait so a
    /// cancel that lands before the waiter registers is never missed.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// A live fix subscription handed to the embedder when a trip starts.
///
/// Drive it with [`FixSubscription::next`]; it yields `None` once the trip
/// is finished or discarded, whichever end cancels first.
pub struct FixSubscription {
    stream: FixStream,
    cancel: CancelHandle,
}

impl std::fmt::Debug for FixSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixSubscription").finish_non_exhaustive()
    }
}

impl FixSubscription {
    pub fn new(stream: FixStream, cancel: CancelHandle) -> Self {
        Self { stream, cancel }
    }

    /// Next fix, or `None` once the subscription is over.
    pub async fn next(&mut self) -> Option<Result<Fix, LocationError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            item = self.stream.next() => item,
        }
    }
}

/// Hybrid distance/time trigger deciding which fixes become samples.
///
/// A fix is recorded when it moved at least `distance_meters` from the last
/// recorded one, or `max_interval` has passed since it, so a moving vehicle
/// traces its path and a parked one stays visibly alive.
#[derive(Debug, Clone)]
pub struct HybridTrigger {
    policy: SamplingPolicy,
    last_recorded: Option<(GeoPoint, DateTime<Utc>)>,
}

impl HybridTrigger {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            policy,
            last_recorded: None,
        }
    }

    /// Seed the trigger from an already-recorded sample, used to arm it
    /// with the start fix and when a trip resumes after a restart.
    pub fn prime(&mut self, point: GeoPoint, at: DateTime<Utc>) {
        self.last_recorded = Some((point, at));
    }

    /// Decide whether a fix should be recorded, advancing the trigger state
    /// when it is. The first fix after construction always records.
    pub fn should_record(&mut self, point: GeoPoint, at: DateTime<Utc>) -> bool {
        let accept = match &self.last_recorded {
            None => true,
            Some((last_point, last_at)) => {
                last_point.distance_meters(&point) >= self.policy.distance_meters
                    || at - *last_at >= self.policy.max_interval
            }
        };
        if accept {
            self.last_recorded = Some((point, at));
        }
        accept
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Location sample records written to the point log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::geo::GeoPoint;

/// Lifecycle event a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripEventKind {
    Start,
    Update,
    Finish,
}

impl TripEventKind {
    /// Wire name used in backend requests.
    pub fn wire_name(&self) -> &'static str {
        match self {
            TripEventKind::Start => "start",
            TripEventKind::Update => "update",
            TripEventKind::Finish => "finish",
        }
    }
}

/// Where a sample entered this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleOrigin {
    /// Captured from the local location source (this node is the producer)
    Device,
    /// Received as a push event from the backend (this node is a viewer)
    Push,
}

/// One durable location sample.
///
/// A sample is immutable once written except for the `synced` flag, which
/// only ever flips false to true. Within a trip, a sample is identified by
/// its `(captured_at, event)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Backend-assigned trip name this sample belongs to
    pub trip_name: String,
    /// Group the trip runs under
    pub group_id: i64,
    /// Lifecycle event kind
    pub event: TripEventKind,
    /// Position at capture time
    pub point: GeoPoint,
    /// Capture timestamp (device clock for device samples, producer
    /// timestamp for push samples)
    pub captured_at: DateTime<Utc>,
    /// Ground speed at capture, meters per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    /// Reported horizontal accuracy in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    /// When this node received the sample, for push samples only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    /// How the sample entered this node
    pub origin: SampleOrigin,
    /// Whether the backend has acknowledged this sample
    pub synced: bool,
}

impl LocationSample {
    /// A sample captured by the local device, pending backend delivery.
    pub fn from_device(
        trip_name: &str,
        group_id: i64,
        event: TripEventKind,
        point: GeoPoint,
        captured_at: DateTime<Utc>,
        speed_mps: Option<f64>,
        accuracy_m: Option<f64>,
    ) -> Self {
        Self {
            trip_name: trip_name.to_string(),
            group_id,
            event,
            point,
            captured_at,
            speed_mps,
            accuracy_m,
            received_at: None,
            origin: SampleOrigin::Device,
            synced: false,
        }
    }

    /// A sample received over push. Push samples were already delivered by
    /// the producing node, so they are born synced and the reconciler skips
    /// them.
    pub fn from_push(
        trip_name: &str,
        group_id: i64,
        event: TripEventKind,
        point: GeoPoint,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trip_name: trip_name.to_string(),
            group_id,
            event,
            point,
            captured_at,
            speed_mps: None,
            accuracy_m: None,
            received_at: Some(Utc::now()),
            origin: SampleOrigin::Push,
            synced: true,
        }
    }
}

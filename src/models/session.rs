//! Session record persisted between process runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable record of what this node was doing when it last ran.
///
/// The producing fields and the watching fields are independent: a node can
/// produce one trip while watching another, and clearing one side must not
/// disturb the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripSessionRecord {
    /// Whether this node is currently producing a trip
    #[serde(default)]
    pub is_trip_active: bool,
    /// Backend-assigned name of the trip being produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_trip_name: Option<String>,
    /// Group the produced trip runs under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_group_id: Option<i64>,
    /// When the produced trip was started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_start_time: Option<DateTime<Utc>>,
    /// Backend-assigned name of the trip being watched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watching_trip_name: Option<String>,
    /// Group the watched trip runs under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watching_group_id: Option<i64>,
}

impl TripSessionRecord {
    /// Whether both sides are empty.
    pub fn is_empty(&self) -> bool {
        !self.is_trip_active
            && self.current_trip_name.is_none()
            && self.watching_trip_name.is_none()
    }

    /// Mark the producing side active for the given trip.
    pub fn set_producing(&mut self, trip_name: &str, group_id: i64, started_at: DateTime<Utc>) {
        self.is_trip_active = true;
        self.current_trip_name = Some(trip_name.to_string());
        self.current_group_id = Some(group_id);
        self.trip_start_time = Some(started_at);
    }

    /// Clear the producing side, leaving the watching side untouched.
    pub fn clear_producing(&mut self) {
        self.is_trip_active = false;
        self.current_trip_name = None;
        self.current_group_id = None;
        self.trip_start_time = None;
    }

    /// Point the watching side at the given trip.
    pub fn set_watching(&mut self, trip_name: &str, group_id: i64) {
        self.watching_trip_name = Some(trip_name.to_string());
        self.watching_group_id = Some(group_id);
    }

    /// Clear the watching side, leaving the producing side untouched.
    pub fn clear_watching(&mut self) {
        self.watching_trip_name = None;
        self.watching_group_id = None;
    }
}

/// Summary of a finished trip, computed locally and posted best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub trip_name: String,
    pub group_id: i64,
    /// Number of device samples captured over the trip
    pub point_count: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Traveled path, polyline-encoded at precision 5
    pub path_polyline: String,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Viewer-side snapshot of a watched trip.

use chrono::{DateTime, Utc};

use crate::models::geo::GeoPoint;
use crate::models::sample::{LocationSample, TripEventKind};

/// One point on a watched trip's path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub point: GeoPoint,
    pub at: DateTime<Utc>,
}

/// Immutable snapshot of everything a viewer knows about one trip.
///
/// Snapshots are never mutated in place: each accepted event derives a new
/// snapshot and the old `Arc` stays valid for whoever is still reading it.
/// The path holds points in arrival order and only grows while the trip is
/// active; once inactive it is frozen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripViewingState {
    /// Backend-assigned trip name, `None` when nothing is watched
    pub trip_name: Option<String>,
    /// Group the trip runs under
    pub group_id: Option<i64>,
    /// Every position seen so far, in arrival order
    pub path: Vec<PathPoint>,
    /// When the trip started
    pub trip_start_time: Option<DateTime<Utc>>,
    /// When the last event was applied
    pub last_update_time: Option<DateTime<Utc>>,
    /// Whether the producer is still emitting
    pub is_trip_active: bool,
    /// Kind of the last applied event
    pub last_event: Option<TripEventKind>,
    /// Human-readable description of the last event
    pub last_event_detail: Option<String>,
}

impl TripViewingState {
    /// Empty sentinel shown when no trip is being watched.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Fresh snapshot for a trip that just started, seeded with its start
    /// point.
    pub fn started(
        trip_name: &str,
        group_id: i64,
        point: GeoPoint,
        at: DateTime<Utc>,
        detail: Option<String>,
    ) -> Self {
        Self {
            trip_name: Some(trip_name.to_string()),
            group_id: Some(group_id),
            path: vec![PathPoint { point, at }],
            trip_start_time: Some(at),
            last_update_time: Some(at),
            is_trip_active: true,
            last_event: Some(TripEventKind::Start),
            last_event_detail: detail,
        }
    }

    /// Derived snapshot with one more point appended.
    pub fn with_update(&self, point: GeoPoint, at: DateTime<Utc>, detail: Option<String>) -> Self {
        let mut next = self.clone();
        next.path.push(PathPoint { point, at });
        next.last_update_time = Some(at);
        next.last_event = Some(TripEventKind::Update);
        next.last_event_detail = detail;
        next
    }

    /// Derived snapshot with the final point appended and the trip marked
    /// inactive. The path is frozen from here on.
    pub fn with_finish(&self, point: GeoPoint, at: DateTime<Utc>, detail: Option<String>) -> Self {
        let mut next = self.clone();
        next.path.push(PathPoint { point, at });
        next.last_update_time = Some(at);
        next.is_trip_active = false;
        next.last_event = Some(TripEventKind::Finish);
        next.last_event_detail = detail;
        next
    }

    /// Fold an ordered sample slice back into a snapshot. Used when the
    /// watched trip is reconstructed from the point log or the backend
    /// rather than from live events.
    pub fn rebuild(samples: &[LocationSample]) -> Self {
        let Some(first) = samples.first() else {
            return Self::idle();
        };
        // last() is Some whenever first() is
        let last = &samples[samples.len() - 1];
        let start_time = samples
            .iter()
            .find(|s| s.event == TripEventKind::Start)
            .map(|s| s.captured_at)
            .unwrap_or(first.captured_at);
        Self {
            trip_name: Some(first.trip_name.clone()),
            group_id: Some(first.group_id),
            path: samples
                .iter()
                .map(|s| PathPoint {
                    point: s.point,
                    at: s.captured_at,
                })
                .collect(),
            trip_start_time: Some(start_time),
            last_update_time: Some(last.captured_at),
            is_trip_active: last.event != TripEventKind::Finish,
            last_event: Some(last.event),
            last_event_detail: None,
        }
    }

    /// Most recent position, if any.
    pub fn current_location(&self) -> Option<GeoPoint> {
        self.path.last().map(|p| p.point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn sample(event: TripEventKind, lat: f64, secs: i64) -> LocationSample {
        LocationSample::from_push("trip_5_1", 5, event, point(lat, 77.2090), at(secs))
    }

    #[test]
    fn idle_sentinel_is_empty() {
        let s = TripViewingState::idle();
        assert!(s.trip_name.is_none());
        assert!(!s.is_trip_active);
        assert!(s.path.is_empty());
        assert!(s.current_location().is_none());
    }

    #[test]
    fn derived_snapshots_leave_the_original_alone() {
        let first = TripViewingState::started("trip_5_1", 5, point(28.61, 77.20), at(100), None);
        let second = first.with_update(point(28.62, 77.21), at(200), None);
        assert_eq!(first.path.len(), 1);
        assert_eq!(second.path.len(), 2);
        assert!(second.is_trip_active);
        assert_eq!(second.last_event, Some(TripEventKind::Update));
        assert_eq!(second.current_location(), Some(point(28.62, 77.21)));
    }

    #[test]
    fn finish_freezes_and_appends_the_final_point() {
        let live = TripViewingState::started("trip_5_1", 5, point(28.61, 77.20), at(100), None);
        let done = live.with_finish(point(28.63, 77.22), at(300), Some("Trip over".into()));
        assert!(!done.is_trip_active);
        assert_eq!(done.path.len(), 2);
        assert_eq!(done.last_event, Some(TripEventKind::Finish));
        assert_eq!(done.last_event_detail.as_deref(), Some("Trip over"));
    }

    #[test]
    fn rebuild_folds_samples_in_slice_order() {
        let samples = vec![
            sample(TripEventKind::Start, 28.61, 100),
            sample(TripEventKind::Update, 28.62, 200),
            sample(TripEventKind::Update, 28.63, 300),
        ];
        let state = TripViewingState::rebuild(&samples);
        assert_eq!(state.trip_name.as_deref(), Some("trip_5_1"));
        assert_eq!(state.group_id, Some(5));
        assert_eq!(state.path.len(), 3);
        assert!(state.is_trip_active);
        assert_eq!(state.trip_start_time, Some(at(100)));
        assert_eq!(state.last_update_time, Some(at(300)));
    }

    #[test]
    fn rebuild_of_finished_trip_is_inactive() {
        let samples = vec![
            sample(TripEventKind::Start, 28.61, 100),
            sample(TripEventKind::Finish, 28.62, 200),
        ];
        let state = TripViewingState::rebuild(&samples);
        assert!(!state.is_trip_active);
        assert_eq!(state.last_event, Some(TripEventKind::Finish));
    }

    #[test]
    fn rebuild_of_nothing_is_the_idle_sentinel() {
        assert_eq!(TripViewingState::rebuild(&[]), TripViewingState::idle());
    }
}

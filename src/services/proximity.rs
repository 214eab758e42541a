// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Approach detection for watched trips.
//!
//! A watch is armed around a fixed reference position. As trip positions
//! arrive, each distance band fires at most once, largest first, no matter
//! how the producer moves afterwards. Latches live only in memory; a trip
//! start resets them.

use crate::models::geo::GeoPoint;

/// Alert distance bands, in meters. Ordering is the firing order when a
/// single update crosses several at once.
pub const APPROACH_THRESHOLDS_METERS: [f64; 4] = [1000.0, 500.0, 200.0, 100.0];

/// A threshold crossing on a watched trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachAlert {
    /// Trip whose position crossed the band
    pub trip_name: String,
    /// The band that fired, in meters
    pub threshold_m: f64,
    /// Actual distance at the observation that fired it
    pub distance_m: f64,
}

/// Delivery hook for approach alerts. The embedder decides what an alert
/// looks like (notification, sound, log line).
pub trait Announcer: Send + Sync {
    fn approach(&self, alert: &ApproachAlert);
}

/// Default announcer: a structured log line per fired band.
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn approach(&self, alert: &ApproachAlert) {
        tracing::info!(
            trip_name = %alert.trip_name,
            threshold_m = alert.threshold_m,
            distance_m = format!("{:.1}", alert.distance_m),
            "Approaching"
        );
    }
}

/// One-shot distance latches around a fixed reference position.
#[derive(Debug, Clone)]
pub struct ProximityWatch {
    reference: GeoPoint,
    fired: [bool; APPROACH_THRESHOLDS_METERS.len()],
}

impl ProximityWatch {
    /// Arm a fresh watch around `reference`. All bands start unfired.
    pub fn new(reference: GeoPoint) -> Self {
        Self {
            reference,
            fired: [false; APPROACH_THRESHOLDS_METERS.len()],
        }
    }

    /// Re-arm every band. Called when a new trip starts.
    pub fn reset(&mut self) {
        self.fired = [false; APPROACH_THRESHOLDS_METERS.len()];
    }

    /// Observe a trip position. Returns the alerts that fired, largest
    /// band first.
    pub fn observe(&mut self, trip_name: &str, position: &GeoPoint) -> Vec<ApproachAlert> {
        let distance = self.reference.distance_meters(position);
        let mut crossed = Vec::new();
        for (i, threshold) in APPROACH_THRESHOLDS_METERS.iter().enumerate() {
            if !self.fired[i] && distance <= *threshold {
                self.fired[i] = true;
                crossed.push(ApproachAlert {
                    trip_name: trip_name.to_string(),
                    threshold_m: *threshold,
                    distance_m: distance,
                });
            }
        }
        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> GeoPoint {
        GeoPoint::new(28.6139, 77.2090).unwrap()
    }

    /// Point roughly `meters` north of the reference.
    fn north_of(meters: f64) -> GeoPoint {
        GeoPoint::new(28.6139 + meters / 111_320.0, 77.2090).unwrap()
    }

    fn bands(alerts: &[ApproachAlert]) -> Vec<f64> {
        alerts.iter().map(|a| a.threshold_m).collect()
    }

    #[test]
    fn one_close_observation_fires_every_band_descending() {
        let mut watch = ProximityWatch::new(reference());
        let crossed = watch.observe("trip_5_1", &north_of(50.0));
        assert_eq!(bands(&crossed), vec![1000.0, 500.0, 200.0, 100.0]);
        assert!(crossed.iter().all(|a| (40.0..60.0).contains(&a.distance_m)));
        assert!(crossed.iter().all(|a| a.trip_name == "trip_5_1"));
    }

    #[test]
    fn bands_fire_once_per_watch() {
        let mut watch = ProximityWatch::new(reference());
        assert_eq!(watch.observe("trip_5_1", &north_of(50.0)).len(), 4);
        assert!(watch.observe("trip_5_1", &north_of(30.0)).is_empty());
    }

    #[test]
    fn gradual_approach_fires_bands_one_at_a_time() {
        let mut watch = ProximityWatch::new(reference());
        assert!(watch.observe("trip_5_1", &north_of(5_000.0)).is_empty());

        assert_eq!(bands(&watch.observe("trip_5_1", &north_of(900.0))), vec![1000.0]);
        assert_eq!(bands(&watch.observe("trip_5_1", &north_of(450.0))), vec![500.0]);
        assert_eq!(
            bands(&watch.observe("trip_5_1", &north_of(90.0))),
            vec![200.0, 100.0]
        );
    }

    #[test]
    fn leaving_and_returning_does_not_refire() {
        let mut watch = ProximityWatch::new(reference());
        assert_eq!(watch.observe("trip_5_1", &north_of(90.0)).len(), 4);
        assert!(watch.observe("trip_5_1", &north_of(5_000.0)).is_empty());
        assert!(watch.observe("trip_5_1", &north_of(90.0)).is_empty());
    }

    #[test]
    fn distant_positions_fire_nothing() {
        let mut watch = ProximityWatch::new(reference());
        assert!(watch.observe("trip_5_1", &north_of(1_200.0)).is_empty());
    }

    #[test]
    fn reset_rearms_every_band() {
        let mut watch = ProximityWatch::new(reference());
        assert_eq!(watch.observe("trip_5_1", &north_of(50.0)).len(), 4);

        watch.reset();
        assert_eq!(watch.observe("trip_5_2", &north_of(50.0)).len(), 4);
    }
}

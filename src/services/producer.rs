// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trip producer: the device-side trip lifecycle.
//!
//! Handles the core workflow:
//! 1. Start a trip (backend assigns the trip name, start fix delivered inline)
//! 2. Filter incoming fixes through the hybrid trigger
//! 3. Durably log each accepted sample, then deliver it inline
//! 4. Finish with a final fix, cleanup, and a best-effort summary
//!
//! Every sample is written to the point log before any delivery attempt, so
//! a crash or a dead network never loses a recorded position. Failed
//! deliveries stay unsynced in the log for the reconciler.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Result, TripError};
use crate::models::geo::GeoPoint;
use crate::models::sample::{LocationSample, SampleOrigin, TripEventKind};
use crate::models::session::TripSummary;
use crate::services::backend::TripBackend;
use crate::services::keepalive::Keepalive;
use crate::services::location::{
    CancelHandle, Fix, FixSubscription, HybridTrigger, LocationSource, PermissionStatus,
    SamplingPolicy,
};
use crate::store::{PointLog, SessionStore};

/// Producer state machine. One instance per device; at most one trip is
/// active at a time.
pub struct ActiveTripProducer {
    location: Arc<dyn LocationSource>,
    backend: Arc<dyn TripBackend>,
    point_log: PointLog,
    session: SessionStore,
    keepalive: Arc<dyn Keepalive>,
    policy: SamplingPolicy,
    active: Option<ActiveTrip>,
}

/// In-memory state of the trip being produced.
struct ActiveTrip {
    trip_name: String,
    group_id: i64,
    started_at: DateTime<Utc>,
    /// Positions recorded so far, in capture order
    path: Vec<(GeoPoint, DateTime<Utc>)>,
    trigger: HybridTrigger,
    cancel: CancelHandle,
}

impl ActiveTripProducer {
    pub fn new(
        location: Arc<dyn LocationSource>,
        backend: Arc<dyn TripBackend>,
        point_log: PointLog,
        session: SessionStore,
        keepalive: Arc<dyn Keepalive>,
        policy: SamplingPolicy,
    ) -> Self {
        Self {
            location,
            backend,
            point_log,
            session,
            keepalive,
            policy,
            active: None,
        }
    }

    /// Start a trip for a group and return the live fix subscription. The
    /// caller drives the subscription and hands every yielded fix to
    /// [`record_fix`](Self::record_fix).
    ///
    /// Start is the one operation where a delivery failure aborts: the trip
    /// name does not exist until the backend answers.
    pub async fn start_trip(&mut self, group_id: i64) -> Result<FixSubscription> {
        if self.active.is_some() {
            return Err(TripError::TripAlreadyActive);
        }

        // 1. Preconditions: positioning on, permission granted
        if !self.location.is_service_enabled().await {
            return Err(TripError::ServiceDisabled);
        }
        match self.location.permission_status().await {
            PermissionStatus::Granted => {}
            PermissionStatus::Denied => {
                if self.location.request_permission().await != PermissionStatus::Granted {
                    return Err(TripError::PermissionDenied);
                }
            }
            PermissionStatus::DeniedForever => return Err(TripError::PermissionDenied),
        }

        // 2. One fix to anchor the trip
        let fix = self.location.current_fix().await?;
        let point = validate_fix(&fix)?;

        // 3. Open the platform stream before the trip exists anywhere, so a
        //    subscription failure aborts with nothing to unwind
        let stream = self.location.subscribe(self.policy).await?;
        let cancel = CancelHandle::new();
        let subscription = FixSubscription::new(stream, cancel.clone());

        // 4. The backend assigns the trip name
        let trip_name = match self.backend.start_trip(group_id, point).await {
            Ok(name) => name,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        // 5. Durable records: session first, then the start sample. The
        //    start call above was the sample's delivery, so it is born
        //    synced.
        let mut record = self.session.read()?;
        record.set_producing(&trip_name, group_id, fix.captured_at);
        self.session.save(&record)?;

        let mut start_sample = LocationSample::from_device(
            &trip_name,
            group_id,
            TripEventKind::Start,
            point,
            fix.captured_at,
            fix.speed_mps,
            fix.accuracy_m,
        );
        start_sample.synced = true;
        self.point_log.save(&start_sample)?;

        // 6. Go active
        self.keepalive.start();
        let mut trigger = HybridTrigger::new(self.policy);
        trigger.prime(point, fix.captured_at);
        self.active = Some(ActiveTrip {
            trip_name: trip_name.clone(),
            group_id,
            started_at: fix.captured_at,
            path: vec![(point, fix.captured_at)],
            trigger,
            cancel,
        });

        tracing::info!(group_id, trip_name = %trip_name, "Trip started");
        Ok(subscription)
    }

    /// Record one raw fix. Quietly ignored while no trip is active (a
    /// cancelled subscription can still be draining) and when the sampling
    /// trigger rejects it.
    pub async fn record_fix(&mut self, fix: Fix) -> Result<()> {
        let Some(trip) = self.active.as_mut() else {
            return Ok(());
        };

        let point = validate_fix(&fix)?;
        if !trip.trigger.should_record(point, fix.captured_at) {
            return Ok(());
        }

        trip.path.push((point, fix.captured_at));
        let sample = LocationSample::from_device(
            &trip.trip_name,
            trip.group_id,
            TripEventKind::Update,
            point,
            fix.captured_at,
            fix.speed_mps,
            fix.accuracy_m,
        );
        self.point_log.save(&sample)?;
        self.deliver_inline(&sample).await;
        Ok(())
    }

    /// Finish the active trip: write the finish sample, tear down, and
    /// send the summary best-effort.
    pub async fn finish_trip(&mut self) -> Result<TripSummary> {
        let Some(mut trip) = self.active.take() else {
            return Err(TripError::TripNotActive);
        };

        // 1. Final position: a live fix when the sensor cooperates,
        //    otherwise the last recorded point. A flaky GPS must not block
        //    finishing.
        let live = match self.location.current_fix().await {
            Ok(fix) => GeoPoint::new(fix.latitude, fix.longitude)
                .map(|p| (p, fix.captured_at, fix.speed_mps, fix.accuracy_m)),
            Err(e) => {
                tracing::debug!(error = %e, "Final fix unavailable");
                None
            }
        };
        let fallback = trip
            .path
            .last()
            .map(|(p, _)| (*p, Utc::now(), None, None));
        let Some((point, captured_at, speed_mps, accuracy_m)) = live.or(fallback) else {
            self.active = Some(trip);
            return Err(TripError::Location(
                "No final fix and no recorded path".to_string(),
            ));
        };

        // 2. Durable finish sample, delivered inline when the network allows
        trip.path.push((point, captured_at));
        let sample = LocationSample::from_device(
            &trip.trip_name,
            trip.group_id,
            TripEventKind::Finish,
            point,
            captured_at,
            speed_mps,
            accuracy_m,
        );
        if let Err(e) = self.point_log.save(&sample) {
            trip.path.pop();
            self.active = Some(trip);
            return Err(e.into());
        }
        self.deliver_inline(&sample).await;

        // 3. Tear down regardless of the delivery outcome
        let mut record = self.session.read()?;
        record.clear_producing();
        self.session.save(&record)?;
        trip.cancel.cancel();
        self.keepalive.stop();

        tracing::info!(
            trip_name = %trip.trip_name,
            points = trip.path.len(),
            "Trip finished"
        );

        // 4. Best-effort summary; the per-point log is already authoritative
        let summary = TripSummary {
            trip_name: trip.trip_name.clone(),
            group_id: trip.group_id,
            point_count: trip.path.len(),
            started_at: trip.started_at,
            ended_at: captured_at,
            path_polyline: encode_path(&trip.path)?,
        };
        if let Err(e) = self.backend.send_summary(&summary).await {
            tracing::warn!(
                trip_name = %summary.trip_name,
                error = %e,
                "Trip summary delivery failed"
            );
        }

        Ok(summary)
    }

    /// Resume a trip left active by a previous process run. Rebuilds the
    /// in-memory path from the durable log and re-opens the fix stream
    /// without touching the backend's start endpoint.
    pub async fn resume_trip(&mut self) -> Result<Option<FixSubscription>> {
        if self.active.is_some() {
            return Err(TripError::TripAlreadyActive);
        }

        let record = self.session.read()?;
        if !record.is_trip_active {
            return Ok(None);
        }
        let (Some(trip_name), Some(group_id)) =
            (record.current_trip_name.clone(), record.current_group_id)
        else {
            tracing::warn!("Session record is active but incomplete, clearing it");
            return self.clear_producing_half().map(|_| None);
        };

        let samples = self.point_log.samples_by_trip_name(&trip_name)?;
        let device: Vec<&LocationSample> = samples
            .iter()
            .filter(|s| s.origin == SampleOrigin::Device)
            .collect();

        // A finish sample means the trip completed but the session clear
        // never hit the disk. Nothing to resume.
        if device.iter().any(|s| s.event == TripEventKind::Finish) {
            tracing::warn!(trip_name = %trip_name, "Session record outlived a finished trip, clearing it");
            return self.clear_producing_half().map(|_| None);
        }

        let path: Vec<(GeoPoint, DateTime<Utc>)> =
            device.iter().map(|s| (s.point, s.captured_at)).collect();
        let started_at = record
            .trip_start_time
            .or_else(|| path.first().map(|(_, at)| *at))
            .unwrap_or_else(Utc::now);

        let stream = self.location.subscribe(self.policy).await?;
        let cancel = CancelHandle::new();
        let subscription = FixSubscription::new(stream, cancel.clone());

        let mut trigger = HybridTrigger::new(self.policy);
        if let Some((point, at)) = path.last().copied() {
            trigger.prime(point, at);
        }

        self.keepalive.start();
        tracing::info!(trip_name = %trip_name, group_id, points = path.len(), "Trip resumed from the durable log");
        self.active = Some(ActiveTrip {
            trip_name,
            group_id,
            started_at,
            path,
            trigger,
            cancel,
        });

        Ok(Some(subscription))
    }

    /// Abandon the active trip without writing or delivering anything.
    pub fn discard_trip(&mut self) -> Result<()> {
        let Some(trip) = self.active.take() else {
            return Err(TripError::TripNotActive);
        };

        trip.cancel.cancel();
        self.clear_producing_half()?;
        self.keepalive.stop();

        tracing::info!(trip_name = %trip.trip_name, "Trip discarded");
        Ok(())
    }

    /// Whether a trip is currently being produced.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Name of the trip being produced, if any.
    pub fn active_trip_name(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.trip_name.as_str())
    }

    /// Inline delivery of one freshly written sample. Failure of any kind
    /// leaves the record unsynced for the reconciler; nothing propagates.
    async fn deliver_inline(&self, sample: &LocationSample) {
        match self
            .backend
            .send_event(sample.group_id, &sample.trip_name, sample.event, sample.point)
            .await
        {
            Ok(()) => {
                if let Err(e) =
                    self.point_log
                        .mark_synced(&sample.trip_name, sample.captured_at, sample.event)
                {
                    tracing::warn!(
                        trip_name = %sample.trip_name,
                        error = %e,
                        "Delivered sample could not be marked synced"
                    );
                }
            }
            Err(e) if e.is_delivery_failure() => {
                tracing::debug!(
                    trip_name = %sample.trip_name,
                    error = %e,
                    "Inline delivery failed, sample left for the reconciler"
                );
            }
            Err(e) => {
                tracing::warn!(
                    trip_name = %sample.trip_name,
                    error = %e,
                    "Unexpected error delivering sample, left for the reconciler"
                );
            }
        }
    }

    fn clear_producing_half(&self) -> Result<()> {
        let mut record = self.session.read()?;
        record.clear_producing();
        self.session.save(&record)?;
        Ok(())
    }
}

fn validate_fix(fix: &Fix) -> Result<GeoPoint> {
    GeoPoint::new(fix.latitude, fix.longitude).ok_or(TripError::InvalidCoordinates {
        latitude: fix.latitude,
        longitude: fix.longitude,
    })
}

/// Encode a recorded path as a Google polyline, precision 5.
fn encode_path(path: &[(GeoPoint, DateTime<Utc>)]) -> Result<String> {
    let line: geo::LineString<f64> = path
        .iter()
        .map(|(p, _)| geo::coord! { x: p.longitude, y: p.latitude })
        .collect();
    polyline::encode_coordinates(line, 5)
        .map_err(|e| TripError::Internal(anyhow::anyhow!("Polyline encoding failed: {e}")))
}

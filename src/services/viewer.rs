// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trip viewer: the consumer side of the push channel.
//!
//! One viewer exists per watched group. Push events are routed to it by
//! group id; it rebuilds the producing vehicle's path as an immutable
//! snapshot, persists every accepted event, and runs the proximity watch.
//! Events for any trip other than the watched one are discarded, never
//! queued: that isolation is what keeps interleaved trips from corrupting
//! each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::geo::GeoPoint;
use crate::models::push::PushEvent;
use crate::models::sample::{LocationSample, SampleOrigin, TripEventKind};
use crate::models::viewing::TripViewingState;
use crate::services::backend::TripBackend;
use crate::services::proximity::{Announcer, ProximityWatch};
use crate::store::{PointLog, SessionStore};

/// What a handler did with a push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Event matched the watched trip and the snapshot advanced
    Applied,
    /// Event belonged to some other trip and was discarded
    IgnoredForeignTrip,
}

/// Which tier resolved the active trip on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The in-memory snapshot was already live
    AlreadyActive,
    /// Rebuilt from push-origin samples in the point log
    RebuiltFromLog,
    /// Fetched from the backend and persisted locally
    FetchedFromBackend,
    /// No trip is running anywhere
    NothingActive,
}

/// Consumer state machine for one watched group.
pub struct TripViewer {
    group_id: i64,
    backend: Arc<dyn TripBackend>,
    point_log: PointLog,
    session: SessionStore,
    announcer: Arc<dyn Announcer>,
    snapshot: Arc<TripViewingState>,
    /// Present only when a home position is configured
    watch: Option<ProximityWatch>,
}

impl TripViewer {
    pub fn new(
        group_id: i64,
        backend: Arc<dyn TripBackend>,
        point_log: PointLog,
        session: SessionStore,
        announcer: Arc<dyn Announcer>,
        home_point: Option<GeoPoint>,
    ) -> Self {
        Self {
            group_id,
            backend,
            point_log,
            session,
            announcer,
            snapshot: Arc::new(TripViewingState::idle()),
            watch: home_point.map(ProximityWatch::new),
        }
    }

    /// Current snapshot. Readers hold the `Arc` they got; later events
    /// never mutate it.
    pub fn snapshot(&self) -> Arc<TripViewingState> {
        Arc::clone(&self.snapshot)
    }

    /// A trip started in this group: re-arm the latches, replace the
    /// snapshot wholesale, and point the durable watching record at it.
    pub fn handle_trip_start(&mut self, event: &PushEvent) -> Result<EventOutcome> {
        if let Some(watch) = &mut self.watch {
            watch.reset();
        }

        self.snapshot = Arc::new(TripViewingState::started(
            &event.trip_name,
            event.group_id,
            event.point,
            event.captured_at,
            detail_for(event),
        ));
        self.persist(event)?;

        let mut record = self.session.read()?;
        record.set_watching(&event.trip_name, event.group_id);
        self.session.save(&record)?;

        tracing::info!(
            trip_name = %event.trip_name,
            group_id = event.group_id,
            latitude = event.point.latitude,
            longitude = event.point.longitude,
            "Watching new trip, recentering on its start point"
        );
        Ok(EventOutcome::Applied)
    }

    /// A position update. Foreign trips are discarded before any state is
    /// touched; matches append to the snapshot and run the proximity watch.
    pub fn handle_trip_update(&mut self, event: &PushEvent) -> Result<EventOutcome> {
        if !self.is_watched(event) {
            tracing::debug!(
                trip_name = %event.trip_name,
                watched = self.snapshot.trip_name.as_deref().unwrap_or("none"),
                "Ignoring update for a trip this viewer is not watching"
            );
            return Ok(EventOutcome::IgnoredForeignTrip);
        }

        self.snapshot = Arc::new(self.snapshot.with_update(
            event.point,
            event.captured_at,
            detail_for(event),
        ));
        self.persist(event)?;

        if let Some(watch) = &mut self.watch {
            for alert in watch.observe(&event.trip_name, &event.point) {
                self.announcer.approach(&alert);
            }
        }
        Ok(EventOutcome::Applied)
    }

    /// The watched trip finished: append the final point, freeze the
    /// snapshot, and drop the durable watching pointer.
    pub fn handle_trip_finish(&mut self, event: &PushEvent) -> Result<EventOutcome> {
        if !self.is_watched(event) {
            tracing::debug!(
                trip_name = %event.trip_name,
                watched = self.snapshot.trip_name.as_deref().unwrap_or("none"),
                "Ignoring finish for a trip this viewer is not watching"
            );
            return Ok(EventOutcome::IgnoredForeignTrip);
        }

        self.snapshot = Arc::new(self.snapshot.with_finish(
            event.point,
            event.captured_at,
            detail_for(event),
        ));
        self.persist(event)?;
        self.session.clear_watching_only()?;

        tracing::info!(trip_name = %event.trip_name, "Watched trip finished");
        Ok(EventOutcome::Applied)
    }

    /// Back to the empty sentinel, dropping the watching pointer.
    pub fn reset(&mut self) -> Result<()> {
        self.snapshot = Arc::new(TripViewingState::idle());
        if let Some(watch) = &mut self.watch {
            watch.reset();
        }
        self.session.clear_watching_only()?;
        Ok(())
    }

    /// Resolve the active trip in three tiers: the in-memory snapshot, the
    /// local log behind the watching pointer, then the backend. Each tier
    /// short-circuits the rest; a cheap hit never pays for an expensive
    /// one.
    pub async fn load_active_trip(&mut self) -> Result<LoadOutcome> {
        // 1. Already live in memory
        if self.snapshot.is_trip_active {
            return Ok(LoadOutcome::AlreadyActive);
        }

        // 2. Watching pointer + local log
        let record = self.session.read()?;
        if let Some(trip_name) = &record.watching_trip_name {
            let mut samples: Vec<LocationSample> = self
                .point_log
                .samples_by_trip_name(trip_name)?
                .into_iter()
                .filter(|s| s.origin == SampleOrigin::Push)
                .collect();
            samples.sort_by_key(|s| s.captured_at);

            if !samples.is_empty() {
                if let Some(watch) = &mut self.watch {
                    watch.reset();
                }
                self.snapshot = Arc::new(TripViewingState::rebuild(&samples));
                tracing::info!(
                    trip_name = %trip_name,
                    points = samples.len(),
                    "Rebuilt watched trip from the local log"
                );
                return Ok(LoadOutcome::RebuiltFromLog);
            }
            // Pointer without samples: fall through to the backend
        }

        // 3. Ask the backend
        let events = self.backend.active_trip_events(self.group_id).await?;
        if events.is_empty() {
            return Ok(LoadOutcome::NothingActive);
        }

        let mut samples = Vec::with_capacity(events.len());
        for event in &events {
            let sample = LocationSample::from_push(
                &event.trip_name,
                event.group_id,
                event.kind,
                event.point,
                event.captured_at,
            );
            self.point_log.save(&sample)?;
            samples.push(sample);
        }

        if let Some(watch) = &mut self.watch {
            watch.reset();
        }
        self.snapshot = Arc::new(TripViewingState::rebuild(&samples));

        let mut record = self.session.read()?;
        if let (Some(trip_name), Some(group_id)) = (&self.snapshot.trip_name, self.snapshot.group_id)
        {
            record.set_watching(trip_name, group_id);
            self.session.save(&record)?;
            tracing::info!(
                trip_name = %trip_name,
                points = samples.len(),
                "Fetched active trip from the backend"
            );
        }
        Ok(LoadOutcome::FetchedFromBackend)
    }

    /// Foreign-trip guard: the event must name the watched trip and the
    /// snapshot must still be live. A frozen snapshot accepts nothing.
    fn is_watched(&self, event: &PushEvent) -> bool {
        self.snapshot.is_trip_active
            && self.snapshot.trip_name.as_deref() == Some(event.trip_name.as_str())
    }

    fn persist(&self, event: &PushEvent) -> Result<()> {
        let sample = LocationSample::from_push(
            &event.trip_name,
            event.group_id,
            event.kind,
            event.point,
            event.captured_at,
        );
        self.point_log.save(&sample)?;
        Ok(())
    }
}

fn detail_for(event: &PushEvent) -> Option<String> {
    event.driver_name.as_ref().map(|driver| match event.kind {
        TripEventKind::Start => format!("{driver} started the trip"),
        TripEventKind::Update => format!("{driver} is on the move"),
        TripEventKind::Finish => format!("{driver} finished the trip"),
    })
}

/// All viewers, keyed by group. The composition root owns one registry and
/// the push route dispatches through it; a group's viewer is created the
/// first time an event or a load names that group.
pub struct ViewerRegistry {
    viewers: DashMap<i64, Arc<Mutex<TripViewer>>>,
    backend: Arc<dyn TripBackend>,
    point_log: PointLog,
    session: SessionStore,
    announcer: Arc<dyn Announcer>,
    home_point: Option<GeoPoint>,
}

impl ViewerRegistry {
    pub fn new(
        backend: Arc<dyn TripBackend>,
        point_log: PointLog,
        session: SessionStore,
        announcer: Arc<dyn Announcer>,
        home_point: Option<GeoPoint>,
    ) -> Self {
        Self {
            viewers: DashMap::new(),
            backend,
            point_log,
            session,
            announcer,
            home_point,
        }
    }

    /// The viewer for a group, created on first use.
    pub fn viewer_for(&self, group_id: i64) -> Arc<Mutex<TripViewer>> {
        self.viewers
            .entry(group_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(TripViewer::new(
                    group_id,
                    Arc::clone(&self.backend),
                    self.point_log.clone(),
                    self.session.clone(),
                    Arc::clone(&self.announcer),
                    self.home_point,
                )))
            })
            .clone()
    }

    /// Route one push event to its group's viewer. The handler runs to
    /// completion under the per-viewer lock, so events for one group never
    /// interleave.
    pub async fn dispatch(&self, event: &PushEvent) -> Result<EventOutcome> {
        let viewer = self.viewer_for(event.group_id);
        let mut viewer = viewer.lock().await;
        match event.kind {
            TripEventKind::Start => viewer.handle_trip_start(event),
            TripEventKind::Update => viewer.handle_trip_update(event),
            TripEventKind::Finish => viewer.handle_trip_finish(event),
        }
    }

    /// Run load resolution for a group, usually once at startup.
    pub async fn load_active_trip(&self, group_id: i64) -> Result<LoadOutcome> {
        let viewer = self.viewer_for(group_id);
        let mut viewer = viewer.lock().await;
        viewer.load_active_trip().await
    }
}

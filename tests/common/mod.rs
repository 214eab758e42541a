// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use convoy_tracker::config::Config;
use convoy_tracker::error::TripError;
use convoy_tracker::models::{GeoPoint, PushEvent, TripEventKind, TripSummary};
use convoy_tracker::routes::create_router;
use convoy_tracker::services::{
    Announcer, ApproachAlert, Fix, FixStream, Keepalive, LocationError, LocationSource,
    PermissionStatus, SamplingPolicy, TripBackend, ViewerRegistry,
};
use convoy_tracker::store::{PointLog, SessionStore};
use convoy_tracker::AppState;

/// What the mock backend saw, in call order.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum BackendCall {
    StartTrip {
        group_id: i64,
        point: GeoPoint,
    },
    SendEvent {
        trip_name: String,
        kind: TripEventKind,
        point: GeoPoint,
    },
    SendSummary {
        trip_name: String,
        point_count: usize,
    },
    ActiveTrip {
        group_id: i64,
    },
}

/// Scriptable backend double. Assigns trip names the way the relay does
/// and can be switched offline (or made to reject one trip) mid-test.
pub struct MockBackend {
    pub calls: Mutex<Vec<BackendCall>>,
    trip_counter: AtomicUsize,
    offline: AtomicBool,
    reject_trip: Mutex<Option<String>>,
    /// Scripted reply for `active_trip_events`
    pub active_trip: Mutex<Vec<PushEvent>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            trip_counter: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
            reject_trip: Mutex::new(None),
            active_trip: Mutex::new(Vec::new()),
        })
    }

    /// Fail every delivery with `NetworkUnavailable` until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail deliveries for one trip only.
    pub fn reject_trip(&self, trip_name: &str) {
        *self.reject_trip.lock().unwrap() = Some(trip_name.to_string());
    }

    /// Events delivered so far, as (trip_name, kind) in call order.
    pub fn sent_events(&self) -> Vec<(String, TripEventKind)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                BackendCall::SendEvent {
                    trip_name, kind, ..
                } => Some((trip_name.clone(), *kind)),
                _ => None,
            })
            .collect()
    }

    pub fn summaries(&self) -> Vec<(String, usize)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                BackendCall::SendSummary {
                    trip_name,
                    point_count,
                } => Some((trip_name.clone(), *point_count)),
                _ => None,
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn check_reachable(&self, trip_name: &str) -> Result<(), TripError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TripError::NetworkUnavailable("offline".to_string()));
        }
        if self.reject_trip.lock().unwrap().as_deref() == Some(trip_name) {
            return Err(TripError::BackendRejected {
                status: 500,
                body: "scripted rejection".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TripBackend for MockBackend {
    async fn start_trip(&self, group_id: i64, point: GeoPoint) -> Result<String, TripError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::StartTrip { group_id, point });
        self.check_reachable("")?;
        let n = self.trip_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("trip_{}_{}", group_id, n))
    }

    async fn send_event(
        &self,
        _group_id: i64,
        trip_name: &str,
        kind: TripEventKind,
        point: GeoPoint,
    ) -> Result<(), TripError> {
        self.check_reachable(trip_name)?;
        self.calls.lock().unwrap().push(BackendCall::SendEvent {
            trip_name: trip_name.to_string(),
            kind,
            point,
        });
        Ok(())
    }

    async fn send_summary(&self, summary: &TripSummary) -> Result<(), TripError> {
        self.check_reachable(&summary.trip_name)?;
        self.calls.lock().unwrap().push(BackendCall::SendSummary {
            trip_name: summary.trip_name.clone(),
            point_count: summary.point_count,
        });
        Ok(())
    }

    async fn active_trip_events(&self, group_id: i64) -> Result<Vec<PushEvent>, TripError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::ActiveTrip { group_id });
        self.check_reachable("")?;
        Ok(self.active_trip.lock().unwrap().clone())
    }
}

/// Scriptable location source. `current_fix` pops queued fixes in order;
/// the subscription stream stays empty because tests feed fixes to the
/// producer directly.
pub struct MockLocationSource {
    service_enabled: AtomicBool,
    permission: Mutex<PermissionStatus>,
    permission_after_request: Mutex<PermissionStatus>,
    fixes: Mutex<VecDeque<Fix>>,
    pub permission_requests: AtomicUsize,
}

#[allow(dead_code)]
impl MockLocationSource {
    /// Service on, permission granted.
    pub fn granted() -> Arc<Self> {
        Arc::new(Self {
            service_enabled: AtomicBool::new(true),
            permission: Mutex::new(PermissionStatus::Granted),
            permission_after_request: Mutex::new(PermissionStatus::Granted),
            fixes: Mutex::new(VecDeque::new()),
            permission_requests: AtomicUsize::new(0),
        })
    }

    /// Service on, scripted permission flow: `now` before any prompt,
    /// `after_request` once the producer prompts.
    pub fn with_permission(now: PermissionStatus, after_request: PermissionStatus) -> Arc<Self> {
        let source = Self::granted();
        *source.permission.lock().unwrap() = now;
        *source.permission_after_request.lock().unwrap() = after_request;
        source
    }

    pub fn disable_service(&self) {
        self.service_enabled.store(false, Ordering::SeqCst);
    }

    pub fn push_fix(&self, fix: Fix) {
        self.fixes.lock().unwrap().push_back(fix);
    }
}

#[async_trait]
impl LocationSource for MockLocationSource {
    async fn is_service_enabled(&self) -> bool {
        self.service_enabled.load(Ordering::SeqCst)
    }

    async fn permission_status(&self) -> PermissionStatus {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let after = *self.permission_after_request.lock().unwrap();
        *self.permission.lock().unwrap() = after;
        after
    }

    async fn current_fix(&self) -> Result<Fix, LocationError> {
        self.fixes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LocationError::Unavailable("no scripted fix".to_string()))
    }

    async fn subscribe(&self, _policy: SamplingPolicy) -> Result<FixStream, LocationError> {
        Ok(Box::pin(futures_util::stream::empty()))
    }
}

/// Announcer double recording every fired band.
#[derive(Default)]
pub struct RecordingAnnouncer {
    pub alerts: Mutex<Vec<ApproachAlert>>,
}

#[allow(dead_code)]
impl RecordingAnnouncer {
    /// Fired thresholds in firing order.
    pub fn bands(&self) -> Vec<f64> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.threshold_m)
            .collect()
    }
}

impl Announcer for RecordingAnnouncer {
    fn approach(&self, alert: &ApproachAlert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

/// Keepalive double counting lifecycle transitions.
#[derive(Default)]
pub struct CountingKeepalive {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl Keepalive for CountingKeepalive {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
pub fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude).unwrap()
}

#[allow(dead_code)]
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

#[allow(dead_code)]
pub fn fix(latitude: f64, longitude: f64, secs: i64) -> Fix {
    Fix {
        latitude,
        longitude,
        speed_mps: Some(11.0),
        accuracy_m: Some(5.0),
        captured_at: at(secs),
    }
}

/// Test app wired to mock collaborators over temp stores.
/// Returns the router plus the pieces tests poke at.
#[allow(dead_code)]
pub fn create_test_app(
    dir: &std::path::Path,
) -> (axum::Router, Arc<AppState>, Arc<MockBackend>) {
    let config = Config::default();
    let backend = MockBackend::new();
    let point_log = PointLog::open(dir).unwrap();
    let session = SessionStore::open(dir).unwrap();
    let registry = Arc::new(ViewerRegistry::new(
        backend.clone(),
        point_log,
        session,
        Arc::new(RecordingAnnouncer::default()),
        None,
    ));
    let state = Arc::new(AppState { config, registry });
    (create_router(state.clone()), state, backend)
}

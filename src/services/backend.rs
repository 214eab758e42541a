// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Trip backend client.
//!
//! Handles:
//! - Starting trips (the backend assigns the trip name)
//! - Delivering trip events for open trips
//! - Posting finished-trip summaries
//! - Fetching a group's active trip for cold-start resolution

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::error::TripError;
use crate::models::geo::GeoPoint;
use crate::models::push::PushEvent;
use crate::models::sample::TripEventKind;
use crate::models::session::TripSummary;
use crate::time_utils::format_utc_rfc3339;

/// Seam between the engine and the relay backend. The engine only ever
/// talks through this trait; tests script it freely.
#[async_trait]
pub trait TripBackend: Send + Sync {
    /// Start a trip for a group, delivering its first position. Returns
    /// the backend-assigned trip name.
    async fn start_trip(&self, group_id: i64, point: GeoPoint) -> Result<String, TripError>;

    /// Deliver one update or finish event for an open trip.
    async fn send_event(
        &self,
        group_id: i64,
        trip_name: &str,
        kind: TripEventKind,
        point: GeoPoint,
    ) -> Result<(), TripError>;

    /// Post a finished trip's summary with its encoded path.
    async fn send_summary(&self, summary: &TripSummary) -> Result<(), TripError>;

    /// Fetch the group's currently active trip replayed as push-shaped
    /// events. An empty list means no trip is running.
    async fn active_trip_events(&self, group_id: i64) -> Result<Vec<PushEvent>, TripError>;
}

/// HTTP client for the relay backend.
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl RelayClient {
    /// Create a client against a backend base URL.
    pub fn new(base_url: String, api_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_token,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backend_base_url.clone(), config.api_token.clone())
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.post(url);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), TripError> {
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(TripError::BackendRejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, TripError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TripError::BackendRejected {
                status: status.as_u16(),
                body,
            });
        }

        let status = response.status();
        response
            .json()
            .await
            .map_err(|e| TripError::BackendRejected {
                status: status.as_u16(),
                body: format!("Unparseable response: {}", e),
            })
    }
}

#[async_trait]
impl TripBackend for RelayClient {
    async fn start_trip(&self, group_id: i64, point: GeoPoint) -> Result<String, TripError> {
        let url = format!("{}/api/trip-events", self.base_url);
        let body = serde_json::json!({
            "group_id": group_id,
            "coordinates": {
                "latitude": point.latitude,
                "longitude": point.longitude,
            },
            "trip_event": TripEventKind::Start.wire_name(),
        });

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TripError::NetworkUnavailable(e.to_string()))?;

        let started: TripStartedResponse = self.check_response_json(response).await?;
        Ok(started.trip_name)
    }

    async fn send_event(
        &self,
        group_id: i64,
        trip_name: &str,
        kind: TripEventKind,
        point: GeoPoint,
    ) -> Result<(), TripError> {
        let url = format!("{}/api/trip-events", self.base_url);
        let body = serde_json::json!({
            "group_id": group_id,
            "trip_name": trip_name,
            "coordinates": {
                "latitude": point.latitude,
                "longitude": point.longitude,
            },
            "trip_event": kind.wire_name(),
        });

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TripError::NetworkUnavailable(e.to_string()))?;

        self.check_response(response).await
    }

    async fn send_summary(&self, summary: &TripSummary) -> Result<(), TripError> {
        let url = format!("{}/api/trip-summaries", self.base_url);
        let body = serde_json::json!({
            "trip_name": summary.trip_name,
            "group_id": summary.group_id,
            "point_count": summary.point_count,
            "started_at": format_utc_rfc3339(summary.started_at),
            "ended_at": format_utc_rfc3339(summary.ended_at),
            "path_polyline": summary.path_polyline,
        });

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TripError::NetworkUnavailable(e.to_string()))?;

        self.check_response(response).await
    }

    async fn active_trip_events(&self, group_id: i64) -> Result<Vec<PushEvent>, TripError> {
        let url = format!("{}/api/groups/{}/active-trip", self.base_url, group_id);

        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| TripError::NetworkUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let doc: ActiveTripResponse = self.check_response_json(response).await?;
        Ok(replay_events(&doc.trip_name, &doc.events))
    }
}

/// Replay stored push-shaped events, skipping elements that fail
/// validation so one bad record cannot sink the whole resolution.
fn replay_events(trip_name: &str, raw: &[serde_json::Value]) -> Vec<PushEvent> {
    let mut events = Vec::with_capacity(raw.len());
    for value in raw {
        match PushEvent::from_value(value) {
            Ok(ev) => events.push(ev),
            Err(e) => {
                tracing::warn!(
                    trip_name = %trip_name,
                    error = %e,
                    "Skipping unreadable active-trip event"
                );
            }
        }
    }
    events
}

/// Response to a trip-start request.
#[derive(Debug, Clone, Deserialize)]
struct TripStartedResponse {
    trip_name: String,
}

/// Active trip document returned during cold-start resolution.
#[derive(Debug, Clone, Deserialize)]
struct ActiveTripResponse {
    trip_name: String,
    events: Vec<serde_json::Value>,
}

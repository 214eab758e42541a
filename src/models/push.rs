// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Push event payloads delivered by the backend.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::geo::GeoPoint;
use crate::models::sample::TripEventKind;

/// A validated push event.
///
/// Every event kind carries a position and capture time: start seeds the
/// path, update extends it, and finish records the final position before
/// the status flips.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub kind: TripEventKind,
    pub trip_name: String,
    pub group_id: i64,
    pub point: GeoPoint,
    pub captured_at: DateTime<Utc>,
    pub driver_name: Option<String>,
}

impl PushEvent {
    /// Parse and validate a push payload.
    pub fn parse(body: &str) -> Result<Self, PushParseError> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(&value)
    }

    /// Validate an already-deserialized payload. The backend replays stored
    /// events through the same shape, so the active-trip fetch reuses this.
    ///
    /// Coordinates and group id tolerate both JSON numbers and strings;
    /// push transports commonly stringify every field.
    pub fn from_value(value: &Value) -> Result<Self, PushParseError> {
        let kind = match str_field(value, "type")? {
            "trip_started" => TripEventKind::Start,
            "trip_updated" => TripEventKind::Update,
            "trip_finished" => TripEventKind::Finish,
            other => return Err(PushParseError::UnknownType(other.to_string())),
        };

        let trip_name = str_field(value, "trip_name")?;
        if trip_name.is_empty() {
            return Err(PushParseError::MissingField("trip_name"));
        }

        let group_id = i64_field(value, "group_id")?;
        let latitude = f64_field(value, "latitude")?;
        let longitude = f64_field(value, "longitude")?;
        let point = GeoPoint::new(latitude, longitude).ok_or(
            PushParseError::InvalidCoordinates {
                latitude,
                longitude,
            },
        )?;

        let captured_at = match value.get("timestamp") {
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| PushParseError::BadTimestamp(raw.clone()))?,
            Some(other) => return Err(PushParseError::BadTimestamp(other.to_string())),
            None => return Err(PushParseError::MissingField("timestamp")),
        };

        let driver_name = value
            .get("driver_name")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            kind,
            trip_name: trip_name.to_string(),
            group_id,
            point,
            captured_at,
            driver_name,
        })
    }
}

fn str_field<'a>(value: &'a Value, name: &'static str) -> Result<&'a str, PushParseError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .ok_or(PushParseError::MissingField(name))
}

fn f64_field(value: &Value, name: &'static str) -> Result<f64, PushParseError> {
    match value.get(name) {
        Some(Value::Number(n)) => n.as_f64().ok_or(PushParseError::BadNumber(name)),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| PushParseError::BadNumber(name)),
        Some(_) => Err(PushParseError::BadNumber(name)),
        None => Err(PushParseError::MissingField(name)),
    }
}

fn i64_field(value: &Value, name: &'static str) -> Result<i64, PushParseError> {
    match value.get(name) {
        Some(Value::Number(n)) => n.as_i64().ok_or(PushParseError::BadNumber(name)),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| PushParseError::BadNumber(name)),
        Some(_) => Err(PushParseError::BadNumber(name)),
        None => Err(PushParseError::MissingField(name)),
    }
}

/// Why a push payload was rejected.
#[derive(Debug, thiserror::Error)]
pub enum PushParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("Field is not a usable number: {0}")]
    BadNumber(&'static str),

    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Coordinates out of range: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Unparseable timestamp: {0}")]
    BadTimestamp(String),
}

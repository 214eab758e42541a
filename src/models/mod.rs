// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the trip engine.

pub mod geo;
pub mod push;
pub mod sample;
pub mod session;
pub mod viewing;

pub use geo::GeoPoint;
pub use push::{PushEvent, PushParseError};
pub use sample::{LocationSample, SampleOrigin, TripEventKind};
pub use session::{TripSessionRecord, TripSummary};
pub use viewing::{PathPoint, TripViewingState};

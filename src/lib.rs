// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Convoy-Tracker: share live trip location within a small group
//!
//! This crate runs the trip lifecycle on the producing device, keeps a
//! local-first point log that survives restarts and dead network, and
//! follows other drivers' trips from relay push events.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use config::Config;
use services::ViewerRegistry;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ViewerRegistry>,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - trip lifecycle and sync logic.

pub mod backend;
pub mod keepalive;
pub mod location;
pub mod producer;
pub mod proximity;
pub mod reconciler;
pub mod viewer;

pub use backend::{RelayClient, TripBackend};
pub use keepalive::{Keepalive, LogKeepalive};
pub use location::{
    CancelHandle, Fix, FixStream, FixSubscription, HybridTrigger, LocationError, LocationSource,
    PermissionStatus, SamplingPolicy,
};
pub use producer::ActiveTripProducer;
pub use proximity::{Announcer, ApproachAlert, LogAnnouncer, ProximityWatch};
pub use reconciler::{ReconcileReport, SyncReconciler};
pub use viewer::{EventOutcome, LoadOutcome, TripViewer, ViewerRegistry};

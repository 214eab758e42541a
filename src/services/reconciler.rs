// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sideband redelivery of unsynced samples.
//!
//! The producer never blocks on the network: samples that fail inline
//! delivery stay in the point log with synced=false. The reconciler sweeps
//! them whenever it is invoked. It is idempotent per record, so calling it
//! arbitrarily often is safe; a run with nothing unsynced makes no backend
//! calls at all.

use std::sync::Arc;

use crate::error::Result;
use crate::models::sample::LocationSample;
use crate::services::backend::TripBackend;
use crate::store::PointLog;

/// Outcome counts of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records picked up for delivery
    pub attempted: usize,
    /// Records the backend acknowledged this sweep
    pub delivered: usize,
    /// Records left unsynced for a later sweep
    pub failed: usize,
}

/// Delivers leftover unsynced samples, one record at a time.
pub struct SyncReconciler {
    backend: Arc<dyn TripBackend>,
    point_log: PointLog,
}

impl SyncReconciler {
    pub fn new(backend: Arc<dyn TripBackend>, point_log: PointLog) -> Self {
        Self { backend, point_log }
    }

    /// Sweep the log once. Records are grouped by trip name, each group
    /// keeping its log order, and delivered one at a time. A failure marks
    /// that record failed and moves on; it never blocks the records behind
    /// it. Acknowledged records are marked synced in one rewrite per trip;
    /// a crash before that mark only means those records are sent again on
    /// the next sweep.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let unsynced = self.point_log.unsynced_samples()?;
        if unsynced.is_empty() {
            return Ok(ReconcileReport::default());
        }

        let mut groups: Vec<(String, Vec<LocationSample>)> = Vec::new();
        for sample in unsynced {
            match groups.iter_mut().find(|(name, _)| *name == sample.trip_name) {
                Some((_, group)) => group.push(sample),
                None => groups.push((sample.trip_name.clone(), vec![sample])),
            }
        }

        let mut report = ReconcileReport::default();
        for (trip_name, group) in groups {
            let mut delivered = Vec::new();
            for sample in group {
                report.attempted += 1;
                match self
                    .backend
                    .send_event(sample.group_id, &sample.trip_name, sample.event, sample.point)
                    .await
                {
                    Ok(()) => delivered.push(sample),
                    Err(e) if e.is_delivery_failure() => {
                        report.failed += 1;
                        tracing::debug!(
                            trip_name = %trip_name,
                            error = %e,
                            "Redelivery failed, record stays unsynced"
                        );
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            trip_name = %trip_name,
                            error = %e,
                            "Unexpected redelivery error, record stays unsynced"
                        );
                    }
                }
            }
            if !delivered.is_empty() {
                self.point_log.mark_many_synced(&delivered)?;
                report.delivered += delivered.len();
            }
        }

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Sync reconciliation finished"
        );
        Ok(report)
    }
}

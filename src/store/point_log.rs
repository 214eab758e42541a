// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Append-only location sample log.
//!
//! One JSON record per line. Appends are the hot path; the only rewrite is
//! flipping a record's `synced` flag, which replaces the whole file through
//! a temp file so a crash never leaves a half-written log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::models::sample::{LocationSample, TripEventKind};
use crate::store::{files, persist_atomic, StoreError};

/// Handle to the on-disk point log. Cheap to clone; clones share one lock
/// so appends and rewrites never interleave.
#[derive(Clone)]
pub struct PointLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl PointLog {
    /// Open (or create) the point log inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::Io {
            path: data_dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            path: data_dir.join(files::POINT_LOG),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Append one sample to the log.
    pub fn save(&self, sample: &LocationSample) -> Result<(), StoreError> {
        let _guard = hold(&self.lock);

        let mut line = serde_json::to_string(sample)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_err(e))?;
        file.flush().map_err(|e| self.io_err(e))
    }

    /// All samples belonging to one trip, in log (arrival) order.
    pub fn samples_by_trip_name(&self, trip_name: &str) -> Result<Vec<LocationSample>, StoreError> {
        let _guard = hold(&self.lock);
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|s| s.trip_name == trip_name)
            .collect())
    }

    /// Every sample the backend has not acknowledged yet, in log order.
    pub fn unsynced_samples(&self) -> Result<Vec<LocationSample>, StoreError> {
        let _guard = hold(&self.lock);
        Ok(self.read_all()?.into_iter().filter(|s| !s.synced).collect())
    }

    /// Flip a record's `synced` flag to true.
    ///
    /// Records are addressed by `(trip_name, captured_at, event)`. Marking a
    /// record that is already synced, or one that does not exist, is a
    /// no-op: the reconciler may retry a delivery whose acknowledgment was
    /// lost, and the second mark must succeed quietly.
    pub fn mark_synced(
        &self,
        trip_name: &str,
        captured_at: DateTime<Utc>,
        event: TripEventKind,
    ) -> Result<(), StoreError> {
        let _guard = hold(&self.lock);
        self.mark_records(|s| {
            s.trip_name == trip_name && s.captured_at == captured_at && s.event == event
        })
    }

    /// Flip several records' `synced` flags in one file rewrite.
    pub fn mark_many_synced(&self, delivered: &[LocationSample]) -> Result<(), StoreError> {
        let _guard = hold(&self.lock);
        self.mark_records(|s| {
            delivered.iter().any(|d| {
                d.trip_name == s.trip_name && d.captured_at == s.captured_at && d.event == s.event
            })
        })
    }

    /// Shared mark implementation. Caller must hold the lock.
    fn mark_records(&self, matches: impl Fn(&LocationSample) -> bool) -> Result<(), StoreError> {
        let mut samples = self.read_all()?;
        let mut changed = false;
        for s in samples.iter_mut() {
            if !s.synced && matches(s) {
                s.synced = true;
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }

        let mut contents = String::new();
        for s in &samples {
            contents.push_str(&serde_json::to_string(s)?);
            contents.push('\n');
        }
        persist_atomic(&self.path, &contents)
    }

    /// Read and parse the whole log. Lines that fail to parse (a crash can
    /// truncate the final line) are skipped with a warning rather than
    /// poisoning the log.
    fn read_all(&self) -> Result<Vec<LocationSample>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;

        let mut samples = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LocationSample>(line) {
                Ok(s) => samples.push(s),
                Err(e) => {
                    tracing::warn!(line = idx + 1, error = %e, "Skipping unreadable point log line");
                }
            }
        }
        Ok(samples)
    }

    fn io_err(&self, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source: e,
        }
    }
}

/// Take the lock, recovering the guard if a previous holder panicked.
fn hold(lock: &Mutex<()>) -> std::sync::MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

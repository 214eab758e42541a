// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-document session record store.
//!
//! The record is replaced wholesale on every save. The producing side and
//! the watching side live in one document, so the viewer gets a dedicated
//! clear that cannot clobber a concurrent producer. The file exists only
//! while at least one side is set.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::models::session::TripSessionRecord;
use crate::store::{files, persist_atomic, StoreError};

/// Handle to the on-disk session record. Cheap to clone; clones share one
/// lock so reads and whole-record replacements never interleave.
#[derive(Clone)]
pub struct SessionStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl SessionStore {
    /// Open the session store inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::Io {
            path: data_dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            path: data_dir.join(files::SESSION),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Read the current record. Missing, empty, or unreadable files load as
    /// an empty record: a corrupt session file must not wedge startup.
    pub fn read(&self) -> Result<TripSessionRecord, StoreError> {
        let _guard = hold(&self.lock);
        self.read_locked()
    }

    /// Replace the stored record. Saving an empty record removes the file.
    pub fn save(&self, record: &TripSessionRecord) -> Result<(), StoreError> {
        let _guard = hold(&self.lock);
        self.write_locked(record)
    }

    /// Remove the record entirely.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = hold(&self.lock);
        self.remove_locked()
    }

    /// Drop the watching side in one locked read-modify-write, leaving the
    /// producing side alone.
    pub fn clear_watching_only(&self) -> Result<(), StoreError> {
        let _guard = hold(&self.lock);
        let mut record = self.read_locked()?;
        record.clear_watching();
        self.write_locked(&record)
    }

    fn read_locked(&self) -> Result<TripSessionRecord, StoreError> {
        if !self.path.exists() {
            return Ok(TripSessionRecord::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        if content.trim().is_empty() {
            return Ok(TripSessionRecord::default());
        }
        match serde_json::from_str(&content) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable session record, starting empty");
                Ok(TripSessionRecord::default())
            }
        }
    }

    fn write_locked(&self, record: &TripSessionRecord) -> Result<(), StoreError> {
        if record.is_empty() {
            return self.remove_locked();
        }
        let contents = serde_json::to_string_pretty(record)?;
        persist_atomic(&self.path, &contents)
    }

    fn remove_locked(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| self.io_err(e))?;
        }
        Ok(())
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

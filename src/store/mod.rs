//! Durable local storage (point log + session record).

pub mod point_log;
pub mod session;

pub use point_log::PointLog;
pub use session::SessionStore;

/// File names under the data directory.
pub mod files {
    pub const POINT_LOG: &str = "points.jsonl";
    pub const SESSION: &str = "session.json";
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Replace a file's contents through a temp file in the same directory, so
/// readers never observe a partial write.
pub(crate) fn persist_atomic(path: &std::path::Path, contents: &str) -> Result<(), StoreError> {
    use std::io::Write;

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(contents.as_bytes()).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

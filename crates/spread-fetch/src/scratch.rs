//! Scoped-lifetime scratch storage for downloaded encoded messages,
//! scoped per-fetch-call: a `ScratchDir` is acquired at the top of
//! `fetch()` and its `tempfile::TempDir` is dropped (files removed) when
//! the fetcher returns, on every exit path including panics, since
//! `TempDir`'s `Drop` impl runs during unwind.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{FetchError, Result};

/// A scratch directory released when dropped.
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new(model: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("spread-fetch-{model}-"))
            .tempdir()
            .map_err(|e| FetchError::SourceUnavailable {
                model: model.to_string(),
                reason: format!("could not create scratch directory: {e}"),
            })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn message_path(&self, lead_hour: u32) -> PathBuf {
        self.dir.path().join(format!("fhr{lead_hour:03}.grib2"))
    }
}

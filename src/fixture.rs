//! Fixture store: reference images on durable storage.
//!
//! A fixture is created once, the first time its key is seen, and afterwards
//! only replaced through [`FixtureStore::accept`]. Every write lands in a
//! temporary sibling file first and is renamed into place, so readers never
//! observe a half-written PNG and an interrupted run leaves at most an
//! unreferenced temp file behind.
//!
//! Writes to one key are serialised by a per-key lock; reads of a key share
//! it. Different keys never contend.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;

use crate::codec;
use crate::errors::FixtureError;
use crate::identity::FixtureKey;
use crate::layout::{self, ArtifactKind};
use crate::types::PixelBuffer;

/// Reference images under one fixture root
#[derive(Debug)]
pub struct FixtureStore {
    root: Utf8PathBuf,
    locks: Mutex<HashMap<FixtureKey, Arc<RwLock<()>>>>,
}

impl FixtureStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the fixture for `key` lives
    pub fn path(&self, key: &FixtureKey) -> Utf8PathBuf {
        layout::fixture_path(&self.root, key)
    }

    /// Whether a fixture has been recorded for `key`
    pub fn exists(&self, key: &FixtureKey) -> bool {
        let lock = self.lock_for(key);
        let _guard = lock.read();
        self.path(key).is_file()
    }

    /// Decode the fixture for `key`
    pub fn load(&self, key: &FixtureKey) -> Result<PixelBuffer, FixtureError> {
        let lock = self.lock_for(key);
        let _guard = lock.read();
        let bytes = self.read_bytes(key)?;
        Ok(codec::decode(&bytes)?)
    }

    /// Record `candidate` as the first fixture for `key`.
    ///
    /// Fails with [`FixtureError::AlreadyExists`] when a fixture is already
    /// present: bootstrapping never overwrites.
    pub fn bootstrap(
        &self,
        key: &FixtureKey,
        candidate: &PixelBuffer,
    ) -> Result<Utf8PathBuf, FixtureError> {
        let bytes = codec::encode(candidate)?;
        let path = self.path(key);

        let lock = self.lock_for(key);
        let _guard = lock.write();

        if path.exists() {
            return Err(FixtureError::AlreadyExists {
                key: key.clone(),
                path,
            });
        }

        let staged = stage(&path, &bytes).map_err(|source| FixtureError::Io {
            path: path.clone(),
            source,
        })?;
        staged.persist_noclobber(&path).map_err(|err| {
            if err.error.kind() == io::ErrorKind::AlreadyExists {
                FixtureError::AlreadyExists {
                    key: key.clone(),
                    path: path.clone(),
                }
            } else {
                FixtureError::Io {
                    path: path.clone(),
                    source: err.error,
                }
            }
        })?;

        crate::log::info!(%key, %path, "baseline fixture created");
        Ok(path)
    }

    /// Replace (or create) the fixture for `key` with `candidate`.
    ///
    /// This is the explicit "accept new baseline" verb; comparisons never call
    /// it.
    pub fn accept(
        &self,
        key: &FixtureKey,
        candidate: &PixelBuffer,
    ) -> Result<Utf8PathBuf, FixtureError> {
        let bytes = codec::encode(candidate)?;
        let path = self.path(key);

        let lock = self.lock_for(key);
        let _guard = lock.write();
        write_atomic(&path, &bytes).map_err(|source| FixtureError::Io {
            path: path.clone(),
            source,
        })?;

        crate::log::info!(%key, %path, "fixture accepted");
        Ok(path)
    }

    /// Copy the stored fixture bytes to `<target_root>/<suite>/fixture/<name>.png`
    pub fn copy_for_report(
        &self,
        key: &FixtureKey,
        target_root: &Utf8Path,
    ) -> Result<Utf8PathBuf, FixtureError> {
        let lock = self.lock_for(key);
        let _guard = lock.read();
        let bytes = self.read_bytes(key)?;
        self.write_report_copy(key, target_root, &bytes)
    }

    /// Decode the fixture for `key` and copy its bytes for the report.
    ///
    /// Both happen under one read guard, so the copy is always the image that
    /// was decoded even while another thread accepts a new baseline.
    pub fn load_for_report(
        &self,
        key: &FixtureKey,
        target_root: &Utf8Path,
    ) -> Result<PixelBuffer, FixtureError> {
        let lock = self.lock_for(key);
        let _guard = lock.read();
        let bytes = self.read_bytes(key)?;
        self.write_report_copy(key, target_root, &bytes)?;
        Ok(codec::decode(&bytes)?)
    }

    fn write_report_copy(
        &self,
        key: &FixtureKey,
        target_root: &Utf8Path,
        bytes: &[u8],
    ) -> Result<Utf8PathBuf, FixtureError> {
        let destination = layout::artifact_path(target_root, ArtifactKind::Fixture, key);
        write_atomic(&destination, bytes).map_err(|source| FixtureError::Io {
            path: destination.clone(),
            source,
        })?;
        crate::log::debug!(%key, %destination, "fixture copied for report");
        Ok(destination)
    }

    fn read_bytes(&self, key: &FixtureKey) -> Result<Vec<u8>, FixtureError> {
        let path = self.path(key);
        fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                FixtureError::NotFound {
                    key: key.clone(),
                    path,
                }
            } else {
                FixtureError::Io { path, source }
            }
        })
    }

    fn lock_for(&self, key: &FixtureKey) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}

/// Write `bytes` to `path` through a temp file and a rename.
///
/// Parent directories are created as needed. An existing file at `path` is
/// replaced in one step.
pub fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> io::Result<()> {
    let staged = stage(path, bytes)?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Temp file next to `path` holding `bytes`, deleted on drop
fn stage(path: &Utf8Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = tempfile::Builder::new()
        .prefix(".snapdiff-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    Ok(file)
}

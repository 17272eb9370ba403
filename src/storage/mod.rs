//! Local storage for downloaded assets.
//!
//! Writing an asset is a two-phase affair: a filename is first *reserved*
//! (its public URL may already be handed out), and the file is later
//! *materialized* by writing to a hidden temp file and renaming it into place.
//! The temp name is random, so a static file server pointed at the directory
//! never exposes a partially written asset under a predictable path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed for {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("Storage directory unavailable {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Route prefix the static file server uses for this directory
pub const PUBLIC_PREFIX: &str = "voice";

/// Observable state of a single asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    /// File is complete and servable
    Ready,
    /// URL handed out, write not finished yet
    Pending,
    /// Never reserved, or the download failed
    Missing,
}

/// Local directory holding materialized assets
#[derive(Debug)]
pub struct AssetStore {
    dir: PathBuf,
    public_base_url: String,
    in_flight: Mutex<HashSet<String>>,
}

impl AssetStore {
    /// Open the store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>, public_base_url: &str) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::DirectoryUnavailable {
            path: dir.clone(),
            source,
        })?;

        Ok(Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Externally reachable URL for `filename`
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, PUBLIC_PREFIX, filename)
    }

    /// Mark `filename` as pending.
    ///
    /// The reservation is released again when the returned guard is dropped
    /// without [`Reservation::commit`].
    pub fn reserve(&self, filename: &str) -> Result<Reservation<'_>> {
        validate_filename(filename)?;
        self.lock_in_flight().insert(filename.to_string());
        Ok(Reservation {
            store: self,
            filename: filename.to_string(),
            committed: false,
        })
    }

    /// Drop a reservation whose download will never complete
    pub fn release(&self, filename: &str) {
        self.lock_in_flight().remove(filename);
    }

    /// Write `data` to `filename` atomically and clear its reservation.
    ///
    /// The reservation is cleared on failure as well.
    pub async fn materialize(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let result = self.write_atomic(filename, data).await;
        self.release(filename);
        result
    }

    async fn write_atomic(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        validate_filename(filename)?;

        let target = self.dir.join(filename);
        let temp = self.dir.join(format!(".{}.part", uuid::Uuid::new_v4().simple()));

        let written = async {
            tokio::fs::write(&temp, data).await?;
            set_permissive(&temp).await?;
            tokio::fs::rename(&temp, &target).await
        }
        .await;

        if let Err(source) = written {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::WriteFailed { path: target, source });
        }

        tracing::debug!(path = %target.display(), size = data.len(), "Asset materialized");

        Ok(target)
    }

    /// Readiness check for a previously returned URL
    pub fn state(&self, filename: &str) -> Result<AssetState> {
        validate_filename(filename)?;

        if self.dir.join(filename).is_file() {
            Ok(AssetState::Ready)
        } else if self.lock_in_flight().contains(filename) {
            Ok(AssetState::Pending)
        } else {
            Ok(AssetState::Missing)
        }
    }

    /// Number of reserved but not yet materialized assets
    pub fn pending(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still a valid set of names
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Pending asset whose download has not been handed to a worker yet
#[must_use = "dropping a reservation releases it"]
#[derive(Debug)]
pub struct Reservation<'a> {
    store: &'a AssetStore,
    filename: String,
    committed: bool,
}

impl Reservation<'_> {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn url(&self) -> String {
        self.store.url_for(&self.filename)
    }

    /// Keep the name pending; whoever writes the asset now owns the release
    pub fn commit(mut self) -> String {
        self.committed = true;
        self.url()
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.store.release(&self.filename);
        }
    }
}

/// Filenames must be a single plain path segment
fn validate_filename(filename: &str) -> Result<()> {
    let plain = !filename.is_empty()
        && !filename.starts_with('.')
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if plain {
        Ok(())
    } else {
        Err(StorageError::InvalidFilename(filename.to_string()))
    }
}

#[cfg(unix)]
async fn set_permissive(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666)).await
}

#[cfg(not(unix))]
async fn set_permissive(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

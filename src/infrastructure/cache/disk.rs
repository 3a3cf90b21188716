//! Content-addressed on-disk byte store.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheFlags, ImageData, Request};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::Fetched;

/// Extensions whose payloads decode lazily (animated or video containers);
/// the disk tier hands their bytes back instead of decoding in place.
const DEFERRED_DECODE_EXTENSIONS: [&str; 3] = ["gif", "mp4", "mov"];

/// Persistent byte store keyed by the request's cache key.
///
/// Entries are written once on a successful network fetch and never evicted
/// by this subsystem; reclaiming space is left to the filesystem.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    use_subdir: bool,
}

impl DiskCache {
    /// Creates a disk cache rooted at `dir`, creating the directory if
    /// needed. With `use_subdir`, entries are sharded one level deep by the
    /// first two hex characters of the key.
    ///
    /// # Errors
    /// Returns an error when the root directory cannot be created.
    pub fn new(dir: PathBuf, use_subdir: bool) -> LoadResult<Self> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| LoadError::io(format!("failed to create cache dir: {e}")))?;
        Ok(Self { dir, use_subdir })
    }

    /// Creates a disk cache in the platform cache directory.
    ///
    /// # Errors
    /// Returns an error when the directory cannot be created.
    pub fn default_location(use_subdir: bool) -> LoadResult<Self> {
        Self::new(default_cache_dir(), use_subdir)
    }

    /// Root directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether this tier applies to the request.
    #[must_use]
    pub fn is_valid(&self, request: &Request) -> bool {
        request.caches().contains(CacheFlags::DISK)
    }

    /// Deterministic path for a request: `dir/[key[..2]/]key`.
    #[must_use]
    pub fn local_path(&self, request: &Request) -> PathBuf {
        let key = request.key();
        if self.use_subdir
            && let Some(shard) = key.get(..2)
        {
            return self.dir.join(shard).join(key);
        }
        self.dir.join(key)
    }

    /// Looks up the cached payload for a request.
    ///
    /// Animated/video extensions come back as raw bytes so the decode stage
    /// can handle frames and timing; everything else decodes directly to a
    /// still image. Decode failures are logged and treated as a miss.
    pub async fn load(&self, request: &Request) -> Option<Fetched> {
        let path = self.local_path(request);
        let Ok(bytes) = fs::read(&path).await else {
            trace!(key = %request.key(), "disk cache miss");
            return None;
        };
        trace!(key = %request.key(), path = %path.display(), "disk cache hit");

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if ext.is_some_and(|e| DEFERRED_DECODE_EXTENSIONS.contains(&e.as_str())) {
            return Some(Fetched::Bytes(bytes.into()));
        }

        let decoded =
            tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await;
        match decoded {
            Ok(Ok(img)) => {
                debug!(key = %request.key(), "decoded image from disk cache");
                Some(Fetched::Image(ImageData::Static(img)))
            }
            Ok(Err(e)) => {
                warn!(key = %request.key(), error = %e, "failed to decode cached file");
                None
            }
            Err(e) => {
                warn!(key = %request.key(), error = %e, "disk decode task failed");
                None
            }
        }
    }

    /// Writes a payload for a request, creating intermediate directories.
    ///
    /// Empty payloads are not written. Callers treat failures as
    /// non-fatal: disk caching is an optimization, not a requirement.
    ///
    /// # Errors
    /// Returns an error when the directory or file cannot be written.
    pub async fn store(&self, request: &Request, data: &[u8]) -> LoadResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let path = self.local_path(request);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| LoadError::io(format!("failed to create shard dir: {e}")))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| LoadError::io(format!("failed to write cache file: {e}")))?;

        debug!(key = %request.key(), path = %path.display(), size = data.len(), "stored bytes in disk cache");
        Ok(())
    }

    /// Checks whether a payload exists for the request.
    pub async fn contains(&self, request: &Request) -> bool {
        fs::try_exists(self.local_path(request)).await.unwrap_or(false)
    }
}

/// Platform cache directory for the crate, with a temp-dir fallback.
fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "tecknian", "pixfetch").map_or_else(
        || std::env::temp_dir().join("pixfetch").join("cache"),
        |dirs| dirs.cache_dir().join("images"),
    )
}

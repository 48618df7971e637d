//! On-disk envelope store.

use crate::cache::CacheKey;
use crate::envelope::{Envelope, ENVELOPE_BYTE_LEN};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persists envelopes as one fixed-size blob per cache key.
///
/// Writes are atomic-replace (temp file + rename) within the cache
/// directory. No cross-process locking is attempted; a single process
/// instance is assumed. There is no eviction.
#[derive(Debug, Clone)]
pub struct EnvelopeCache {
    directory: PathBuf,
}

impl EnvelopeCache {
    /// Create a store rooted at `directory`. The directory is created lazily
    /// on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// The cache directory this store writes into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Look up a previously stored envelope.
    ///
    /// Returns `None` for a missing entry, a blob of the wrong size, or any
    /// read error, and the caller falls back to recomputing. Never errors.
    pub async fn lookup(&self, key: &CacheKey) -> Option<Envelope> {
        let path = self.entry_path(key);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(%key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        if bytes.len() != ENVELOPE_BYTE_LEN {
            warn!(
                %key,
                len = bytes.len(),
                "cache entry has wrong size, treating as miss"
            );
            return None;
        }

        match Envelope::from_bytes(&bytes) {
            Ok(envelope) => {
                debug!(%key, "cache hit");
                Some(envelope)
            }
            Err(e) => {
                warn!(%key, error = %e, "cache entry unparsable, treating as miss");
                None
            }
        }
    }

    /// Persist an envelope under `key`.
    ///
    /// Failures are logged and swallowed: a cache-store failure must never
    /// fail the foreground operation.
    pub async fn store(&self, key: &CacheKey, envelope: &Envelope) {
        if let Err(e) = self.try_store(key, envelope).await {
            warn!(%key, error = %e, "failed to persist envelope, result stays unpersisted");
        }
    }

    async fn try_store(&self, key: &CacheKey, envelope: &Envelope) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.directory).await?;

        // Write to a sibling temp file, then rename over the final name so
        // readers never observe a partial blob.
        let tmp_path = self.directory.join(format!("{key}.tmp"));
        let final_path = self.entry_path(key);

        tokio::fs::write(&tmp_path, envelope.to_bytes()).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        debug!(%key, path = %final_path.display(), "stored envelope");
        Ok(())
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.as_str())
    }
}

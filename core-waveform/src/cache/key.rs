//! Cache key derivation from source file identity.

use crate::error::{Result, WaveformError};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// DJB2 seed value.
const DJB2_SEED: u64 = 5381;

/// Identity of a source audio file: path plus last-modification time.
///
/// Used only to derive a [`CacheKey`]; immutable once constructed. The
/// modification time is floored to whole epoch seconds so the key is stable
/// across filesystems with differing sub-second precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFileRef {
    path: PathBuf,
    modified_secs: u64,
}

impl AudioFileRef {
    /// Create a reference from an already-known modification time.
    pub fn new(path: impl Into<PathBuf>, modified_secs: u64) -> Self {
        Self {
            path: path.into(),
            modified_secs,
        }
    }

    /// Build a reference by statting `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WaveformError::Source`] if the file cannot be statted or
    /// carries a modification time before the epoch.
    pub async fn resolve(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            WaveformError::Source(format!("Failed to stat {}: {}", path.display(), e))
        })?;

        let modified = metadata.modified().map_err(|e| {
            WaveformError::Source(format!(
                "No modification time for {}: {}",
                path.display(),
                e
            ))
        })?;

        let modified_secs = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|e| {
                WaveformError::Source(format!(
                    "Pre-epoch modification time for {}: {}",
                    path.display(),
                    e
                ))
            })?
            .as_secs();

        Ok(Self {
            path: path.to_path_buf(),
            modified_secs,
        })
    }

    /// Source file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time in whole epoch seconds.
    pub fn modified_secs(&self) -> u64 {
        self.modified_secs
    }

    /// Derive the cache key for this file identity.
    pub fn cache_key(&self) -> CacheKey {
        let material = format!("{}|{}", self.path.display(), self.modified_secs);
        CacheKey::derive(material.as_bytes())
    }
}

/// Hex-encoded 64-bit hash naming one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from raw key material using a DJB2-style rolling hash
    /// (`hash = hash * 33 + byte`) over a wrapping 64-bit accumulator.
    pub fn derive(material: &[u8]) -> Self {
        let mut hash = DJB2_SEED;
        for &byte in material {
            hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
        }
        Self(format!("{:016x}", hash))
    }

    /// The hex form used as the cache file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_hex() {
        // hash("") is the bare seed
        assert_eq!(CacheKey::derive(b"").as_str(), "0000000000001505");

        let key = AudioFileRef::new("/music/track.flac", 1_700_000_000).cache_key();
        assert_eq!(key.as_str().len(), 16);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        // Deterministic
        let again = AudioFileRef::new("/music/track.flac", 1_700_000_000).cache_key();
        assert_eq!(key, again);
    }

    #[test]
    fn key_changes_with_modification_time() {
        let before = AudioFileRef::new("/music/track.flac", 1_700_000_000).cache_key();
        let after = AudioFileRef::new("/music/track.flac", 1_700_000_001).cache_key();
        assert_ne!(before, after);
    }

    #[test]
    fn key_changes_with_path() {
        let a = AudioFileRef::new("/music/a.flac", 1_700_000_000).cache_key();
        let b = AudioFileRef::new("/music/b.flac", 1_700_000_000).cache_key();
        assert_ne!(a, b);
    }
}

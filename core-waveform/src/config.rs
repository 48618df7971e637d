//! Waveform service configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::envelope::ENVELOPE_BINS;

/// Configuration for the waveform service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformConfig {
    /// Directory that holds cached envelope blobs, one file per source track.
    ///
    /// Relative paths are resolved against the process working directory;
    /// host applications normally pass an absolute app-cache subdirectory.
    pub cache_directory: PathBuf,

    /// Number of sequential chunks the streaming reduction is split into.
    ///
    /// Each chunk boundary is a progress emission, a cancellation checkpoint
    /// and a scheduler yield (default: 16).
    pub progress_chunks: usize,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            cache_directory: PathBuf::from("waveform_cache"),
            progress_chunks: 16,
        }
    }
}

impl WaveformConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache directory.
    pub fn with_cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Set the streaming chunk count.
    pub fn with_progress_chunks(mut self, chunks: usize) -> Self {
        self.progress_chunks = chunks;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_directory.as_os_str().is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        if self.progress_chunks == 0 {
            return Err("progress_chunks must be at least 1".to_string());
        }

        if self.progress_chunks > ENVELOPE_BINS {
            return Err(format!(
                "progress_chunks cannot exceed the bin count ({})",
                ENVELOPE_BINS
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = WaveformConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.progress_chunks, 16);
    }

    #[test]
    fn builder_setters() {
        let config = WaveformConfig::new()
            .with_cache_directory("/tmp/waveforms")
            .with_progress_chunks(8);

        assert_eq!(config.cache_directory, PathBuf::from("/tmp/waveforms"));
        assert_eq!(config.progress_chunks, 8);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(WaveformConfig::new()
            .with_cache_directory("")
            .validate()
            .is_err());
        assert!(WaveformConfig::new()
            .with_progress_chunks(0)
            .validate()
            .is_err());
        assert!(WaveformConfig::new()
            .with_progress_chunks(ENVELOPE_BINS + 1)
            .validate()
            .is_err());
    }
}

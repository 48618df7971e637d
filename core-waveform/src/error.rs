//! # Waveform Error Types
//!
//! Error types for waveform extraction and caching operations.
//!
//! Errors are `Clone` because a single pipeline may have several attached
//! awaiters, each of which receives the same failure.

use thiserror::Error;

/// Errors that can occur while computing or caching a waveform envelope.
#[derive(Error, Debug, Clone)]
pub enum WaveformError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Failed to open or stat the source audio file.
    #[error("Failed to open audio source: {0}")]
    Source(String),

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Audio format is not recognized or cannot be parsed.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Codec is not supported by the decoder.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Error occurred during audio decoding.
    #[error("Decoding error: {0}")]
    Decode(String),

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Envelope cache operation failed.
    ///
    /// Absorbed inside the service boundary: a cache failure degrades to a
    /// recompute (read) or an unpersisted result (write), never to a caller
    /// visible error.
    #[error("Cache error: {0}")]
    Cache(String),

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// The pipeline was superseded by a request for a different file.
    ///
    /// Not a true failure; every awaiter attached to the cancelled pipeline
    /// observes it identically.
    #[error("Waveform computation cancelled")]
    Cancelled,

    /// Invalid service configuration.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WaveformError {
    /// Returns `true` if this error signals cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaveformError::Cancelled)
    }

    /// Returns `true` if this error originated in the decode step.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            WaveformError::Source(_)
                | WaveformError::InvalidFormat(_)
                | WaveformError::UnsupportedCodec(_)
                | WaveformError::Decode(_)
        )
    }

    /// Returns `true` if this error is related to the envelope cache.
    pub fn is_cache_error(&self) -> bool {
        matches!(self, WaveformError::Cache(_))
    }
}

/// Result type for waveform operations.
pub type Result<T> = std::result::Result<T, WaveformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(WaveformError::Cancelled.is_cancelled());
        assert!(!WaveformError::Cancelled.is_decode_error());

        assert!(WaveformError::Source("gone".into()).is_decode_error());
        assert!(WaveformError::Decode("bad frame".into()).is_decode_error());
        assert!(WaveformError::UnsupportedCodec("shorten".into()).is_decode_error());

        assert!(WaveformError::Cache("disk full".into()).is_cache_error());
        assert!(!WaveformError::Cache("disk full".into()).is_decode_error());
    }
}

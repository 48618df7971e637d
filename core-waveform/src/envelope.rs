//! # Amplitude Envelope
//!
//! The fixed-resolution waveform summary produced by the reduction engine and
//! persisted by the cache.

use crate::error::{Result, WaveformError};

/// Number of time bins in every envelope, regardless of file duration.
pub const ENVELOPE_BINS: usize = 2048;

/// Exact byte length of a serialized envelope: 2048 little-endian f32 values,
/// no header, no version field.
pub const ENVELOPE_BYTE_LEN: usize = ENVELOPE_BINS * 4;

/// A fixed 2048-bin normalized amplitude summary of one audio file.
///
/// Bin `i` holds the peak absolute sample magnitude, across all channels,
/// within the i-th equal slice of the file's frames, divided by the file's
/// single highest peak. Values are therefore in `[0.0, 1.0]`, and a silent or
/// empty file yields all zeros.
///
/// Envelopes are immutable once produced; a cache miss always produces a
/// fresh instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    bins: Vec<f32>,
}

impl Envelope {
    /// The all-zero envelope of a silent or empty file.
    pub fn silent() -> Self {
        Self {
            bins: vec![0.0; ENVELOPE_BINS],
        }
    }

    /// Wrap reduced bins. The reducer guarantees the length invariant.
    pub(crate) fn from_bins(bins: Vec<f32>) -> Self {
        debug_assert_eq!(bins.len(), ENVELOPE_BINS);
        Self { bins }
    }

    /// The normalized per-bin amplitudes, always exactly 2048 values.
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Returns `true` if every bin is zero.
    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|&b| b == 0.0)
    }

    /// Serialize to the on-disk form: exactly [`ENVELOPE_BYTE_LEN`] bytes of
    /// little-endian f32 values.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENVELOPE_BYTE_LEN);
        for bin in &self.bins {
            bytes.extend_from_slice(&bin.to_le_bytes());
        }
        bytes
    }

    /// Parse the on-disk form. Any length other than [`ENVELOPE_BYTE_LEN`]
    /// is rejected; the cache treats that as a miss.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENVELOPE_BYTE_LEN {
            return Err(WaveformError::Cache(format!(
                "envelope blob must be exactly {} bytes, got {}",
                ENVELOPE_BYTE_LEN,
                bytes.len()
            )));
        }

        let bins = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self { bins })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_envelope_invariants() {
        let envelope = Envelope::silent();
        assert_eq!(envelope.bins().len(), ENVELOPE_BINS);
        assert!(envelope.is_silent());
    }

    #[test]
    fn byte_round_trip_is_exact() {
        let mut bins = vec![0.0f32; ENVELOPE_BINS];
        bins[0] = 1.0;
        bins[1] = 0.25;
        bins[2047] = 0.5;
        let envelope = Envelope::from_bins(bins);

        let bytes = envelope.to_bytes();
        assert_eq!(bytes.len(), ENVELOPE_BYTE_LEN);

        let parsed = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Envelope::from_bytes(&[]).is_err());
        assert!(Envelope::from_bytes(&vec![0u8; ENVELOPE_BYTE_LEN - 4]).is_err());
        assert!(Envelope::from_bytes(&vec![0u8; ENVELOPE_BYTE_LEN + 1]).is_err());
    }
}

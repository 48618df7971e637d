//! # Core Waveform Traits
//!
//! This module defines the decoder boundary the waveform engine depends on.
//!
//! ## Architecture
//!
//! The engine never implements codec logic itself. It consumes a
//! [`WaveformDecoder`] capability that turns a file path into a [`PcmBuffer`],
//! and reduces that buffer to an envelope. Decoding is potentially slow,
//! blocking work; implementations must keep it off the async coordination
//! path (the bundled symphonia adapter uses `spawn_blocking`).
//!
//! ## Threading Model
//!
//! Decoders are shared across requests behind an `Arc`, so the trait requires
//! `Send + Sync`.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Raw decoded audio for one file, in planar layout.
///
/// Each channel occupies its own sample plane; all planes have the same
/// length (the frame count). The buffer is owned exclusively by one reduction
/// pass and dropped as soon as the envelope is computed, so large files never
/// stay resident longer than necessary.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// One sample plane per channel, values in [-1.0, 1.0].
    planes: Vec<Vec<f32>>,

    /// Sample rate in Hz (e.g., 44100, 48000).
    sample_rate: u32,
}

impl PcmBuffer {
    /// Create a buffer from planar channel data.
    ///
    /// All planes must have equal length; a decoder that produces ragged
    /// planes is buggy.
    pub fn new(planes: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(
            planes.windows(2).all(|w| w[0].len() == w[1].len()),
            "channel planes must have equal frame counts"
        );
        Self {
            planes,
            sample_rate,
        }
    }

    /// Create a buffer from interleaved samples (LRLRLR... for stereo).
    ///
    /// Trailing samples that do not fill a whole frame are discarded.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        if channels == 0 {
            return Self::new(Vec::new(), sample_rate);
        }

        let frames = samples.len() / channels;
        let mut planes = vec![Vec::with_capacity(frames); channels];
        for frame in 0..frames {
            for (ch, plane) in planes.iter_mut().enumerate() {
                plane.push(samples[frame * channels + ch]);
            }
        }
        Self::new(planes, sample_rate)
    }

    /// Number of sample frames (one frame = one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.planes.first().map(|p| p.len()).unwrap_or(0)
    }

    /// Number of audio channels.
    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Per-channel sample planes.
    pub fn planes(&self) -> &[Vec<f32>] {
        &self.planes
    }

    /// Returns `true` if the buffer contains no audio frames.
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration of the buffered audio.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

/// Trait for decoders that turn an audio file into raw PCM.
///
/// This is the engine's external-collaborator boundary: any audio decoding
/// library can satisfy it. Calls may take multiple seconds for large files,
/// so implementations must perform the heavy work on a blocking-friendly
/// execution context rather than on the caller's async task.
///
/// # Errors
///
/// Implementations fail with [`crate::WaveformError::Source`] for unreadable
/// files, [`crate::WaveformError::InvalidFormat`] /
/// [`crate::WaveformError::UnsupportedCodec`] for unrecognized input, and
/// [`crate::WaveformError::Decode`] for corrupt streams. A zero-length but
/// well-formed stream is not an error; it decodes to an empty buffer.
#[async_trait]
pub trait WaveformDecoder: Send + Sync {
    /// Decode the entire file at `path` into a planar PCM buffer at its
    /// native channel count and sample rate.
    async fn decode(&self, path: &Path) -> Result<PcmBuffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_round_trip() {
        // Stereo: L = 0.1, 0.3; R = 0.2, 0.4
        let buffer = PcmBuffer::from_interleaved(&[0.1, 0.2, 0.3, 0.4], 2, 44100);

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.planes()[0], vec![0.1, 0.3]);
        assert_eq!(buffer.planes()[1], vec![0.2, 0.4]);
    }

    #[test]
    fn interleaved_discards_partial_frame() {
        let buffer = PcmBuffer::from_interleaved(&[0.1, 0.2, 0.3], 2, 44100);
        assert_eq!(buffer.frame_count(), 1);
    }

    #[test]
    fn empty_buffer() {
        let buffer = PcmBuffer::new(Vec::new(), 48000);
        assert!(buffer.is_empty());
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.channel_count(), 0);
        assert_eq!(buffer.duration(), Duration::ZERO);
    }

    #[test]
    fn duration_from_sample_rate() {
        let buffer = PcmBuffer::new(vec![vec![0.0; 44100]], 44100);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
    }
}

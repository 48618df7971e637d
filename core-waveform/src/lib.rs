//! # Waveform Extraction & Caching Module
//!
//! Computes fixed-resolution amplitude envelopes for audio files so the player
//! UI can render a waveform overview without touching the playback path.
//!
//! ## Overview
//!
//! This crate handles:
//! - Decoding an audio file to PCM through an injectable decoder boundary
//! - Reducing PCM to a fixed 2048-bin normalized peak envelope
//! - Persisting envelopes in an on-disk cache keyed by path + mtime
//! - Coordinating requests under a single-flight discipline driven by rapid
//!   track navigation (the most recently requested file always wins)
//!
//! The entry point is [`WaveformService`], constructed with a
//! [`WaveformDecoder`] implementation and a [`WaveformConfig`]. A
//! symphonia-backed decoder is provided behind the `core-decoder` feature.

pub mod cache;
pub mod config;
pub mod decoder;
pub mod envelope;
pub mod error;
pub mod reducer;
pub mod service;
pub mod traits;

pub use cache::{AudioFileRef, CacheKey, EnvelopeCache};
pub use config::WaveformConfig;
pub use envelope::{Envelope, ENVELOPE_BINS, ENVELOPE_BYTE_LEN};
pub use error::{Result, WaveformError};
pub use service::WaveformService;
pub use traits::{PcmBuffer, WaveformDecoder};

#[cfg(feature = "core-decoder")]
pub use decoder::SymphoniaDecoder;

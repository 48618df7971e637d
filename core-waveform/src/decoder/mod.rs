//! # Decoder Implementations
//!
//! Bundled [`crate::WaveformDecoder`] implementations. The symphonia-backed
//! decoder is feature-gated (`core-decoder`) so hosts that inject their own
//! decoder can build without any codec crates.

#[cfg(feature = "core-decoder")]
mod sample_converter;
#[cfg(feature = "core-decoder")]
mod symphonia;

#[cfg(feature = "core-decoder")]
pub use self::symphonia::SymphoniaDecoder;

//! # Symphonia Decoder Implementation
//!
//! Whole-file decoder built on the Symphonia library, satisfying the
//! [`WaveformDecoder`] boundary.

use crate::decoder::sample_converter::PlanarAccumulator;
use crate::error::{Result, WaveformError};
use crate::traits::{PcmBuffer, WaveformDecoder};
use async_trait::async_trait;
use std::path::Path;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, instrument, warn};

/// Give up after this many consecutive bad packets.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Symphonia-backed [`WaveformDecoder`].
///
/// Decodes the entire file in one pass on the blocking thread pool, so the
/// async caller never stalls a runtime worker; a multi-minute FLAC can take
/// seconds here. Corrupted packets are skipped with bounded tolerance, the
/// same recovery discipline as the playback decode path.
///
/// The decoder is stateless and can be shared behind one `Arc` for the
/// lifetime of the service.
#[derive(Debug, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WaveformDecoder for SymphoniaDecoder {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn decode(&self, path: &Path) -> Result<PcmBuffer> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || decode_file(&path))
            .await
            .map_err(|e| WaveformError::Internal(format!("decode task failed: {}", e)))?
    }
}

/// Blocking whole-file decode to planar f32 PCM.
fn decode_file(path: &Path) -> Result<PcmBuffer> {
    // Step 1: Open the file as a media source
    let file = std::fs::File::open(path).map_err(|e| {
        error!("Failed to open file {:?}: {}", path, e);
        WaveformError::Source(format!("Failed to open file: {}", e))
    })?;

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let media_source = Box::new(file) as Box<dyn MediaSource>;
    let mss = MediaSourceStream::new(media_source, Default::default());

    // Step 2: Probe format
    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            error!("Format probe failed: {}", e);
            WaveformError::InvalidFormat(format!("Failed to probe format: {}", e))
        })?;

    let mut format_reader = probe_result.format;

    // Step 3: Find first audio track with a supported codec
    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            error!("No supported audio tracks found");
            WaveformError::InvalidFormat("No supported audio tracks".to_string())
        })?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| WaveformError::InvalidFormat("Missing sample rate".to_string()))?;

    debug!(
        "Selected track {} at {}Hz for waveform decode",
        track_id, sample_rate
    );

    // Step 4: Create codec decoder
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| {
            error!("Failed to create decoder: {}", e);
            WaveformError::UnsupportedCodec(format!("Failed to create codec decoder: {}", e))
        })?;

    // Step 5: Drain the packet stream into planar sample planes
    let mut accumulator = PlanarAccumulator::new();
    accumulator.set_sample_rate(sample_rate);
    let mut consecutive_errors = 0;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Normal end of stream
                debug!(
                    "Reached end of stream after {} frames",
                    accumulator.frame_count()
                );
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                warn!("Track list changed mid-stream");
                return Err(WaveformError::Decode(
                    "Track list changed, reset required".to_string(),
                ));
            }
            Err(SymphoniaError::IoError(e)) => {
                consecutive_errors += 1;
                warn!(
                    "I/O error reading packet (attempt {}/{}): {}",
                    consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                );
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(WaveformError::Source(format!(
                        "Stream I/O failure after {} attempts: {}",
                        MAX_CONSECUTIVE_ERRORS, e
                    )));
                }
                continue;
            }
            Err(e) => {
                error!("Fatal format reader error: {}", e);
                return Err(WaveformError::Decode(format!(
                    "Failed to read packet: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                consecutive_errors = 0;
                accumulator.append(&decoded);
            }
            Err(SymphoniaError::IoError(e)) => {
                consecutive_errors += 1;
                warn!(
                    "Skipping corrupted packet (I/O error, attempt {}/{}): {}",
                    consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                );
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(WaveformError::Decode(format!(
                        "Stream corruption after {} failed packets",
                        MAX_CONSECUTIVE_ERRORS
                    )));
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                consecutive_errors += 1;
                warn!(
                    "Skipping packet with decode error (attempt {}/{}): {}",
                    consecutive_errors, MAX_CONSECUTIVE_ERRORS, e
                );
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(WaveformError::Decode(format!(
                        "Decoder failure after {} failed packets: {}",
                        MAX_CONSECUTIVE_ERRORS, e
                    )));
                }
            }
            Err(e) => {
                error!("Fatal decode error: {}", e);
                return Err(WaveformError::Decode(format!(
                    "Failed to decode packet: {}",
                    e
                )));
            }
        }
    }

    // A zero-frame stream is valid input; the reducer maps it to silence.
    Ok(accumulator.into_pcm())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let decoder = SymphoniaDecoder::new();
        let result = decoder.decode(Path::new("/nonexistent/track.flac")).await;
        assert!(matches!(result, Err(WaveformError::Source(_))));
    }

    #[tokio::test]
    async fn garbage_bytes_are_an_invalid_format_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("core_waveform_garbage_input.bin");
        std::fs::write(&path, b"this is not audio data at all").unwrap();

        let decoder = SymphoniaDecoder::new();
        let result = decoder.decode(&path).await;
        assert!(matches!(result, Err(WaveformError::InvalidFormat(_))));

        let _ = std::fs::remove_file(&path);
    }
}

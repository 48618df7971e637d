//! # Peak Reduction Engine
//!
//! Reduces raw PCM into the fixed 2048-bin peak envelope, either in one shot
//! or chunked for progressive UI feedback.
//!
//! Both variants share one rule: bin `i` covers frames
//! `[i * fpb, min((i + 1) * fpb, frame_count))` with
//! `fpb = max(1, frame_count / 2048)`, and holds the maximum absolute sample
//! over all channels in that range. The final bin may cover fewer frames when
//! the frame count is not a multiple of 2048; the truncation is accepted, no
//! padding or interpolation. After all bins are computed they are divided by
//! the global maximum, unless that maximum is zero (silent input stays
//! all-zero rather than dividing by zero).

use crate::envelope::{Envelope, ENVELOPE_BINS};
use crate::error::{Result, WaveformError};
use crate::traits::PcmBuffer;
use tokio_util::sync::CancellationToken;

/// Default number of chunks for the streaming variant.
pub const STREAMING_CHUNKS: usize = 16;

/// Reduce a PCM buffer to its envelope in a single pass.
///
/// Deterministic: identical input yields a bit-identical envelope. An empty
/// buffer yields [`Envelope::silent`].
pub fn reduce(pcm: &PcmBuffer) -> Envelope {
    let frame_count = pcm.frame_count();
    if frame_count == 0 {
        return Envelope::silent();
    }

    let frames_per_bin = (frame_count / ENVELOPE_BINS).max(1);
    let mut bins = vec![0.0f32; ENVELOPE_BINS];
    for (i, bin) in bins.iter_mut().enumerate() {
        *bin = bin_peak(pcm, frames_per_bin, frame_count, i);
    }

    let global_max = max_of(&bins);
    normalize(&mut bins, global_max);
    Envelope::from_bins(bins)
}

/// Reduce a PCM buffer in `chunks` sequential slices of the bin range,
/// emitting a partial envelope after each slice.
///
/// Each partial is renormalized by the maximum seen *so far*, so early
/// emissions render as progressively improving bars; the last emission and
/// the returned envelope use the true global maximum. Between slices the
/// task yields to the scheduler, and the cancellation token is checked
/// before each slice.
///
/// # Errors
///
/// Returns [`WaveformError::Cancelled`] if the token fires at a chunk
/// boundary; the partially computed bins are discarded by normal ownership.
pub async fn reduce_streaming<F>(
    pcm: &PcmBuffer,
    chunks: usize,
    cancel: &CancellationToken,
    mut emit: F,
) -> Result<Envelope>
where
    F: FnMut(Envelope),
{
    let frame_count = pcm.frame_count();
    if frame_count == 0 {
        let envelope = Envelope::silent();
        emit(envelope.clone());
        return Ok(envelope);
    }

    let chunks = chunks.clamp(1, ENVELOPE_BINS);
    let bins_per_chunk = ENVELOPE_BINS.div_ceil(chunks);
    let frames_per_bin = (frame_count / ENVELOPE_BINS).max(1);

    let mut bins = vec![0.0f32; ENVELOPE_BINS];
    let mut max_so_far = 0.0f32;
    let mut next_bin = 0;

    while next_bin < ENVELOPE_BINS {
        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        let chunk_end = (next_bin + bins_per_chunk).min(ENVELOPE_BINS);
        for i in next_bin..chunk_end {
            let peak = bin_peak(pcm, frames_per_bin, frame_count, i);
            bins[i] = peak;
            if peak > max_so_far {
                max_so_far = peak;
            }
        }
        next_bin = chunk_end;

        let mut partial = bins.clone();
        normalize(&mut partial, max_so_far);
        emit(Envelope::from_bins(partial));

        tokio::task::yield_now().await;
    }

    // max_so_far is now the true global max
    normalize(&mut bins, max_so_far);
    Ok(Envelope::from_bins(bins))
}

/// Peak absolute sample over all channels within bin `i`'s frame range.
fn bin_peak(pcm: &PcmBuffer, frames_per_bin: usize, frame_count: usize, i: usize) -> f32 {
    let start = i * frames_per_bin;
    let end = ((i + 1) * frames_per_bin).min(frame_count);
    if start >= end {
        return 0.0;
    }

    let mut peak = 0.0f32;
    for plane in pcm.planes() {
        for &sample in &plane[start..end] {
            let magnitude = sample.abs();
            if magnitude > peak {
                peak = magnitude;
            }
        }
    }
    peak
}

fn max_of(bins: &[f32]) -> f32 {
    bins.iter().copied().fold(0.0f32, f32::max)
}

/// Divide every bin by `max`, unless `max` is zero.
fn normalize(bins: &mut [f32], max: f32) {
    if max > 0.0 {
        for bin in bins.iter_mut() {
            *bin /= max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_constant(frames: usize, amplitude: f32) -> PcmBuffer {
        PcmBuffer::new(
            vec![vec![amplitude; frames], vec![-amplitude; frames]],
            44100,
        )
    }

    #[test]
    fn empty_input_yields_silence() {
        let envelope = reduce(&PcmBuffer::new(Vec::new(), 44100));
        assert_eq!(envelope, Envelope::silent());
    }

    #[test]
    fn silent_input_stays_zero() {
        let envelope = reduce(&stereo_constant(44100, 0.0));
        assert!(envelope.is_silent());
        assert_eq!(envelope.bins().len(), ENVELOPE_BINS);
    }

    #[test]
    fn constant_amplitude_normalizes_to_all_ones() {
        // 2 channels, 44100 Hz, 10 seconds at 0.5: every bin's peak equals
        // the global max, so every bin normalizes to exactly 1.0.
        let envelope = reduce(&stereo_constant(441_000, 0.5));
        assert!(envelope.bins().iter().all(|&b| b == 1.0));
    }

    #[test]
    fn output_is_in_unit_range_with_a_peak_of_one() {
        let mut left = vec![0.1f32; 100_000];
        left[50_000] = 0.9;
        let pcm = PcmBuffer::new(vec![left], 48000);

        let envelope = reduce(&pcm);
        assert_eq!(envelope.bins().len(), ENVELOPE_BINS);
        assert!(envelope.bins().iter().all(|&b| (0.0..=1.0).contains(&b)));
        assert!(envelope.bins().iter().any(|&b| b == 1.0));
    }

    #[test]
    fn negative_peaks_count_by_magnitude() {
        let pcm = PcmBuffer::new(vec![vec![-0.8; 4096], vec![0.2; 4096]], 44100);
        let envelope = reduce(&pcm);
        // -0.8 dominates via abs()
        assert!(envelope.bins().iter().any(|&b| b == 1.0));
    }

    #[test]
    fn reduction_is_deterministic() {
        let pcm = PcmBuffer::new(
            vec![(0..50_000).map(|i| ((i % 7) as f32) * 0.1).collect()],
            44100,
        );
        let a = reduce(&pcm);
        let b = reduce(&pcm);
        assert_eq!(a, b);
    }

    #[test]
    fn short_input_leaves_trailing_bins_empty() {
        // Fewer frames than bins: frames_per_bin clamps to 1, so only the
        // first `frames` bins carry signal.
        let pcm = PcmBuffer::new(vec![vec![0.5; 100]], 44100);
        let envelope = reduce(&pcm);

        assert!(envelope.bins()[..100].iter().all(|&b| b == 1.0));
        assert!(envelope.bins()[100..].iter().all(|&b| b == 0.0));
    }

    #[tokio::test]
    async fn streaming_partials_converge_to_final() {
        let mut samples: Vec<f32> = vec![0.2; 200_000];
        samples[150_000] = 0.9; // late global peak, so early partials differ
        let pcm = PcmBuffer::new(vec![samples], 44100);

        let cancel = CancellationToken::new();
        let mut partials = Vec::new();
        let envelope = reduce_streaming(&pcm, STREAMING_CHUNKS, &cancel, |partial| {
            partials.push(partial);
        })
        .await
        .unwrap();

        assert_eq!(partials.len(), STREAMING_CHUNKS);
        for partial in &partials {
            assert_eq!(partial.bins().len(), ENVELOPE_BINS);
            assert!(partial.bins().iter().all(|&b| (0.0..=1.0).contains(&b)));
        }
        // Last emission uses the true global max
        assert_eq!(partials.last().unwrap(), &envelope);
        // ...and matches the single-shot result bit for bit
        assert_eq!(envelope, reduce(&pcm));
    }

    #[tokio::test]
    async fn streaming_empty_input_emits_once() {
        let cancel = CancellationToken::new();
        let mut emissions = 0;
        let envelope = reduce_streaming(
            &PcmBuffer::new(Vec::new(), 44100),
            STREAMING_CHUNKS,
            &cancel,
            |_| emissions += 1,
        )
        .await
        .unwrap();

        assert_eq!(emissions, 1);
        assert!(envelope.is_silent());
    }

    #[tokio::test]
    async fn streaming_observes_cancellation() {
        let pcm = stereo_constant(441_000, 0.5);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = reduce_streaming(&pcm, STREAMING_CHUNKS, &cancel, |_| {
            panic!("cancelled reduction must not emit");
        })
        .await;

        assert!(matches!(result, Err(WaveformError::Cancelled)));
    }
}

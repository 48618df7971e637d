//! # Sample Format Converter
//!
//! Accumulates decoded symphonia buffers into planar f32 sample planes.

use crate::traits::PcmBuffer;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;

/// Accumulator that normalizes every symphonia sample format (i8 through
/// f64, planar or interleaved) to planar f32 in [-1.0, 1.0].
///
/// Unlike a per-packet converter this keeps one growing plane per channel,
/// because the waveform engine consumes the whole file in a single
/// reduction pass.
#[derive(Debug, Default)]
pub struct PlanarAccumulator {
    planes: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PlanarAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Append one decoded packet's samples to the per-channel planes.
    pub fn append(&mut self, buffer: &AudioBufferRef<'_>) {
        match buffer {
            AudioBufferRef::F32(buf) => self.extend(&**buf, |s: f32| s),
            AudioBufferRef::F64(buf) => self.extend(&**buf, |s: f64| s.into_sample()),
            AudioBufferRef::S32(buf) => self.extend(&**buf, |s: i32| s.into_sample()),
            AudioBufferRef::S24(buf) => self.extend(&**buf, |s| IntoSample::into_sample(s)),
            AudioBufferRef::S16(buf) => self.extend(&**buf, |s: i16| s.into_sample()),
            AudioBufferRef::S8(buf) => self.extend(&**buf, |s: i8| s.into_sample()),
            AudioBufferRef::U32(buf) => self.extend(&**buf, |s: u32| s.into_sample()),
            AudioBufferRef::U24(buf) => self.extend(&**buf, |s| IntoSample::into_sample(s)),
            AudioBufferRef::U16(buf) => self.extend(&**buf, |s: u16| s.into_sample()),
            AudioBufferRef::U8(buf) => self.extend(&**buf, |s: u8| s.into_sample()),
        }
    }

    /// Total frames accumulated so far.
    pub fn frame_count(&self) -> usize {
        self.planes.first().map(|p| p.len()).unwrap_or(0)
    }

    /// Consume the accumulator, producing the final PCM buffer.
    pub fn into_pcm(self) -> PcmBuffer {
        PcmBuffer::new(self.planes, self.sample_rate)
    }

    fn extend<T>(&mut self, buf: &AudioBuffer<T>, convert: fn(T) -> f32)
    where
        T: Sample + Copy,
    {
        let channels = buf.spec().channels.count();
        let frames = buf.frames();

        // Channel count can grow after the first packet (e.g. AAC reports it
        // late); backfill new planes with silence to keep frames aligned.
        if self.planes.len() < channels {
            let frames_so_far = self.frame_count();
            self.planes
                .resize_with(channels, || vec![0.0; frames_so_far]);
        }

        for (ch, plane) in self.planes.iter_mut().enumerate() {
            if ch < channels {
                let src = buf.chan(ch);
                plane.reserve(frames);
                plane.extend(src.iter().map(|&s| convert(s)));
            } else {
                // A channel that vanished mid-stream pads with silence.
                plane.extend(std::iter::repeat(0.0).take(frames));
            }
        }
    }
}

//! # Waveform Service Usage Example
//!
//! Demonstrates wiring a decoder into the waveform service and consuming
//! both the single-shot and the streaming API.
//!
//! Run with: `cargo run --example waveform_demo --package core-waveform`

use async_trait::async_trait;
use core_waveform::{
    PcmBuffer, Result, WaveformConfig, WaveformDecoder, WaveformService,
};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Synthetic Decoder (for demonstration)
// ============================================================================

/// Decoder that ignores the file contents and synthesizes a 440 Hz sine
/// wave with a fade-out, so the demo needs no real audio files.
struct SineDecoder;

#[async_trait]
impl WaveformDecoder for SineDecoder {
    async fn decode(&self, _path: &Path) -> Result<PcmBuffer> {
        let sample_rate = 44100u32;
        let total_frames = sample_rate as usize * 5; // 5 seconds

        let mut left = Vec::with_capacity(total_frames);
        let mut right = Vec::with_capacity(total_frames);
        for i in 0..total_frames {
            let t = i as f64 / sample_rate as f64;
            let fade = 1.0 - (i as f64 / total_frames as f64);
            let sample = ((2.0 * std::f64::consts::PI * 440.0 * t).sin() * 0.8 * fade) as f32;
            left.push(sample);
            right.push(sample * 0.5);
        }

        Ok(PcmBuffer::new(vec![left, right], sample_rate))
    }
}

/// Render an envelope as a coarse ASCII bar strip.
fn render(bins: &[f32], columns: usize) -> String {
    const GLYPHS: [char; 5] = [' ', '.', ':', '|', '#'];
    let per_column = bins.len() / columns;
    (0..columns)
        .map(|c| {
            let slice = &bins[c * per_column..(c + 1) * per_column];
            let peak = slice.iter().cloned().fold(0.0f32, f32::max);
            GLYPHS[((peak * (GLYPHS.len() - 1) as f32).round() as usize).min(GLYPHS.len() - 1)]
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "core_waveform=debug".into()),
        )
        .init();

    let cache_dir = std::env::temp_dir().join("waveform_demo_cache");
    let config = WaveformConfig::new().with_cache_directory(&cache_dir);
    let service = WaveformService::new(Arc::new(SineDecoder), config)?;

    // The synthetic decoder never reads the file, but the coordinator stats
    // it to derive the cache key, so point it at something that exists.
    let track = std::env::current_exe()
        .unwrap_or_else(|_| std::path::PathBuf::from("Cargo.toml"));

    // ------------------------------------------------------------------
    // First request: cache miss, progressive emissions
    // ------------------------------------------------------------------
    println!("Computing waveform (streaming)...");
    let mut emissions = 0;
    let envelope = service
        .get_peaks_streaming(&track, |partial| {
            emissions += 1;
            println!("  progress {:>2}: {}", emissions, render(partial.bins(), 64));
        })
        .await?;
    println!("Final:        {}", render(envelope.bins(), 64));

    // ------------------------------------------------------------------
    // Second request: served from the on-disk cache, no decode
    // ------------------------------------------------------------------
    let cached = service.get_peaks(&track).await?;
    println!(
        "Cache round-trip exact: {} (entries in {})",
        cached == envelope,
        cache_dir.display()
    );

    Ok(())
}

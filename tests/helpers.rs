//! Test helper utilities for generating and measuring synthetic audio

#![allow(dead_code)]

use std::f32::consts::PI;

/// Generate a sine tone
///
/// # Arguments
/// * `frequency` - Frequency in Hz
/// * `amplitude` - Peak amplitude in the normalized domain
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Number of samples to generate
pub fn sine(frequency: f32, amplitude: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;
    (0..num_samples)
        .map(|n| amplitude * (angular_freq * n as f32).sin())
        .collect()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Estimate the frequency of a tone from its rising zero crossings
///
/// Crossing instants are linearly interpolated between samples.
pub fn zero_crossing_frequency(samples: &[f32], sample_rate: u32) -> f32 {
    let crossings: Vec<f32> = samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(n, w)| n as f32 + w[0] / (w[0] - w[1]))
        .collect();
    if crossings.len() < 2 {
        return 0.0;
    }
    let cycles = (crossings.len() - 1) as f32;
    let span = crossings[crossings.len() - 1] - crossings[0];
    cycles * sample_rate as f32 / span
}

/// Minimal 16-bit PCM WAV header with no `data` sub-section
pub fn wav_without_data_marker(channels: u16, sample_rate: u32) -> Vec<u8> {
    let block_align = channels * 2;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&36u32.to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"LIST");
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(b"INFO");
    bytes.extend(std::iter::repeat(0u8).take(64));
    bytes
}

//! FFT power measurement, used to decide whether a composite carries a
//! stereo pilot.

use std::f32::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

use super::stereo::PILOT_HZ;

/// Largest analysis frame used for pilot detection.
const MAX_FFT_SIZE: usize = 1 << 16;
/// Shorter frames can't resolve the pilot from nearby audio.
const MIN_FFT_SIZE: usize = 1 << 10;
/// Pilot must stand this far above the guard band around it.
pub const PILOT_DETECT_DB: f32 = 10.0;

/// Three-term Blackman coefficients.
const BLACKMAN: [f32; 3] = [0.42, 0.5, 0.08];

/// Symmetric Blackman taper. Its sidelobes sit near −58 dB, low enough
/// that a strong audio tone does not mask the pilot bins.
fn blackman(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let span = (len - 1) as f32;
    let [a0, a1, a2] = BLACKMAN;
    (0..len)
        .map(|n| {
            let phase = 2.0 * PI * n as f32 / span;
            a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
        })
        .collect()
}

/// Windowed power per FFT bin for bins `0..=len/2`, normalized by the
/// window's coherent gain so a full-scale sine reads about 0.25.
pub fn power_spectrum(samples: &[f32], planner: &mut FftPlanner<f32>) -> Vec<f32> {
    if samples.is_empty() {
        return vec![];
    }

    let fft_size = samples.len();
    let window = blackman(fft_size);
    let fft = planner.plan_fft_forward(fft_size);

    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .zip(window.iter())
        .map(|(s, w)| Complex::new(s * w, 0.0))
        .collect();
    fft.process(&mut buffer);

    let coherent_gain: f32 = window.iter().sum();
    let norm = 1.0 / (coherent_gain * coherent_gain);
    buffer[..=fft_size / 2]
        .iter()
        .map(|c| c.norm_sqr() * norm)
        .collect()
}

fn bin_for(freq: f32, fft_size: usize, rate: u32) -> usize {
    (freq * fft_size as f32 / rate as f32).round() as usize
}

/// Peak power in dB between `lo` and `hi` Hz.
pub fn peak_power_db(spectrum: &[f32], fft_size: usize, rate: u32, lo: f32, hi: f32) -> f32 {
    let first = bin_for(lo, fft_size, rate).min(spectrum.len());
    let last = bin_for(hi, fft_size, rate).min(spectrum.len().saturating_sub(1));
    if first > last {
        return f32::NEG_INFINITY;
    }
    let peak = spectrum[first..=last].iter().fold(0.0f32, |a, &b| a.max(b));
    10.0 * peak.max(1e-20).log10()
}

/// How far the 19 kHz pilot stands above the guard band around it, in dB.
///
/// Analyses one power-of-two frame from the middle of the composite.
/// Returns negative infinity when the composite is too short or too slow
/// to carry a pilot.
pub fn pilot_level_db(composite: &[f32], rate: u32) -> f32 {
    if (rate as f32) < 2.0 * (PILOT_HZ as f32 + 2_000.0) {
        return f32::NEG_INFINITY;
    }
    let available = composite.len().min(MAX_FFT_SIZE);
    if available < MIN_FFT_SIZE {
        return f32::NEG_INFINITY;
    }
    let fft_size = 1usize << available.ilog2();
    let start = (composite.len() - fft_size) / 2;
    let frame = &composite[start..start + fft_size];

    let mut planner = FftPlanner::new();
    let spectrum = power_spectrum(frame, &mut planner);

    let pilot = PILOT_HZ as f32;
    let pilot_db = peak_power_db(&spectrum, fft_size, rate, pilot - 100.0, pilot + 100.0);
    let guard_low = peak_power_db(&spectrum, fft_size, rate, pilot - 1_500.0, pilot - 500.0);
    let guard_high = peak_power_db(&spectrum, fft_size, rate, pilot + 500.0, pilot + 1_500.0);
    pilot_db - guard_low.max(guard_high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tone(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (2.0 * PI * freq * n as f32 / rate as f32).cos())
            .collect()
    }

    #[test]
    fn test_window_is_symmetric_and_peaks_at_centre() {
        let w = blackman(65);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(w[32], 1.0, epsilon = 1e-6);
        for n in 0..32 {
            assert_abs_diff_eq!(w[n], w[64 - n], epsilon = 1e-5);
        }
        assert_eq!(blackman(1), vec![1.0]);
    }

    #[test]
    fn test_full_scale_tone_power() {
        let rate = 48_000;
        let size = 4_096;
        // Exactly on bin 256.
        let freq = 256.0 * rate as f32 / size as f32;
        let mut planner = FftPlanner::new();
        let spectrum = power_spectrum(&tone(freq, rate, size), &mut planner);
        assert_eq!(spectrum.len(), size / 2 + 1);
        assert_abs_diff_eq!(spectrum[256], 0.25, epsilon = 1e-3);
    }

    #[test]
    fn test_pilot_level_detects_pilot() {
        let rate = 192_000;
        let mut composite = tone(1_000.0, rate, 20_000);
        for (x, p) in composite.iter_mut().zip(tone(19_000.0, rate, 20_000)) {
            *x = 0.9 * *x + 0.1 * p;
        }
        assert!(pilot_level_db(&composite, rate) > PILOT_DETECT_DB);
    }

    #[test]
    fn test_pilot_level_without_pilot() {
        let rate = 192_000;
        let composite = tone(1_000.0, rate, 20_000);
        assert!(pilot_level_db(&composite, rate) < PILOT_DETECT_DB);
    }

    #[test]
    fn test_short_or_slow_input() {
        assert_eq!(pilot_level_db(&[0.0; 100], 192_000), f32::NEG_INFINITY);
        assert_eq!(pilot_level_db(&[0.0; 10_000], 32_000), f32::NEG_INFINITY);
    }
}

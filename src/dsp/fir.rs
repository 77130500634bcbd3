use std::f64::consts::PI;

use crate::buffer::Sample;

/// Hamming-windowed sinc low-pass with unity DC gain.
///
/// `cutoff` is normalized to the sample rate (0.5 = Nyquist).
pub fn lowpass_taps(cutoff: f64, taps: usize) -> Vec<f32> {
    assert!(taps >= 1, "FIR filter must have at least 1 tap");
    let m = (taps - 1) as f64;
    let mut coeffs: Vec<f64> = (0..taps)
        .map(|i| {
            let x = i as f64 - m / 2.0;
            let sinc = if x == 0.0 {
                2.0 * cutoff
            } else {
                (2.0 * PI * cutoff * x).sin() / (PI * x)
            };
            let window = if taps == 1 {
                1.0
            } else {
                0.54 - 0.46 * (2.0 * PI * i as f64 / m).cos()
            };
            sinc * window
        })
        .collect();

    let sum: f64 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        for coeff in &mut coeffs {
            *coeff /= sum;
        }
    }
    coeffs.into_iter().map(|c| c as f32).collect()
}

/// Odd tap count for a Hamming design with the given transition width (Hz).
pub fn taps_for_transition(rate: f64, transition_hz: f64) -> usize {
    let taps = (3.3 * rate / transition_hz).ceil() as usize;
    taps | 1
}

/// Convolve and keep the output aligned with the input (group delay removed).
/// Samples beyond either edge are taken as zero.
pub fn filter_same<T: Sample>(input: &[T], taps: &[f32]) -> Vec<T> {
    let n = input.len();
    let half = taps.len() / 2;
    (0..n)
        .map(|k| {
            let mut acc = T::default();
            let centre = k + half;
            let first = centre.saturating_sub(n - 1);
            let last = centre.min(taps.len() - 1);
            for (t, &h) in taps.iter().enumerate().take(last + 1).skip(first) {
                acc += input[centre - t] * h;
            }
            acc
        })
        .collect()
}

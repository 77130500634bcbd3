//! FM demodulation and modulation.
//!
//! The demodulator takes the angle of `s[n] · conj(s[n-1])`, the phase
//! advance between adjacent samples, and scales it so that a frequency
//! excursion of `max_deviation` Hz reads as ±1.0. The modulator does the
//! inverse: scale the message to a per-sample phase advance and integrate.
//!
//! The streaming types carry their state (previous sample, running phase)
//! across calls so chunked processing matches one whole-buffer call.

use std::f64::consts::PI;

use num_complex::Complex32;

use crate::buffer::{ComplexBuffer, RealBuffer};
use crate::error::{ensure_positive, Result};

/// Streaming frequency discriminator.
///
/// The first sample ever seen only primes the discriminator, so the
/// concatenated output of all chunks is one sample shorter than the input.
#[derive(Debug, Clone)]
pub struct FmDemodulator {
    gain: f32,
    prev: Option<Complex32>,
}

impl FmDemodulator {
    pub fn new(if_rate: f64, max_deviation: f64) -> Result<Self> {
        ensure_positive("IF rate", if_rate)?;
        ensure_positive("max deviation", max_deviation)?;
        Ok(Self {
            gain: (if_rate / (2.0 * PI * max_deviation)) as f32,
            prev: None,
        })
    }

    pub fn process(&mut self, samples: &[Complex32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(samples.len());
        for &sample in samples {
            if let Some(prev) = self.prev {
                output.push((sample * prev.conj()).arg() * self.gain);
            }
            self.prev = Some(sample);
        }
        output
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

/// Demodulate a whole buffer; the output has one sample fewer than the input.
pub fn demodulate(input: &ComplexBuffer, max_deviation: f64) -> Result<RealBuffer> {
    let mut demod = FmDemodulator::new(input.rate as f64, max_deviation)?;
    Ok(RealBuffer::new(input.rate, demod.process(&input.samples)))
}

/// Streaming phase-integrating modulator.
#[derive(Debug, Clone)]
pub struct FmModulator {
    /// Phase advance per unit of message, radians.
    step: f64,
    /// Running phase, kept in [-π, π).
    phase: f64,
}

impl FmModulator {
    pub fn new(if_rate: f64, max_deviation: f64) -> Result<Self> {
        ensure_positive("IF rate", if_rate)?;
        ensure_positive("max deviation", max_deviation)?;
        Ok(Self {
            step: 2.0 * PI * max_deviation / if_rate,
            phase: 0.0,
        })
    }

    pub fn process(&mut self, message: &[f32]) -> Vec<Complex32> {
        message
            .iter()
            .map(|&m| {
                self.phase = (self.phase + self.step * m as f64 + PI).rem_euclid(2.0 * PI) - PI;
                Complex32::from_polar(1.0, self.phase as f32)
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Modulate a whole buffer into unit-magnitude IQ of the same length.
pub fn modulate(message: &RealBuffer, max_deviation: f64) -> Result<ComplexBuffer> {
    let mut modulator = FmModulator::new(message.rate as f64, max_deviation)?;
    Ok(ComplexBuffer::new(message.rate, modulator.process(&message.samples)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const IF_RATE: u32 = 192_000;
    const MAX_DEV: f64 = 75_000.0;

    fn sine(freq: f32, amplitude: f32, len: usize) -> RealBuffer {
        let samples = (0..len)
            .map(|n| amplitude * (2.0 * std::f32::consts::PI * freq * n as f32 / IF_RATE as f32).sin())
            .collect();
        RealBuffer::new(IF_RATE, samples)
    }

    #[test]
    fn test_demodulated_modulation_recovers_message() {
        let message = sine(1_000.0, 0.9, 4_000);
        let iq = modulate(&message, MAX_DEV).unwrap();
        let recovered = demodulate(&iq, MAX_DEV).unwrap();
        assert_eq!(recovered.len(), message.len() - 1);
        for (a, b) in recovered.samples.iter().zip(&message.samples[1..]) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_modulator_output_is_unit_magnitude() {
        let iq = modulate(&sine(3_000.0, 1.0, 1_000), MAX_DEV).unwrap();
        assert_eq!(iq.len(), 1_000);
        for s in &iq.samples {
            assert_abs_diff_eq!(s.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_constant_tone_reads_as_deviation() {
        // A carrier offset of +37.5 kHz is half of full deviation.
        let step = 2.0 * std::f64::consts::PI * 37_500.0 / IF_RATE as f64;
        let samples = (0..100)
            .map(|n| Complex32::from_polar(1.0, (step * n as f64) as f32))
            .collect();
        let out = demodulate(&ComplexBuffer::new(IF_RATE, samples), MAX_DEV).unwrap();
        for &v in &out.samples {
            assert_abs_diff_eq!(v, 0.5, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_chunked_demodulation_carries_last_sample() {
        let iq = modulate(&sine(2_000.0, 0.7, 1_000), MAX_DEV).unwrap();
        let whole = demodulate(&iq, MAX_DEV).unwrap();

        let mut demod = FmDemodulator::new(IF_RATE as f64, MAX_DEV).unwrap();
        let chunked: Vec<f32> = iq
            .samples
            .chunks(64)
            .flat_map(|chunk| demod.process(chunk))
            .collect();
        assert_eq!(chunked, whole.samples);
    }

    #[test]
    fn test_chunked_modulation_is_phase_continuous() {
        let message = sine(1_500.0, 1.0, 1_000);
        let whole = modulate(&message, MAX_DEV).unwrap();

        let mut modulator = FmModulator::new(IF_RATE as f64, MAX_DEV).unwrap();
        let chunked: Vec<Complex32> = message
            .samples
            .chunks(100)
            .flat_map(|chunk| modulator.process(chunk))
            .collect();
        assert_eq!(chunked, whole.samples);
    }

    #[test]
    fn test_empty_and_single_sample() {
        let out = demodulate(&ComplexBuffer::new(IF_RATE, vec![]), MAX_DEV).unwrap();
        assert!(out.is_empty());
        let out = demodulate(&ComplexBuffer::new(IF_RATE, vec![Complex32::new(1.0, 0.0)]), MAX_DEV).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(FmDemodulator::new(0.0, MAX_DEV).is_err());
        assert!(FmModulator::new(IF_RATE as f64, -1.0).is_err());
    }

    #[test]
    fn test_reset() {
        let mut modulator = FmModulator::new(IF_RATE as f64, MAX_DEV).unwrap();
        let fresh = modulator.clone().process(&[0.3; 4]);
        modulator.process(&[1.0; 10]);
        modulator.reset();
        assert_eq!(modulator.process(&[0.3; 4]), fresh);

        let mut demod = FmDemodulator::new(IF_RATE as f64, MAX_DEV).unwrap();
        demod.process(&[Complex32::new(1.0, 0.0)]);
        demod.reset();
        assert!(demod.process(&[Complex32::new(0.0, 1.0)]).is_empty());
    }
}

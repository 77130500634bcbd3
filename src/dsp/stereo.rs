//! FM stereo multiplex (composite) encoding and decoding.
//!
//! The composite carries `L+R` at baseband, a 19 kHz pilot, and `L−R`
//! double-sideband suppressed-carrier modulated onto 38 kHz, phase-locked
//! at exactly twice the pilot phase.
//!
//! Decoding regenerates the 38 kHz reference by frequency-doubling the
//! band-passed received pilot (`cos 2θ = 2 cos² θ − 1`), normalized by a
//! running pilot envelope. The reference therefore follows the received
//! pilot phase sample by sample, including slow drift inside the pilot
//! filter bandwidth, without assuming a fixed transmitter phase. When the
//! pilot envelope drops below [`PILOT_FLOOR`] the reference is zeroed, and
//! when the pilot is missing for most of the buffer both channels carry the
//! composite at unity gain.

use std::f64::consts::PI;

use tracing::debug;

use super::fir::{filter_same, lowpass_taps, taps_for_transition};
use crate::buffer::RealBuffer;
use crate::error::{ensure_positive, Error, Result};

pub const PILOT_HZ: f64 = 19_000.0;
pub const SUBCARRIER_HZ: f64 = 2.0 * PILOT_HZ;
/// Lowest composite rate that holds the subcarrier's upper sideband (and RDS at 57 kHz).
pub const MIN_STEREO_RATE_HZ: f64 = 114_000.0;

/// Mix weights; `SUM + DIFF + PILOT == 1` keeps the peak within ±1 for |L|, |R| ≤ 1.
pub const SUM_WEIGHT: f32 = 0.45;
pub const DIFF_WEIGHT: f32 = 0.45;
pub const PILOT_WEIGHT: f32 = 0.10;

/// Audio low-pass applied to the recovered sum and difference channels.
const AUDIO_CUTOFF_HZ: f64 = 16_500.0;
const AUDIO_TRANSITION_HZ: f64 = 3_000.0;
/// Q of each of the two cascaded 19 kHz band-pass sections.
const PILOT_BPF_Q: f64 = 20.0;
/// Bandwidth of the pilot envelope tracker.
const PILOT_ENVELOPE_HZ: f64 = 100.0;
/// Envelope (mean square) below which the pilot counts as absent.
pub const PILOT_FLOOR: f32 = 5e-5;

fn ensure_stereo_rate(rate: u32) -> Result<()> {
    ensure_positive("composite rate", rate as f64)?;
    if (rate as f64) < MIN_STEREO_RATE_HZ {
        return Err(Error::invalid_parameter(
            "composite rate",
            format!("{rate} Hz is too low for a 38 kHz stereo subcarrier (need {MIN_STEREO_RATE_HZ} Hz)"),
        ));
    }
    Ok(())
}

/// One composite sample before mixing.
#[derive(Debug, Clone, Copy)]
struct StereoComposite {
    sum: f32,
    diff: f32,
    pilot: f32,
}

impl StereoComposite {
    fn mix(self, subcarrier: f32) -> f32 {
        SUM_WEIGHT * self.sum + DIFF_WEIGHT * self.diff * subcarrier + PILOT_WEIGHT * self.pilot
    }
}

/// Streaming composite generator; the pilot phase carries across calls.
#[derive(Debug, Clone)]
pub struct StereoEncoder {
    step: f64,
    phase: f64,
}

impl StereoEncoder {
    pub fn new(rate: u32) -> Result<Self> {
        ensure_stereo_rate(rate)?;
        Ok(Self {
            step: 2.0 * PI * PILOT_HZ / rate as f64,
            phase: 0.0,
        })
    }

    pub fn process(&mut self, left: &[f32], right: &[f32]) -> Result<Vec<f32>> {
        if left.len() != right.len() {
            return Err(Error::type_mismatch(format!(
                "left has {} samples, right has {}",
                left.len(),
                right.len()
            )));
        }

        Ok(left
            .iter()
            .zip(right)
            .map(|(&l, &r)| {
                let composite = StereoComposite {
                    sum: l + r,
                    diff: l - r,
                    pilot: self.phase.cos() as f32,
                };
                let subcarrier = (2.0 * self.phase).cos() as f32;
                self.phase = (self.phase + self.step).rem_euclid(2.0 * PI);
                composite.mix(subcarrier)
            })
            .collect())
    }
}

/// Build a composite from left and right channels at the same rate.
pub fn multiplex(left: &RealBuffer, right: &RealBuffer) -> Result<RealBuffer> {
    if left.rate != right.rate {
        return Err(Error::type_mismatch(format!(
            "left is at {} Hz, right at {} Hz",
            left.rate, right.rate
        )));
    }
    let mut encoder = StereoEncoder::new(left.rate)?;
    let composite = encoder.process(&left.samples, &right.samples)?;
    Ok(RealBuffer::new(left.rate, composite))
}

/// Constant-peak-gain biquad band-pass (0 dB and zero phase at centre).
#[derive(Debug, Clone)]
struct BandPass {
    b0: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BandPass {
    fn new(rate: f64, centre: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * centre / rate;
        let alpha = w0.sin() / (2.0 * q);
        let inv_a0 = 1.0 / (1.0 + alpha);
        Self {
            b0: alpha * inv_a0,
            b2: -alpha * inv_a0,
            a1: -2.0 * w0.cos() * inv_a0,
            a2: (1.0 - alpha) * inv_a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Recovers the pilot and emits a phase-locked 38 kHz reference.
#[derive(Debug, Clone)]
pub struct PilotTracker {
    stages: [BandPass; 2],
    envelope: f64,
    envelope_alpha: f64,
    locked_samples: usize,
    total_samples: usize,
}

impl PilotTracker {
    pub fn new(rate: u32) -> Result<Self> {
        ensure_stereo_rate(rate)?;
        let rate = rate as f64;
        let section = BandPass::new(rate, PILOT_HZ, PILOT_BPF_Q);
        Ok(Self {
            stages: [section.clone(), section],
            envelope: 0.0,
            envelope_alpha: 1.0 - (-2.0 * PI * PILOT_ENVELOPE_HZ / rate).exp(),
            locked_samples: 0,
            total_samples: 0,
        })
    }

    /// Feed one composite sample, get `cos(2θ)` of the recovered pilot (or 0).
    pub fn next(&mut self, x: f32) -> f32 {
        let pilot = self
            .stages
            .iter_mut()
            .fold(x as f64, |acc, stage| stage.process(acc));
        let power = pilot * pilot;
        self.envelope += self.envelope_alpha * (power - self.envelope);
        self.total_samples += 1;

        if self.envelope < PILOT_FLOOR as f64 {
            return 0.0;
        }
        self.locked_samples += 1;
        // envelope ≈ A²/2, so power / envelope − 1 = cos 2θ.
        ((power / self.envelope - 1.0).clamp(-1.0, 1.0)) as f32
    }

    /// Fraction of samples so far for which a pilot was present.
    pub fn lock_fraction(&self) -> f32 {
        if self.total_samples == 0 {
            0.0
        } else {
            self.locked_samples as f32 / self.total_samples as f32
        }
    }
}

/// Left and right channels recovered from a composite.
#[derive(Debug, Clone)]
pub struct StereoDecode {
    pub left: RealBuffer,
    pub right: RealBuffer,
    /// Whether the pilot was present for most of the buffer.
    pub pilot_detected: bool,
}

/// Split a composite back into left and right channels.
pub fn demultiplex(composite: &RealBuffer) -> Result<StereoDecode> {
    let rate = composite.rate;
    let mut tracker = PilotTracker::new(rate)?;

    let mixed: Vec<f32> = composite
        .samples
        .iter()
        .map(|&x| 2.0 * x * tracker.next(x))
        .collect();

    let pilot_detected = tracker.lock_fraction() > 0.5;
    debug!(
        "demultiplexed {} composite samples, pilot lock {:.0}%",
        composite.len(),
        tracker.lock_fraction() * 100.0
    );

    let taps = lowpass_taps(
        AUDIO_CUTOFF_HZ / rate as f64,
        taps_for_transition(rate as f64, AUDIO_TRANSITION_HZ),
    );
    let sum = filter_same(&composite.samples, &taps);

    let (left, right): (Vec<f32>, Vec<f32>) = if pilot_detected {
        let diff = filter_same(&mixed, &taps);
        sum.iter()
            .zip(&diff)
            .map(|(&s, &d)| {
                let (s, d) = (s / SUM_WEIGHT, d / DIFF_WEIGHT);
                ((s + d) / 2.0, (s - d) / 2.0)
            })
            .unzip()
    } else {
        // No pilot: the composite is a plain mono message, kept at unity.
        (sum.clone(), sum)
    };

    Ok(StereoDecode {
        left: RealBuffer::new(rate, left),
        right: RealBuffer::new(rate, right),
        pilot_detected,
    })
}

//! FM de-emphasis and pre-emphasis.
//!
//! Both are single-pole IIR shelves derived from the analog RC network by
//! the bilinear transform with frequency pre-warping, so the corner lands
//! exactly at `1 / (2π τ)` regardless of sample rate.
//!
//! Common time constants:
//! - North America, South Korea: 75 µs
//! - Europe, rest of world: 50 µs

use std::f64::consts::PI;

use crate::error::{ensure_positive, Error, Result};

pub const TAU_US_75: f64 = 75e-6;
pub const TAU_EU_50: f64 = 50e-6;

/// Default high-frequency corner of the pre-emphasis shelf, as a fraction of Nyquist.
const PREEMPHASIS_CORNER_FRACTION: f64 = 0.925;

/// Feed-forward and feedback coefficients, `a[0]` normalized to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmphasisTaps {
    pub b: [f64; 2],
    pub a: [f64; 2],
}

/// The corner `1 / (2π τ)` must sit below Nyquist, or the pre-warp wraps
/// past π/2 and the pole leaves the unit circle.
pub(crate) fn ensure_corner_below_nyquist(name: &str, tau: f64, rate: f64) -> Result<()> {
    if 1.0 / tau >= PI * rate {
        return Err(Error::invalid_parameter(
            name,
            format!(
                "corner {:.0} Hz is not below Nyquist at {rate} Hz",
                1.0 / (2.0 * PI * tau)
            ),
        ));
    }
    Ok(())
}

/// Pre-warped analog corner `w` mapped into the bilinear `k` term.
fn warped_k(corner_rad: f64, rate: f64) -> f64 {
    let warped = 2.0 * rate * (corner_rad / (2.0 * rate)).tan();
    -warped / (2.0 * rate)
}

/// Low-pass shelf used on receive.
pub fn deemphasis_taps(tau: f64, rate: f64) -> Result<EmphasisTaps> {
    ensure_positive("deemphasis time constant", tau)?;
    ensure_positive("sample rate", rate)?;
    ensure_corner_below_nyquist("deemphasis time constant", tau, rate)?;

    let k = warped_k(1.0 / tau, rate);
    let z1 = -1.0;
    let p1 = (1.0 + k) / (1.0 - k);
    let b0 = -k / (1.0 - k);

    Ok(EmphasisTaps {
        b: [b0, b0 * -z1],
        a: [1.0, -p1],
    })
}

/// High-frequency boost used on transmit, the complement of [`deemphasis_taps`]
/// up to the `high_corner_hz` shelf (defaults to 0.925 × Nyquist). Unity gain at DC.
pub fn preemphasis_taps(tau: f64, rate: f64, high_corner_hz: Option<f64>) -> Result<EmphasisTaps> {
    ensure_positive("preemphasis time constant", tau)?;
    ensure_positive("sample rate", rate)?;
    ensure_corner_below_nyquist("preemphasis time constant", tau, rate)?;

    let nyquist = rate / 2.0;
    let fh = match high_corner_hz {
        Some(fh) if fh > 0.0 && fh < nyquist => fh,
        _ => PREEMPHASIS_CORNER_FRACTION * nyquist,
    };

    let kl = warped_k(1.0 / tau, rate);
    let kh = warped_k(2.0 * PI * fh, rate);
    let z1 = (1.0 + kl) / (1.0 - kl);
    let p1 = (1.0 + kh) / (1.0 - kh);
    let b0 = (1.0 - kl) / (1.0 - kh);
    let g = (1.0 - p1).abs() / (b0 * (1.0 - z1).abs());

    Ok(EmphasisTaps {
        b: [g * b0, g * b0 * -z1],
        a: [1.0, -p1],
    })
}

impl EmphasisTaps {
    /// Magnitude response at `freq` Hz.
    pub fn gain_at(&self, freq: f64, rate: f64) -> f64 {
        let w = 2.0 * PI * freq / rate;
        let (cos, sin) = (w.cos(), w.sin());
        let num = ((self.b[0] + self.b[1] * cos).powi(2) + (self.b[1] * sin).powi(2)).sqrt();
        let den = ((self.a[0] + self.a[1] * cos).powi(2) + (self.a[1] * sin).powi(2)).sqrt();
        num / den
    }
}

/// Stateful first-order IIR; the delay line carries across `process` calls
/// so chunked filtering matches a single whole-buffer call.
#[derive(Debug, Clone)]
pub struct EmphasisFilter {
    taps: EmphasisTaps,
    x1: f64,
    y1: f64,
}

impl EmphasisFilter {
    pub fn new(taps: EmphasisTaps) -> Self {
        Self {
            taps,
            x1: 0.0,
            y1: 0.0,
        }
    }

    pub fn deemphasis(tau: f64, rate: f64) -> Result<Self> {
        Ok(Self::new(deemphasis_taps(tau, rate)?))
    }

    pub fn preemphasis(tau: f64, rate: f64) -> Result<Self> {
        Ok(Self::new(preemphasis_taps(tau, rate, None)?))
    }

    pub fn taps(&self) -> EmphasisTaps {
        self.taps
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let EmphasisTaps { b, a } = self.taps;
        samples
            .iter()
            .map(|&x| {
                let x = x as f64;
                let y = b[0] * x + b[1] * self.x1 - a[1] * self.y1;
                self.x1 = x;
                self.y1 = y;
                y as f32
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

//! Rational-factor polyphase resampler.
//!
//! Changes the rate by `up / down`: conceptually zero-stuff by `up`,
//! low-pass at the lower of the two Nyquist rates, keep every `down`-th
//! sample. Only the output samples that are kept get computed, and only
//! the non-zero stuffed inputs are multiplied.
//!
//! The whole buffer is processed in one call; samples past either end are
//! treated as zero, so the first and last few outputs are approximate.

use tracing::debug;

use super::fir::lowpass_taps;
use crate::buffer::{Sample, SampleBuffer};
use crate::error::{ensure_positive, Error, Result};

/// Filter half-length per unit of `max(up, down)`.
const HALF_TAPS_PER_PHASE: usize = 10;

/// Largest denominator tried when turning a real ratio into a fraction.
const MAX_DENOMINATOR: u64 = 1000;
/// Largest reduced `up` or `down`; bounds the prototype filter length.
const MAX_FACTOR: usize = 100_000;

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Best rational approximation `num / den` of `ratio` with `den <= max_den`.
///
/// Ratios below `1 / max_den` have no such convergent and become
/// `1 / round(1 / ratio)`.
fn rational_approximation(ratio: f64, max_den: u64) -> (u64, u64) {
    // Convergents of the continued fraction.
    let (mut h0, mut h1) = (0u64, 1u64);
    let (mut k0, mut k1) = (1u64, 0u64);
    let mut x = ratio;
    loop {
        let a = x.floor() as u64;
        let h2 = a.saturating_mul(h1).saturating_add(h0);
        let k2 = a.saturating_mul(k1).saturating_add(k0);
        if k2 > max_den {
            break;
        }
        (h0, h1, k0, k1) = (h1, h2, k1, k2);
        let frac = x - a as f64;
        if frac < 1e-12 {
            break;
        }
        x = 1.0 / frac;
    }
    if h1 == 0 {
        return (1, ratio.recip().round() as u64);
    }
    (h1, k1)
}

/// Polyphase resampler for a fixed `up / down` ratio.
#[derive(Debug, Clone)]
pub struct Resampler {
    up: usize,
    down: usize,
    /// Prototype low-pass at the zero-stuffed rate, scaled by `up`.
    taps: Vec<f32>,
    delay: usize,
}

impl Resampler {
    /// Build a resampler for `up / down`; the fraction is reduced first.
    pub fn new(up: usize, down: usize) -> Result<Self> {
        if up == 0 || down == 0 {
            return Err(Error::invalid_parameter(
                "ratio",
                format!("resampling factors must be positive, got {up}/{down}"),
            ));
        }
        let g = gcd(up as u64, down as u64) as usize;
        let (up, down) = (up / g, down / g);
        if up.max(down) > MAX_FACTOR {
            return Err(Error::invalid_parameter(
                "ratio",
                format!("{up}/{down} needs factors above {MAX_FACTOR}"),
            ));
        }

        let max_factor = up.max(down);
        let half_len = HALF_TAPS_PER_PHASE * max_factor;
        let taps = if max_factor == 1 {
            vec![1.0]
        } else {
            lowpass_taps(0.5 / max_factor as f64, 2 * half_len + 1)
                .into_iter()
                .map(|h| h * up as f32)
                .collect()
        };
        let delay = taps.len() / 2;

        Ok(Self {
            up,
            down,
            taps,
            delay,
        })
    }

    /// Resampler whose `up / down` is the closest fraction to `ratio`.
    pub fn from_ratio(ratio: f64) -> Result<Self> {
        ensure_positive("ratio", ratio)?;
        let (up, down) = rational_approximation(ratio, MAX_DENOMINATOR);
        let (up, down) = (usize::try_from(up), usize::try_from(down));
        match (up, down) {
            (Ok(up), Ok(down)) => Self::new(up, down),
            _ => Err(Error::invalid_parameter(
                "ratio",
                format!("{ratio} is out of range"),
            )),
        }
    }

    /// Resampler converting `from` Hz to `to` Hz exactly.
    pub fn between_rates(from: u32, to: u32) -> Result<Self> {
        ensure_positive("input rate", from as f64)?;
        ensure_positive("output rate", to as f64)?;
        Self::new(to as usize, from as usize)
    }

    pub fn up(&self) -> usize {
        self.up
    }

    pub fn down(&self) -> usize {
        self.down
    }

    /// `round(len * up / down)`.
    pub fn output_len(&self, input_len: usize) -> usize {
        (input_len * self.up + self.down / 2) / self.down
    }

    /// Output rate for an input at `rate` Hz.
    pub fn output_rate(&self, rate: u32) -> u32 {
        ((rate as u64 * self.up as u64 + self.down as u64 / 2) / self.down as u64) as u32
    }

    pub fn process<T: Sample>(&self, input: &[T]) -> Vec<T> {
        let n = input.len();
        let out_len = self.output_len(n);
        if self.up == 1 && self.down == 1 {
            return input.to_vec();
        }

        let mut output = Vec::with_capacity(out_len);
        for k in 0..out_len {
            // Position in the zero-stuffed, filtered stream.
            let j = k * self.down + self.delay;
            let mut acc = T::default();
            let mut t = j % self.up;
            while t < self.taps.len() && t <= j {
                let idx = (j - t) / self.up;
                if idx < n {
                    acc += input[idx] * self.taps[t];
                }
                t += self.up;
            }
            output.push(acc);
        }
        output
    }

    pub fn process_buffer<T: Sample>(&self, buffer: &SampleBuffer<T>) -> SampleBuffer<T> {
        let output = SampleBuffer::new(self.output_rate(buffer.rate), self.process(&buffer.samples));
        debug!(
            "resampled {} samples at {} Hz -> {} samples at {} Hz ({}/{})",
            buffer.len(),
            buffer.rate,
            output.len(),
            output.rate,
            self.up,
            self.down
        );
        output
    }
}

/// Change the length of `buffer` by `ratio` (approximated as a fraction).
pub fn resample<T: Sample>(buffer: &SampleBuffer<T>, ratio: f64) -> Result<SampleBuffer<T>> {
    Ok(Resampler::from_ratio(ratio)?.process_buffer(buffer))
}

/// Integer decimation by `factor`.
pub fn decimate<T: Sample>(buffer: &SampleBuffer<T>, factor: usize) -> Result<SampleBuffer<T>> {
    Ok(Resampler::new(1, factor)?.process_buffer(buffer))
}

/// Integer interpolation by `factor`.
pub fn interpolate<T: Sample>(buffer: &SampleBuffer<T>, factor: usize) -> Result<SampleBuffer<T>> {
    Ok(Resampler::new(factor, 1)?.process_buffer(buffer))
}

/// Resample to exactly `rate` Hz.
pub fn resample_to<T: Sample>(buffer: &SampleBuffer<T>, rate: u32) -> Result<SampleBuffer<T>> {
    Ok(Resampler::between_rates(buffer.rate, rate)?.process_buffer(buffer))
}

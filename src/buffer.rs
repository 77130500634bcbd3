use std::ops::{AddAssign, Mul};

use num_complex::Complex32;

/// Element type carried through the DSP stages.
///
/// Implemented for `f32` (real audio / composite) and `Complex32` (IQ).
pub trait Sample: Copy + Default + AddAssign + Mul<f32, Output = Self> {}

impl Sample for f32 {}
impl Sample for Complex32 {}

/// Normalized samples tagged with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer<T> {
    pub rate: u32,
    pub samples: Vec<T>,
}

pub type RealBuffer = SampleBuffer<f32>;
pub type ComplexBuffer = SampleBuffer<Complex32>;

impl<T> SampleBuffer<T> {
    pub fn new(rate: u32, samples: Vec<T>) -> Self {
        Self { rate, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.rate as f64
    }
}

/// Decoded payload whose element kind is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Real(Vec<f32>),
    Complex(Vec<Complex32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Real(v) => v.len(),
            Samples::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Samples::Complex(_))
    }

    /// On-disk unit count: one per real sample, two per complex sample.
    pub fn unit_count(&self) -> usize {
        match self {
            Samples::Real(v) => v.len(),
            Samples::Complex(v) => v.len() * 2,
        }
    }

    /// Units in on-disk order: complex samples become I, Q, I, Q, ...
    pub fn units(&self) -> Box<dyn Iterator<Item = f32> + '_> {
        match self {
            Samples::Real(v) => Box::new(v.iter().copied()),
            Samples::Complex(v) => Box::new(v.iter().flat_map(|c| [c.re, c.im])),
        }
    }
}

/// Audio channels sharing one rate, as read from or written to a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl Audio {
    pub fn mono(rate: u32, samples: Vec<f32>) -> Self {
        Self {
            rate,
            channels: vec![samples],
        }
    }

    pub fn stereo(rate: u32, left: Vec<f32>, right: Vec<f32>) -> Self {
        Self {
            rate,
            channels: vec![left, right],
        }
    }

    /// Frames per channel (shortest channel wins).
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }
}

//! Conversion between on-disk sample units and normalized floats.
//!
//! Every format maps to the normalized domain through one affine transform,
//! `f = (v + offset) / scale`, and back through its exact inverse. These
//! mappings match the conventions of common capture tools (rtl_sdr, GQRX,
//! SDR#, hackrf_transfer).

pub mod wav;

use std::fmt;
use std::str::FromStr;

use num_complex::Complex32;
use serde::Deserialize;
use tracing::warn;

use crate::buffer::Samples;
use crate::error::{Error, Result};

/// On-disk element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Uint8,
    Int8,
    Int16,
    Float32,
    /// Interleaved float32 I/Q pairs.
    Complex64,
}

/// `f = (v + offset) / scale`, with `[min, max]` the representable unit range.
#[derive(Debug, Clone, Copy)]
struct Affine {
    offset: f64,
    scale: f64,
    min: f64,
    max: f64,
}

const AFFINE_UINT8: Affine = Affine {
    offset: -127.5,
    scale: 127.5,
    min: 0.0,
    max: 255.0,
};
const AFFINE_INT8: Affine = Affine {
    offset: 0.5,
    scale: 127.5,
    min: -128.0,
    max: 127.0,
};
const AFFINE_INT16: Affine = Affine {
    offset: 0.5,
    scale: 32767.5,
    min: -32768.0,
    max: 32767.0,
};
const AFFINE_FLOAT: Affine = Affine {
    offset: 0.0,
    scale: 1.0,
    min: f64::NEG_INFINITY,
    max: f64::INFINITY,
};

impl FormatTag {
    pub const ALL: [FormatTag; 5] = [
        FormatTag::Uint8,
        FormatTag::Int8,
        FormatTag::Int16,
        FormatTag::Float32,
        FormatTag::Complex64,
    ];

    /// Bytes per on-disk unit (one real sample, or one of I/Q).
    pub fn unit_bytes(self) -> usize {
        match self {
            FormatTag::Uint8 | FormatTag::Int8 => 1,
            FormatTag::Int16 => 2,
            FormatTag::Float32 | FormatTag::Complex64 => 4,
        }
    }

    /// Whether units always pair up into complex samples.
    pub fn is_complex(self) -> bool {
        matches!(self, FormatTag::Complex64)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, FormatTag::Uint8 | FormatTag::Int8 | FormatTag::Int16)
    }

    fn affine(self) -> Affine {
        match self {
            FormatTag::Uint8 => AFFINE_UINT8,
            FormatTag::Int8 => AFFINE_INT8,
            FormatTag::Int16 => AFFINE_INT16,
            FormatTag::Float32 | FormatTag::Complex64 => AFFINE_FLOAT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FormatTag::Uint8 => "uint8",
            FormatTag::Int8 => "int8",
            FormatTag::Int16 => "int16",
            FormatTag::Float32 => "float32",
            FormatTag::Complex64 => "complex64",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FormatTag::ALL
            .into_iter()
            .find(|tag| tag.name() == s.to_lowercase())
            .ok_or_else(|| {
                Error::format(format!(
                    "unsupported dtype '{s}' (expected uint8, int8, int16, float32 or complex64)"
                ))
            })
    }
}

/// Raw unit values as read from disk, before the affine transform.
fn read_units(bytes: &[u8], tag: FormatTag) -> Vec<f64> {
    match tag {
        FormatTag::Uint8 => bytes.iter().map(|&b| b as f64).collect(),
        FormatTag::Int8 => bytes.iter().map(|&b| b as i8 as f64).collect(),
        FormatTag::Int16 => bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f64)
            .collect(),
        FormatTag::Float32 | FormatTag::Complex64 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
    }
}

/// Decode a raw payload into normalized samples.
///
/// Units are paired into complex samples (even index = I, odd index = Q)
/// when `paired_as_complex` is set or the format is inherently complex.
pub fn decode(bytes: &[u8], tag: FormatTag, paired_as_complex: bool) -> Result<Samples> {
    let width = tag.unit_bytes();
    if bytes.len() % width != 0 {
        return Err(Error::format(format!(
            "payload of {} bytes is not a whole number of {}-byte {} units",
            bytes.len(),
            width,
            tag
        )));
    }

    let affine = tag.affine();
    let units: Vec<f32> = read_units(bytes, tag)
        .into_iter()
        .map(|v| ((v + affine.offset) / affine.scale) as f32)
        .collect();

    if !(paired_as_complex || tag.is_complex()) {
        return Ok(Samples::Real(units));
    }

    if units.len() % 2 != 0 {
        return Err(Error::type_mismatch(format!(
            "{} {} units cannot be paired as I/Q (unpaired trailing unit)",
            units.len(),
            tag
        )));
    }

    Ok(Samples::Complex(
        units
            .chunks_exact(2)
            .map(|pair| Complex32::new(pair[0], pair[1]))
            .collect(),
    ))
}

/// Map one normalized unit to its on-disk value, rounding and clipping
/// integer formats to their range. The flag reports clipping.
pub(crate) fn quantize(unit: f32, tag: FormatTag) -> (f64, bool) {
    let affine = tag.affine();
    let v = unit as f64 * affine.scale - affine.offset;
    if !tag.is_integer() {
        return (v, false);
    }
    let v = v.round();
    let clipped = v < affine.min || v > affine.max;
    (v.clamp(affine.min, affine.max), clipped)
}

/// Encode normalized samples as a raw payload.
///
/// Complex samples are written interleaved. Real samples cannot be written
/// to a complex format.
pub fn encode(samples: &Samples, tag: FormatTag) -> Result<Vec<u8>> {
    if tag.is_complex() && !samples.is_complex() {
        return Err(Error::type_mismatch(
            "cannot write real samples to a complex64 file",
        ));
    }

    let mut bytes = Vec::with_capacity(samples.unit_count() * tag.unit_bytes());
    let mut clipped = 0usize;
    for unit in samples.units() {
        let (v, was_clipped) = quantize(unit, tag);
        clipped += was_clipped as usize;
        match tag {
            FormatTag::Uint8 => bytes.push(v as u8),
            FormatTag::Int8 => bytes.push(v as i8 as u8),
            FormatTag::Int16 => bytes.extend_from_slice(&(v as i16).to_le_bytes()),
            FormatTag::Float32 | FormatTag::Complex64 => {
                bytes.extend_from_slice(&(v as f32).to_le_bytes())
            }
        }
    }

    if clipped > 0 {
        warn!("{} of {} {} units clipped during encode", clipped, samples.unit_count(), tag);
    }
    Ok(bytes)
}

//! Reading capture and audio files into normalized buffers.

use std::path::Path;

use tracing::{debug, warn};

use crate::buffer::{ComplexBuffer, Samples};
use crate::codec::wav::{self, WavHeader};
use crate::codec::{self, FormatTag};
use crate::error::{Error, Result};

/// IQ samples from a capture file, plus the container header when there was one.
#[derive(Debug, Clone)]
pub struct Capture {
    pub header: Option<WavHeader>,
    pub samples: Vec<num_complex::Complex32>,
}

impl Capture {
    /// Attach a rate: the container's own rate, or `default_rate` for raw files.
    pub fn into_buffer(self, default_rate: u32) -> ComplexBuffer {
        let rate = self.header.map_or(default_rate, |h| h.sample_rate);
        ComplexBuffer::new(rate, self.samples)
    }
}

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::io(path, e))
}

/// Decode capture bytes as IQ.
///
/// Containers are recognised by their RIFF header unless `raw` is set; raw
/// payloads are decoded with `format`, with units paired as I/Q.
pub fn load_capture(bytes: &[u8], format: FormatTag, raw: bool) -> Result<Capture> {
    if !raw && wav::is_container(bytes) {
        let (header, buffer) = wav::read_iq(bytes)?;
        let compatible = header.format == format
            || (header.format == FormatTag::Float32 && format == FormatTag::Complex64);
        if !compatible {
            warn!(
                "container says {} but {} was requested; using the container format",
                header.format, format
            );
        }
        return Ok(Capture {
            header: Some(header),
            samples: buffer.samples,
        });
    }

    match codec::decode(bytes, format, true)? {
        Samples::Complex(samples) => {
            debug!("decoded {} raw {} IQ samples", samples.len(), format);
            Ok(Capture {
                header: None,
                samples,
            })
        }
        Samples::Real(_) => Err(Error::type_mismatch("raw capture did not decode as I/Q")),
    }
}

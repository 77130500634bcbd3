//! RIFF/WAVE container support.
//!
//! Stream parameters come from `hound`. The payload is located separately
//! by scanning for the `data` marker, the way SDR recorders expect to be
//! read: it begins 8 bytes past the marker (marker plus size field), and
//! the declared size is only trusted when it fits the file.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, warn};

use super::{decode, quantize, FormatTag};
use crate::buffer::{Audio, ComplexBuffer, Samples};
use crate::error::{Error, Result};

const RIFF_MARKER: &[u8; 4] = b"RIFF";
const WAVE_MARKER: &[u8; 4] = b"WAVE";
const DATA_MARKER: &[u8; 4] = b"data";

/// Marker plus 32-bit size field.
const CHUNK_HEADER_LEN: usize = 8;

/// Stream parameters from the `fmt ` sub-section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub format: FormatTag,
}

/// A parsed container: header plus the raw payload it frames.
#[derive(Debug)]
pub struct Container<'a> {
    pub header: WavHeader,
    pub payload: &'a [u8],
}

/// Whether the bytes start with a RIFF signature.
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.starts_with(RIFF_MARKER)
}

fn find_marker(bytes: &[u8], marker: &[u8; 4], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

fn format_tag_for(spec: &WavSpec) -> Result<FormatTag> {
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => Ok(FormatTag::Uint8),
        (SampleFormat::Int, 16) => Ok(FormatTag::Int16),
        (SampleFormat::Float, 32) => Ok(FormatTag::Float32),
        (format, bits) => Err(Error::format(format!(
            "unsupported WAV encoding: {bits}-bit {format:?}"
        ))),
    }
}

/// Read the stream parameters from everything up to the `data` size field.
///
/// The size field is zeroed first; it is often wrong in streamed
/// recordings and the payload bounds are settled by [`parse`].
fn read_header(head: &[u8]) -> Result<WavHeader> {
    let mut head = head.to_vec();
    let len = head.len();
    head[len - 4..].fill(0);

    let reader = WavReader::new(Cursor::new(head)).map_err(|e| match e {
        hound::Error::Unsupported => Error::format("unsupported WAV encoding"),
        e => Error::container(format!("can't read the WAV header: {e}")),
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(Error::container("fmt section declares zero channels"));
    }

    Ok(WavHeader {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        format: format_tag_for(&spec)?,
    })
}

/// Parse a RIFF/WAVE container and locate its payload.
pub fn parse(bytes: &[u8]) -> Result<Container<'_>> {
    if bytes.len() < 12 || !is_container(bytes) || &bytes[8..12] != WAVE_MARKER {
        return Err(Error::container("missing RIFF/WAVE signature"));
    }

    let pos = find_marker(bytes, DATA_MARKER, 12)
        .ok_or_else(|| Error::container("can't find the data section in the WAV header"))?;
    let start = pos + CHUNK_HEADER_LEN;
    if bytes.len() < start {
        return Err(Error::container("truncated data section header"));
    }

    let header = read_header(&bytes[..start])?;

    // Recorders that stream to disk often leave the size at 0 or overshoot.
    let declared =
        u32::from_le_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]) as usize;
    let end = if declared == 0 || start + declared > bytes.len() {
        bytes.len()
    } else {
        start + declared
    };

    debug!(
        "WAV header: {} ch, {} Hz, {} bits ({}), payload {} bytes at offset {}",
        header.channels,
        header.sample_rate,
        header.bits_per_sample,
        header.format,
        end - start,
        start
    );

    Ok(Container {
        header,
        payload: &bytes[start..end],
    })
}

/// Read a two-channel container as I/Q (I = left, Q = right).
pub fn read_iq(bytes: &[u8]) -> Result<(WavHeader, ComplexBuffer)> {
    let container = parse(bytes)?;
    let header = container.header;
    if header.channels != 2 {
        return Err(Error::type_mismatch(format!(
            "expected 2-channel (I/Q) WAV, got {} channel(s)",
            header.channels
        )));
    }

    match decode(container.payload, header.format, true)? {
        Samples::Complex(samples) => Ok((header, ComplexBuffer::new(header.sample_rate, samples))),
        Samples::Real(_) => Err(Error::type_mismatch("container payload did not pair as I/Q")),
    }
}

/// Read a mono or stereo audio container into separate channels.
pub fn read_audio(bytes: &[u8]) -> Result<(WavHeader, Audio)> {
    let container = parse(bytes)?;
    let header = container.header;
    let channels = header.channels as usize;
    if channels > 2 {
        return Err(Error::type_mismatch(format!(
            "expected mono or stereo audio, got {channels} channels"
        )));
    }

    let units = match decode(container.payload, header.format, false)? {
        Samples::Real(units) => units,
        Samples::Complex(_) => return Err(Error::type_mismatch("audio payload decoded as complex")),
    };
    if units.len() % channels != 0 {
        return Err(Error::type_mismatch(format!(
            "{} units do not divide into {} channels",
            units.len(),
            channels
        )));
    }

    let mut split = vec![Vec::with_capacity(units.len() / channels); channels];
    for frame in units.chunks_exact(channels) {
        for (channel, &unit) in split.iter_mut().zip(frame) {
            channel.push(unit);
        }
    }

    Ok((
        header,
        Audio {
            rate: header.sample_rate,
            channels: split,
        },
    ))
}

/// Encode samples as a WAV container.
///
/// Complex samples are written as two channels (I, Q) and require
/// `channels == 2`; real samples are taken as already-interleaved frames.
pub fn encode(samples: &Samples, rate: u32, channels: u16, tag: FormatTag) -> Result<Vec<u8>> {
    if samples.is_complex() && channels != 2 {
        return Err(Error::type_mismatch(format!(
            "complex samples need a 2-channel container, not {channels}"
        )));
    }
    if channels == 0 || samples.unit_count() % channels as usize != 0 {
        return Err(Error::type_mismatch(format!(
            "{} samples do not divide into {} channels",
            samples.len(),
            channels
        )));
    }

    let (bits_per_sample, sample_format) = match tag {
        FormatTag::Int16 => (16, SampleFormat::Int),
        FormatTag::Float32 | FormatTag::Complex64 => (32, SampleFormat::Float),
        FormatTag::Uint8 | FormatTag::Int8 => {
            return Err(Error::format(format!("{tag} container output is not supported")))
        }
    };
    let spec = WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample,
        sample_format,
    };

    let mut clipped = 0usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for unit in samples.units() {
            let (v, was_clipped) = quantize(unit, tag);
            clipped += was_clipped as usize;
            if tag.is_integer() {
                writer.write_sample(v as i16)?;
            } else {
                writer.write_sample(v as f32)?;
            }
        }
        writer.finalize()?;
    }
    if clipped > 0 {
        warn!("{} of {} samples clipped during WAV encode", clipped, samples.unit_count());
    }
    Ok(cursor.into_inner())
}

/// Encode mono or stereo audio as 16-bit PCM.
pub fn write_audio(audio: &Audio) -> Result<Vec<u8>> {
    let channels = audio.channels.len();
    if !(1..=2).contains(&channels) {
        return Err(Error::type_mismatch(format!(
            "expected mono or stereo audio, got {channels} channels"
        )));
    }
    let frames = audio.frames();
    if audio.channels.iter().any(|c| c.len() != frames) {
        return Err(Error::type_mismatch("audio channels differ in length"));
    }

    let interleaved = (0..frames)
        .flat_map(|n| audio.channels.iter().map(move |c| c[n]))
        .collect();
    encode(
        &Samples::Real(interleaved),
        audio.rate,
        channels as u16,
        FormatTag::Int16,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex32;

    #[test]
    fn test_audio_round_trip() {
        let audio = Audio::stereo(32_000, vec![0.5, -0.5, 1.0], vec![-1.0, 0.0, 0.25]);
        let bytes = write_audio(&audio).unwrap();
        let (header, back) = read_audio(&bytes).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 32_000);
        assert_eq!(header.format, FormatTag::Int16);
        for (a, b) in audio.channels.iter().flatten().zip(back.channels.iter().flatten()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1.0 / 32767.5);
        }
    }

    #[test]
    fn test_iq_float_round_trip() {
        let samples = vec![Complex32::new(0.25, -0.75), Complex32::new(-1.0, 1.0)];
        let bytes = encode(&Samples::Complex(samples.clone()), 1_920_000, 2, FormatTag::Float32).unwrap();
        let (header, buf) = read_iq(&bytes).unwrap();
        assert_eq!(header.sample_rate, 1_920_000);
        assert_eq!(buf.samples, samples);
    }

    #[test]
    fn test_payload_starts_after_data_marker() {
        let bytes = write_audio(&Audio::mono(8_000, vec![0.0; 4])).unwrap();
        let container = parse(&bytes).unwrap();
        assert_eq!(container.payload.len(), 8);
    }

    #[test]
    fn test_zero_declared_size_reads_to_end() {
        let mut bytes = write_audio(&Audio::mono(8_000, vec![0.0; 4])).unwrap();
        let pos = find_marker(&bytes, DATA_MARKER, 12).unwrap();
        bytes[pos + 4..pos + 8].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(parse(&bytes).unwrap().payload.len(), 8);
    }

    #[test]
    fn test_missing_data_marker_is_container_error() {
        let mut bytes = write_audio(&Audio::mono(8_000, vec![0.0; 4])).unwrap();
        let pos = find_marker(&bytes, DATA_MARKER, 12).unwrap();
        bytes[pos..pos + 4].copy_from_slice(b"junk");
        assert!(matches!(parse(&bytes), Err(Error::Container(_))));
    }

    #[test]
    fn test_oversized_declared_size_reads_to_end() {
        let mut bytes = write_audio(&Audio::mono(8_000, vec![0.0; 4])).unwrap();
        let pos = find_marker(&bytes, DATA_MARKER, 12).unwrap();
        bytes[pos + 4..pos + 8].copy_from_slice(&u32::MAX.to_le_bytes());
        let container = parse(&bytes).unwrap();
        assert_eq!(container.header.format, FormatTag::Int16);
        assert_eq!(container.payload.len(), 8);
    }

    #[test]
    fn test_unsupported_bit_depth_is_format_error() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0i32).unwrap();
            writer.finalize().unwrap();
        }
        assert!(matches!(parse(cursor.get_ref()), Err(Error::Format(_))));
    }

    #[test]
    fn test_missing_wave_signature_is_container_error() {
        assert!(matches!(parse(b"RIFF\0\0\0\0AVI "), Err(Error::Container(_))));
    }

    #[test]
    fn test_complex_into_mono_container_is_type_mismatch() {
        let err = encode(
            &Samples::Complex(vec![Complex32::new(0.0, 0.0)]),
            48_000,
            1,
            FormatTag::Int16,
        )
        .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_mono_container_as_iq_is_type_mismatch() {
        let bytes = write_audio(&Audio::mono(8_000, vec![0.0; 4])).unwrap();
        assert!(matches!(read_iq(&bytes), Err(Error::TypeMismatch(_))));
    }
}

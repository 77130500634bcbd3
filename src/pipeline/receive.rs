use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::buffer::{Audio, ComplexBuffer, RealBuffer};
use crate::codec::{wav, FormatTag};
use crate::config::{ReceiveConfig, StereoMode};
use crate::dsp::spectrum::{pilot_level_db, PILOT_DETECT_DB};
use crate::dsp::{demodulate, demultiplex, resample_to, EmphasisFilter};
use crate::error::{Error, Result};
use crate::{input, output};

/// Audio recovered from a capture.
#[derive(Debug, Clone)]
pub struct Received {
    pub audio: Audio,
    /// Whether the stereo decoder ran.
    pub stereo: bool,
    /// Pilot prominence in dB, when it was measured.
    pub pilot_db: Option<f32>,
}

/// Summary of a completed receive run.
#[derive(Debug, Clone)]
pub struct ReceiveReport {
    pub capture_samples: usize,
    pub capture_rate: u32,
    pub audio_frames: usize,
    pub audio_rate: u32,
    pub stereo: bool,
    pub output: PathBuf,
}

fn stereo_wanted(config: &ReceiveConfig, composite: &RealBuffer) -> (bool, Option<f32>) {
    match config.stereo {
        StereoMode::Off => (false, None),
        StereoMode::On => (true, None),
        StereoMode::Auto => {
            let level = pilot_level_db(&composite.samples, composite.rate);
            debug!("pilot stands {:.1} dB above its guard band", level);
            (level >= PILOT_DETECT_DB, Some(level))
        }
    }
}

/// De-emphasise at IF, then decimate to the audio rate.
fn finish_channel(config: &ReceiveConfig, channel: RealBuffer) -> Result<Vec<f32>> {
    let channel = match config.deemphasis_tau() {
        Some(tau) => {
            let mut filter = EmphasisFilter::deemphasis(tau, channel.rate as f64)?;
            RealBuffer::new(channel.rate, filter.process(&channel.samples))
        }
        None => channel,
    };
    Ok(resample_to(&channel, config.audio_rate)?.samples)
}

/// Demodulate a capture to audio at `config.audio_rate`.
///
/// The capture is decimated to the IF rate and demodulated. The composite
/// is split into left and right at IF when stereo is selected, so the
/// 38 kHz subcarrier is still present. Each channel is then de-emphasised
/// and decimated.
pub fn demodulate_capture(config: &ReceiveConfig, capture: &ComplexBuffer) -> Result<Received> {
    config.validate()?;
    if capture.len() < 2 {
        return Err(Error::invalid_parameter(
            "input",
            format!("capture holds {} IQ samples, need at least 2", capture.len()),
        ));
    }

    let baseband = resample_to(capture, config.if_rate)?;
    let composite = demodulate(&baseband, config.max_deviation)?;

    let (stereo, pilot_db) = stereo_wanted(config, &composite);
    let channels = if stereo {
        let decoded = demultiplex(&composite)?;
        if !decoded.pilot_detected {
            warn!("no 19 kHz pilot found, both channels carry the mono signal");
        }
        vec![decoded.left, decoded.right]
    } else {
        vec![composite]
    };

    let channels = channels
        .into_iter()
        .map(|channel| finish_channel(config, channel))
        .collect::<Result<Vec<_>>>()?;

    Ok(Received {
        audio: Audio {
            rate: config.audio_rate,
            channels,
        },
        stereo,
        pilot_db,
    })
}

/// Read a capture file, demodulate it and write a 16-bit WAV.
///
/// Container captures must be recorded at `config.capture_rate`; raw
/// captures are assumed to be. Nothing is written on failure.
pub fn receive_file(
    config: &ReceiveConfig,
    format: FormatTag,
    raw: bool,
    input: &Path,
    output: &Path,
) -> Result<ReceiveReport> {
    config.validate()?;
    let bytes = input::read_file(input)?;
    let capture = input::load_capture(&bytes, format, raw)?;
    drop(bytes);

    if let Some(header) = capture.header {
        if header.sample_rate != config.capture_rate {
            return Err(Error::invalid_parameter(
                "capture_rate",
                format!(
                    "{} is recorded at {} Hz, expected {} Hz",
                    input.display(),
                    header.sample_rate,
                    config.capture_rate
                ),
            ));
        }
    }

    let capture = capture.into_buffer(config.capture_rate);
    info!(
        "read {} IQ samples ({:.2} s at {} Hz) from {}",
        capture.len(),
        capture.duration_secs(),
        capture.rate,
        input.display()
    );

    let received = demodulate_capture(config, &capture)?;
    let wav_bytes = wav::write_audio(&received.audio)?;
    let written = output::write_atomic(output, &wav_bytes)?;

    Ok(ReceiveReport {
        capture_samples: capture.len(),
        capture_rate: capture.rate,
        audio_frames: received.audio.frames(),
        audio_rate: received.audio.rate,
        stereo: received.stereo,
        output: written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Samples;
    use crate::dsp::modulate;
    use num_complex::Complex32;
    use std::f32::consts::PI;

    fn tone_capture(config: &ReceiveConfig, freq: f32, amplitude: f32, secs: f32) -> ComplexBuffer {
        let len = (config.if_rate as f32 * secs) as usize;
        let message: Vec<f32> = (0..len)
            .map(|n| amplitude * (2.0 * PI * freq * n as f32 / config.if_rate as f32).sin())
            .collect();
        let baseband = modulate(&RealBuffer::new(config.if_rate, message), config.max_deviation).unwrap();
        resample_to(&baseband, config.capture_rate).unwrap()
    }

    #[test]
    fn test_mono_output_rate_and_length() {
        let config = ReceiveConfig {
            deemphasis_us: 0.0,
            ..Default::default()
        };
        let capture = tone_capture(&config, 1_000.0, 0.5, 0.1);
        let received = demodulate_capture(&config, &capture).unwrap();
        assert!(!received.stereo);
        assert_eq!(received.audio.rate, 32_000);
        assert_eq!(received.audio.channels.len(), 1);
        let expected = 3_200;
        assert!(received.audio.frames().abs_diff(expected) <= 2);
    }

    #[test]
    fn test_auto_stereo_falls_back_to_mono_without_pilot() {
        let config = ReceiveConfig {
            stereo: StereoMode::Auto,
            ..Default::default()
        };
        let capture = tone_capture(&config, 1_000.0, 0.5, 0.1);
        let received = demodulate_capture(&config, &capture).unwrap();
        assert!(!received.stereo);
        assert!(received.pilot_db.is_some());
        assert_eq!(received.audio.channels.len(), 1);
    }

    #[test]
    fn test_forced_stereo_emits_two_channels() {
        let config = ReceiveConfig {
            stereo: StereoMode::On,
            ..Default::default()
        };
        let capture = tone_capture(&config, 1_000.0, 0.5, 0.1);
        let received = demodulate_capture(&config, &capture).unwrap();
        assert!(received.stereo);
        assert_eq!(received.audio.channels.len(), 2);
    }

    #[test]
    fn test_tiny_capture_rejected() {
        let config = ReceiveConfig::default();
        let capture = ComplexBuffer::new(config.capture_rate, vec![Complex32::new(1.0, 0.0)]);
        assert!(matches!(
            demodulate_capture(&config, &capture),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_container_rate_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("capture.wav");
        let output = dir.path().join("audio.wav");
        let iq = Samples::Complex(vec![Complex32::new(0.5, 0.5); 1_000]);
        std::fs::write(&input, wav::encode(&iq, 2_400_000, 2, FormatTag::Int16).unwrap()).unwrap();

        let result = receive_file(&ReceiveConfig::default(), FormatTag::Int16, false, &input, &output);
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
        assert!(!output.exists());
    }
}

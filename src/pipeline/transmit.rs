use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::buffer::{Audio, ComplexBuffer, RealBuffer, Samples};
use crate::codec::{self, wav, FormatTag};
use crate::config::TransmitConfig;
use crate::dsp::{modulate, multiplex, resample_to, EmphasisFilter};
use crate::error::{Error, Result};
use crate::{input, output};

/// Modulated signal at the IF and RF rates.
#[derive(Debug, Clone)]
pub struct Transmitted {
    pub baseband: ComplexBuffer,
    pub rf: ComplexBuffer,
    pub stereo: bool,
}

/// Summary of a completed transmit run.
#[derive(Debug, Clone)]
pub struct TransmitReport {
    pub audio_frames: usize,
    pub stereo: bool,
    pub baseband_samples: usize,
    pub baseband_rate: u32,
    pub rf_samples: usize,
    pub rf_rate: u32,
    pub baseband_output: PathBuf,
    pub rf_output: PathBuf,
}

/// Pre-emphasise at the audio rate, then interpolate to IF.
fn prepare_channel(config: &TransmitConfig, rate: u32, samples: &[f32]) -> Result<RealBuffer> {
    let samples = match config.preemphasis_tau() {
        Some(tau) => EmphasisFilter::preemphasis(tau, rate as f64)?.process(samples),
        None => samples.to_vec(),
    };
    resample_to(&RealBuffer::new(rate, samples), config.if_rate)
}

/// Frequency-modulate mono or stereo audio.
///
/// Stereo channels are multiplexed at the IF rate, where the 38 kHz
/// subcarrier fits. The modulated IF signal is then interpolated to RF.
pub fn modulate_audio(config: &TransmitConfig, audio: &Audio) -> Result<Transmitted> {
    let channels = audio.channels.len();
    if !(1..=2).contains(&channels) {
        return Err(Error::type_mismatch(format!(
            "expected mono or stereo audio, got {channels} channels"
        )));
    }
    let stereo = channels == 2;
    config.validate(stereo)?;

    if audio.rate != config.audio_rate {
        return Err(Error::invalid_parameter(
            "audio_rate",
            format!("input is {} Hz, expected {} Hz", audio.rate, config.audio_rate),
        ));
    }
    let frames = audio.frames();
    if frames == 0 {
        return Err(Error::invalid_parameter("input", "audio holds no frames"));
    }

    let mut prepared = audio
        .channels
        .iter()
        .map(|channel| prepare_channel(config, audio.rate, &channel[..frames]))
        .collect::<Result<Vec<_>>>()?
        .into_iter();

    let message = match (prepared.next(), prepared.next()) {
        (Some(left), Some(right)) => multiplex(&left, &right)?,
        (Some(mono), None) => mono,
        _ => return Err(Error::type_mismatch("audio has no channels")),
    };
    debug!("message at IF: {} samples at {} Hz", message.len(), message.rate);

    let baseband = modulate(&message, config.max_deviation)?;
    let rf = resample_to(&baseband, config.rf_rate)?;

    Ok(Transmitted {
        baseband,
        rf,
        stereo,
    })
}

/// Read a 16-bit WAV, modulate it and write the IF baseband and RF files.
///
/// Both outputs are staged first and committed together; a failure while
/// committing removes whatever was already moved into place.
pub fn transmit_file(
    config: &TransmitConfig,
    input: &Path,
    baseband_output: &Path,
    rf_output: &Path,
) -> Result<TransmitReport> {
    let bytes = input::read_file(input)?;
    let (header, audio) = wav::read_audio(&bytes)?;
    drop(bytes);

    if header.format != FormatTag::Int16 {
        return Err(Error::invalid_parameter(
            "input",
            format!(
                "{} holds {}-bit {} audio, expected 16-bit PCM",
                input.display(),
                header.bits_per_sample,
                header.format
            ),
        ));
    }
    info!(
        "read {} frames ({} ch, {} Hz) from {}",
        audio.frames(),
        header.channels,
        header.sample_rate,
        input.display()
    );

    let Transmitted {
        baseband,
        rf,
        stereo,
    } = modulate_audio(config, &audio)?;
    let (baseband_samples, baseband_rate) = (baseband.len(), baseband.rate);
    let (rf_samples, rf_rate) = (rf.len(), rf.rate);

    let staged_baseband = output::stage(
        baseband_output,
        &codec::encode(&Samples::Complex(baseband.samples), config.baseband_format)?,
    )?;
    let staged_rf = output::stage(
        rf_output,
        &codec::encode(&Samples::Complex(rf.samples), config.rf_format)?,
    )?;

    output::commit_all(vec![staged_baseband, staged_rf])?;

    Ok(TransmitReport {
        audio_frames: audio.frames(),
        stereo,
        baseband_samples,
        baseband_rate,
        rf_samples,
        rf_rate,
        baseband_output: baseband_output.to_path_buf(),
        rf_output: rf_output.to_path_buf(),
    })
}

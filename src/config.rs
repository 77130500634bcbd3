//! Pipeline configuration.
//!
//! Defaults reproduce the stock receive chain (1.92 MHz capture → 192 kHz IF
//! → 32 kHz audio) and transmit chain (32 kHz audio → 320 kHz IF → 8 MHz RF),
//! both at 75 kHz deviation. A TOML file may override any field:
//!
//! ```toml
//! [general]
//! log_level = "debug"
//!
//! [receive]
//! deemphasis_us = 50.0
//! stereo = "auto"
//!
//! [transmit]
//! rf_rate = 2000000
//! rf_format = "uint8"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::codec::FormatTag;
use crate::dsp::emphasis::ensure_corner_below_nyquist;
use crate::dsp::stereo::MIN_STEREO_RATE_HZ;
use crate::error::{ensure_positive, Error, Result};

/// Stereo decoding policy for the receive chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StereoMode {
    /// Always decode mono.
    #[default]
    Off,
    /// Always run the stereo decoder.
    On,
    /// Decode stereo when a 19 kHz pilot is found.
    Auto,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub receive: ReceiveConfig,
    pub transmit: TransmitConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceiveConfig {
    /// Expected rate of the captured IQ file (Hz)
    pub capture_rate: u32,
    /// Demodulation rate (Hz)
    pub if_rate: u32,
    /// Output audio rate (Hz)
    pub audio_rate: u32,
    /// Frequency deviation that maps to full-scale audio (Hz)
    pub max_deviation: f64,
    /// De-emphasis time constant in µs; 0 disables
    pub deemphasis_us: f64,
    pub stereo: StereoMode,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            capture_rate: 1_920_000,
            if_rate: 192_000,
            audio_rate: 32_000,
            max_deviation: 75_000.0,
            deemphasis_us: 75.0,
            stereo: StereoMode::Off,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    /// Output RF sample rate (Hz)
    pub rf_rate: u32,
    /// Modulation rate (Hz)
    pub if_rate: u32,
    /// Required input audio rate (Hz)
    pub audio_rate: u32,
    /// Frequency deviation for full-scale audio (Hz)
    pub max_deviation: f64,
    /// Pre-emphasis time constant in µs; 0 disables
    pub preemphasis_us: f64,
    /// On-disk format of the RF output
    pub rf_format: FormatTag,
    /// On-disk format of the IF baseband output
    pub baseband_format: FormatTag,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            rf_rate: 8_000_000,
            if_rate: 320_000,
            audio_rate: 32_000,
            max_deviation: 75_000.0,
            preemphasis_us: 75.0,
            rf_format: FormatTag::Int8,
            baseband_format: FormatTag::Complex64,
        }
    }
}

/// `rate` is the rate the filter runs at.
fn ensure_time_constant(name: &str, micros: f64, rate: u32) -> Result<()> {
    if !(micros.is_finite() && micros >= 0.0) {
        return Err(Error::invalid_parameter(
            name,
            format!("must be a non-negative number of microseconds, got {micros}"),
        ));
    }
    match time_constant(micros) {
        Some(tau) => ensure_corner_below_nyquist(name, tau, rate as f64),
        None => Ok(()),
    }
}

/// Time constant in seconds, `None` when disabled.
fn time_constant(micros: f64) -> Option<f64> {
    (micros > 0.0).then_some(micros / 1e6)
}

fn ensure_stereo_if_rate(if_rate: u32) -> Result<()> {
    if (if_rate as f64) < MIN_STEREO_RATE_HZ {
        return Err(Error::invalid_parameter(
            "if_rate",
            format!("{if_rate} Hz cannot carry the stereo subcarrier (need {MIN_STEREO_RATE_HZ} Hz)"),
        ));
    }
    Ok(())
}

impl ReceiveConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("capture_rate", self.capture_rate as f64)?;
        ensure_positive("if_rate", self.if_rate as f64)?;
        ensure_positive("audio_rate", self.audio_rate as f64)?;
        ensure_positive("max_deviation", self.max_deviation)?;
        ensure_time_constant("deemphasis_us", self.deemphasis_us, self.if_rate)?;
        if self.stereo != StereoMode::Off {
            ensure_stereo_if_rate(self.if_rate)?;
        }
        Ok(())
    }

    pub fn deemphasis_tau(&self) -> Option<f64> {
        time_constant(self.deemphasis_us)
    }
}

impl TransmitConfig {
    /// `stereo` is whether the input has two channels.
    pub fn validate(&self, stereo: bool) -> Result<()> {
        ensure_positive("rf_rate", self.rf_rate as f64)?;
        ensure_positive("if_rate", self.if_rate as f64)?;
        ensure_positive("audio_rate", self.audio_rate as f64)?;
        ensure_positive("max_deviation", self.max_deviation)?;
        ensure_time_constant("preemphasis_us", self.preemphasis_us, self.audio_rate)?;
        if stereo {
            ensure_stereo_if_rate(self.if_rate)?;
        }
        Ok(())
    }

    pub fn preemphasis_tau(&self) -> Option<f64> {
        time_constant(self.preemphasis_us)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_chains() {
        let config = Config::default();
        assert_eq!(config.receive.capture_rate, 1_920_000);
        assert_eq!(config.receive.if_rate, 192_000);
        assert_eq!(config.receive.audio_rate, 32_000);
        assert_eq!(config.transmit.rf_rate, 8_000_000);
        assert_eq!(config.transmit.if_rate, 320_000);
        assert_eq!(config.transmit.rf_format, FormatTag::Int8);
        assert_eq!(config.receive.deemphasis_tau(), Some(75e-6));
        assert!(config.receive.validate().is_ok());
        assert!(config.transmit.validate(true).is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [general]
            log_level = "debug"

            [receive]
            deemphasis_us = 50.0
            stereo = "auto"

            [transmit]
            rf_format = "uint8"
            "#,
        )
        .unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.receive.stereo, StereoMode::Auto);
        assert_eq!(config.receive.deemphasis_us, 50.0);
        assert_eq!(config.receive.if_rate, 192_000);
        assert_eq!(config.transmit.rf_format, FormatTag::Uint8);
        assert_eq!(config.transmit.rf_rate, 8_000_000);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            Config::from_toml_str("[receive]\nstereo = \"sometimes\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_disabled_emphasis() {
        let config = ReceiveConfig {
            deemphasis_us: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.deemphasis_tau(), None);
    }

    #[test]
    fn test_validation_failures() {
        let config = ReceiveConfig {
            if_rate: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidParameter { .. })));

        let config = ReceiveConfig {
            if_rate: 96_000,
            stereo: StereoMode::On,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TransmitConfig {
            preemphasis_us: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate(false).is_err());

        let config = ReceiveConfig {
            deemphasis_us: 1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidParameter { .. })));

        // 5 µs is fine at the 192 kHz IF but not at 32 kHz audio.
        let config = TransmitConfig {
            preemphasis_us: 5.0,
            ..Default::default()
        };
        assert!(config.validate(false).is_err());
        assert!(ReceiveConfig {
            deemphasis_us: 5.0,
            ..Default::default()
        }
        .validate()
        .is_ok());

        let config = TransmitConfig {
            if_rate: 100_000,
            ..Default::default()
        };
        assert!(config.validate(false).is_ok());
        assert!(config.validate(true).is_err());
    }
}

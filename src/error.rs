//! Error type shared by the codec, the DSP stages and the orchestrators.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias for fallible pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum Error {
    /// Unsupported on-disk sample type or encoding.
    #[error("format error: {0}")]
    Format(String),

    /// Malformed container header or missing payload marker.
    #[error("container error: {0}")]
    Container(String),

    /// Real/complex confusion or wrong channel count.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Invalid rate, ratio, deviation or time constant.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What was wrong with it.
        message: String,
    },

    /// Unreadable or unwritable path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// WAV writer failure.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Config file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    pub fn container<S: Into<String>>(msg: S) -> Self {
        Error::Container(msg.into())
    }

    pub fn type_mismatch<S: Into<String>>(msg: S) -> Self {
        Error::TypeMismatch(msg.into())
    }

    pub fn invalid_parameter<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Attach a path to an I/O error.
    pub fn io<P: AsRef<Path>>(path: P, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Reject rates, ratios and deviations that are not finite and strictly positive.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(
            name,
            format!("must be finite and positive, got {value}"),
        ))
    }
}

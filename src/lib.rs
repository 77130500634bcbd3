//! Offline FM broadcast baseband processing for SDR sample files.
//!
//! The receive chain turns a captured IQ file into mono or stereo audio;
//! the transmit chain turns an audio file into FM baseband and RF IQ files.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod dsp;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;

pub use buffer::{Audio, ComplexBuffer, RealBuffer, SampleBuffer, Samples};
pub use codec::FormatTag;
pub use config::{Config, StereoMode};
pub use error::{Error, Result};

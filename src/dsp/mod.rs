//! Signal-processing stages. All of them work on normalized floats; the
//! stateful types carry their filter or oscillator state across calls.

pub mod emphasis;
pub mod fir;
pub mod fm;
pub mod resampler;
pub mod spectrum;
pub mod stereo;

pub use emphasis::{deemphasis_taps, preemphasis_taps, EmphasisFilter, EmphasisTaps};
pub use fm::{demodulate, modulate, FmDemodulator, FmModulator};
pub use resampler::{decimate, interpolate, resample, resample_to, Resampler};
pub use stereo::{demultiplex, multiplex, StereoDecode, StereoEncoder};

//! End-to-end receive and transmit flows.
//!
//! Each flow has an in-memory form working on buffers and a file form that
//! adds decoding, validation and atomic output on top of it.

pub mod receive;
pub mod transmit;

pub use receive::{demodulate_capture, receive_file, ReceiveReport, Received};
pub use transmit::{modulate_audio, transmit_file, TransmitReport, Transmitted};

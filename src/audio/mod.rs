//! Audio pipeline — microphone capture → session accumulation → canonical PCM.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → SampleBuffer
//!           → take_captured() → encode() → PcmAudio (WAV or passthrough)
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use meeting_scribe::audio::{encode, CapturedAudio, EncodeTarget};
//!
//! let captured = CapturedAudio::decoded(vec![0.1, -0.1, 0.2, -0.2], 2, 44_100);
//! let pcm = encode(&captured, &EncodeTarget::default());
//! assert!(pcm.is_canonical()); // mono, 16-bit, 16 kHz RIFF WAV
//! ```

pub mod buffer;
pub mod capture;
pub mod encode;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use buffer::SampleBuffer;
pub use capture::{AudioCapture, AudioChunk, DeviceError, StreamHandle};
pub use encode::{
    downmix_to_mono, encode, quantize_sample, resample, CapturedAudio, DecodedAudio, EncodeTarget,
    PcmAudio,
};

//! Canonical PCM encoding for the diarization service.
//!
//! [`encode`] is a pure, deterministic transform: captured samples in, a
//! canonical mono / 16-bit / 16 kHz little-endian RIFF WAV container out.
//! Identical input always yields byte-identical output.
//!
//! The three conversion steps:
//!
//! 1. downmix — arithmetic mean of **all** channels at each frame index;
//! 2. resample — linear interpolation to the target rate (no-op when the
//!    rates already match);
//! 3. quantize — clamp to `[-1, 1]`, then scale by `0x8000` for negative
//!    samples and `0x7FFF` for non-negative ones (the asymmetric range of a
//!    signed 16-bit integer).
//!
//! Encoding never fails: audio the capture layer could not decode — or a
//! buffer whose format is unusable — passes through unchanged as a
//! [`PcmAudio::Passthrough`] container, and downstream consumers accept
//! either shape.
//!
//! The current resampler uses linear interpolation.  For better quality the
//! inner loop can be replaced with the `rubato` crate (`SincFixedIn`), which
//! is already listed in `Cargo.toml` for that upgrade path.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

// ---------------------------------------------------------------------------
// DecodedAudio / CapturedAudio
// ---------------------------------------------------------------------------

/// Decoded capture output: interleaved `f32` samples in `[-1, 1]` with an
/// arbitrary channel count and sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

/// What the recording pipeline hands to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedAudio {
    /// Samples the capture layer decoded successfully.
    Decoded(DecodedAudio),
    /// An opaque container the capture layer could not decode; the encoder
    /// passes these bytes through unchanged.
    Undecoded(Vec<u8>),
}

impl CapturedAudio {
    pub fn decoded(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self::Decoded(DecodedAudio {
            samples,
            channels,
            sample_rate,
        })
    }

    pub fn undecoded(bytes: Vec<u8>) -> Self {
        Self::Undecoded(bytes)
    }
}

// ---------------------------------------------------------------------------
// EncodeTarget
// ---------------------------------------------------------------------------

/// Target container parameters.
///
/// Only the canonical mono / 16-bit shape is encodable; any other target
/// routes the input to the passthrough fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeTarget {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count (must be 1).
    pub channels: u16,
    /// Output bit depth (must be 16).
    pub bit_depth: u16,
}

impl Default for EncodeTarget {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            bit_depth: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// PcmAudio
// ---------------------------------------------------------------------------

/// The encoder's output container.  Immutable once produced; consumed once
/// by the diarization client.
#[derive(Debug, Clone, PartialEq)]
pub enum PcmAudio {
    /// Canonical RIFF WAV: 44-byte header + little-endian 16-bit payload.
    ///
    /// Header invariants: block-align = channels × bytes-per-sample,
    /// byte-rate = sample-rate × block-align, payload length =
    /// sample-count × channels × bytes-per-sample.
    Wav {
        sample_rate: u32,
        channels: u16,
        bit_depth: u16,
        bytes: Vec<u8>,
    },
    /// Degraded fallback: the original bytes, unencoded.
    Passthrough { bytes: Vec<u8> },
}

impl PcmAudio {
    /// The container bytes, whichever shape was produced.
    pub fn bytes(&self) -> &[u8] {
        match self {
            PcmAudio::Wav { bytes, .. } => bytes,
            PcmAudio::Passthrough { bytes } => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// `true` for the canonical WAV shape, `false` for the passthrough
    /// fallback.
    pub fn is_canonical(&self) -> bool {
        matches!(self, PcmAudio::Wav { .. })
    }
}

// ---------------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------------

/// Package captured audio into the canonical PCM container.
///
/// Pure and side-effect-free; identical `audio` and `target` always yield
/// byte-identical output.  Never fails — undecodable input and unusable
/// formats come back as [`PcmAudio::Passthrough`].
pub fn encode(audio: &CapturedAudio, target: &EncodeTarget) -> PcmAudio {
    let decoded = match audio {
        CapturedAudio::Decoded(decoded) => decoded,
        CapturedAudio::Undecoded(bytes) => {
            log::warn!(
                "encode: input not decodable, passing {} bytes through unchanged",
                bytes.len()
            );
            return PcmAudio::Passthrough {
                bytes: bytes.clone(),
            };
        }
    };

    if decoded.channels == 0
        || decoded.sample_rate == 0
        || target.sample_rate == 0
        || target.channels != 1
        || target.bit_depth != 16
    {
        log::warn!(
            "encode: unusable format ({}ch @ {}Hz → {}ch/{}bit @ {}Hz), passing through",
            decoded.channels,
            decoded.sample_rate,
            target.channels,
            target.bit_depth,
            target.sample_rate
        );
        return PcmAudio::Passthrough {
            bytes: raw_sample_bytes(&decoded.samples),
        };
    }

    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    let resampled = resample(&mono, decoded.sample_rate, target.sample_rate);

    match write_wav(&resampled, target.sample_rate) {
        Ok(bytes) => PcmAudio::Wav {
            sample_rate: target.sample_rate,
            channels: 1,
            bit_depth: 16,
            bytes,
        },
        Err(err) => {
            log::warn!("encode: WAV writer failed ({err}), passing samples through");
            PcmAudio::Passthrough {
                bytes: raw_sample_bytes(&decoded.samples),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion steps
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all
/// channels at each frame index (not just the first two).
///
/// The output length is `samples.len() / channels`; a trailing partial
/// frame is dropped.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample `samples` from `source_rate` Hz to `target_rate` Hz using
/// linear interpolation.  No-op fast path when the rates match.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            // Linear interpolation between adjacent samples
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

/// Quantize one `f32` sample into a signed 16-bit value.
///
/// Clamps to `[-1, 1]`, then scales by `0x8000` when negative and `0x7FFF`
/// when non-negative so the full asymmetric i16 range is used.
pub fn quantize_sample(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    let scaled = if clamped < 0.0 {
        clamped * 0x8000 as f32
    } else {
        clamped * 0x7FFF as f32
    };
    scaled as i16
}

fn write_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(quantize_sample(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Little-endian serialization of raw `f32` samples, used when the
/// canonical container cannot be produced.
fn raw_sample_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

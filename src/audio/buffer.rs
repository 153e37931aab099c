//! Whole-session sample accumulation.
//!
//! [`SampleBuffer`] collects every [`AudioChunk`](crate::audio::AudioChunk)
//! delivered while a recording session is active.  Unlike a tail-window ring
//! buffer, diarization needs the *entire* recording, so the buffer grows
//! until the configured maximum length and is handed to the encoder exactly
//! once via [`SampleBuffer::take_captured`], which drains it.

use crate::audio::capture::AudioChunk;
use crate::audio::encode::CapturedAudio;

// ---------------------------------------------------------------------------
// SampleBuffer
// ---------------------------------------------------------------------------

/// Accumulates interleaved `f32` samples for one recording session.
///
/// The first pushed chunk fixes the buffer's channel count and sample rate;
/// later chunks with a different format are appended anyway with a warning
/// (the encoder normalizes everything downstream).  The recording pipeline
/// owns this buffer exclusively until the samples are handed to the encoder.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    max_secs: f32,
    /// Hard cap on stored samples; pushes beyond it are dropped.
    max_samples: usize,
    overflow_logged: bool,
}

impl SampleBuffer {
    /// Create an empty buffer capped at `max_secs` of audio once the format
    /// is known.  Format fields stay zero until the first chunk arrives.
    pub fn new(max_secs: f32) -> Self {
        let max_secs = max_secs.max(0.0);
        Self {
            samples: Vec::new(),
            sample_rate: 0,
            channels: 0,
            max_secs,
            // Refined on the first chunk; generous stereo/48k bound until then.
            max_samples: (max_secs * 48_000.0) as usize * 2,
            overflow_logged: false,
        }
    }

    /// Append one captured chunk.
    pub fn push_chunk(&mut self, chunk: &AudioChunk) {
        if self.sample_rate == 0 && self.channels == 0 {
            self.sample_rate = chunk.sample_rate;
            self.channels = chunk.channels;
            if chunk.sample_rate > 0 && chunk.channels > 0 {
                let per_sec = chunk.sample_rate as usize * chunk.channels as usize;
                self.max_samples = (self.max_secs * per_sec as f32) as usize;
            }
        } else if chunk.sample_rate != self.sample_rate || chunk.channels != self.channels {
            log::warn!(
                "audio: chunk format changed mid-session ({}Hz/{}ch → {}Hz/{}ch)",
                self.sample_rate,
                self.channels,
                chunk.sample_rate,
                chunk.channels
            );
        }

        let room = self.max_samples.saturating_sub(self.samples.len());
        if room == 0 {
            if !self.overflow_logged {
                log::warn!("audio: maximum recording length reached, dropping further samples");
                self.overflow_logged = true;
            }
            return;
        }

        let take = room.min(chunk.samples.len());
        self.samples.extend_from_slice(&chunk.samples[..take]);
    }

    /// Hand the accumulated audio to the encoder, draining the buffer.
    ///
    /// The buffer is empty (and format-less) afterwards — the samples are
    /// owned by the returned [`CapturedAudio`] and discarded here, matching
    /// the one-shot encode handoff.
    pub fn take_captured(&mut self) -> CapturedAudio {
        let samples = std::mem::take(&mut self.samples);
        let captured = CapturedAudio::decoded(samples, self.channels, self.sample_rate);
        self.sample_rate = 0;
        self.channels = 0;
        self.overflow_logged = false;
        captured
    }

    /// Discard everything, keeping the cap.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sample_rate = 0;
        self.channels = 0;
        self.overflow_logged = false;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Recorded duration in seconds given the buffer's own format, or `0.0`
    /// before any chunk arrived.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(samples: Vec<f32>, sample_rate: u32, channels: u16) -> AudioChunk {
        AudioChunk {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn first_chunk_fixes_format() {
        let mut buf = SampleBuffer::new(60.0);
        buf.push_chunk(&chunk(vec![0.1, 0.2], 44_100, 2));

        assert_eq!(buf.len(), 2);
        assert!(buf.duration_secs() > 0.0);
    }

    #[test]
    fn chunks_accumulate_in_order() {
        let mut buf = SampleBuffer::new(60.0);
        buf.push_chunk(&chunk(vec![1.0, 2.0], 16_000, 1));
        buf.push_chunk(&chunk(vec![3.0], 16_000, 1));

        match buf.take_captured() {
            CapturedAudio::Decoded(inner) => assert_eq!(inner.samples, vec![1.0, 2.0, 3.0]),
            CapturedAudio::Undecoded(_) => panic!("expected decoded samples"),
        }
    }

    #[test]
    fn mismatched_format_still_appends() {
        let mut buf = SampleBuffer::new(60.0);
        buf.push_chunk(&chunk(vec![1.0], 44_100, 2));
        buf.push_chunk(&chunk(vec![2.0], 48_000, 1));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn take_captured_drains_buffer() {
        let mut buf = SampleBuffer::new(60.0);
        buf.push_chunk(&chunk(vec![0.5; 100], 16_000, 1));

        let _ = buf.take_captured();
        assert!(buf.is_empty());
        assert_eq!(buf.duration_secs(), 0.0);
    }

    #[test]
    fn clear_resets_format() {
        let mut buf = SampleBuffer::new(60.0);
        buf.push_chunk(&chunk(vec![0.5; 10], 44_100, 2));
        buf.clear();

        assert!(buf.is_empty());
        // New format may differ after clear.
        buf.push_chunk(&chunk(vec![0.5; 10], 16_000, 1));
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn max_length_cap_drops_overflow() {
        // 1 second cap at 16 kHz mono = 16 000 samples.
        let mut buf = SampleBuffer::new(1.0);
        buf.push_chunk(&chunk(vec![0.0; 16_000], 16_000, 1));
        buf.push_chunk(&chunk(vec![0.0; 4_000], 16_000, 1));

        assert_eq!(buf.len(), 16_000);
    }

    #[test]
    fn duration_accounts_for_channels() {
        let mut buf = SampleBuffer::new(60.0);
        // 1 s of stereo at 4 Hz = 8 interleaved samples.
        buf.push_chunk(&chunk(vec![0.0; 8], 4, 2));
        assert!((buf.duration_secs() - 1.0).abs() < 1e-6);
    }
}

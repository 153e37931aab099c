//! Microphone capture via `cpal`.
//!
//! [`AudioCapture::open`] picks an input device (named or system default)
//! and [`AudioCapture::start`] streams interleaved [`AudioChunk`]s over a
//! tokio channel into the pipeline's
//! [`SampleBuffer`](crate::audio::SampleBuffer).  The returned
//! [`StreamHandle`] is a RAII guard: dropping it stops the hardware stream.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]` at whatever rate and
/// channel count the device natively produces; the encoder normalizes to
/// the canonical container after the session stops.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamHandle / DeviceError
// ---------------------------------------------------------------------------

/// RAII guard keeping the cpal stream alive; drop to stop recording.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

/// Errors while selecting a device or running the capture stream.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no default audio input device available")]
    NoDevice,

    #[error("audio input device not found: {0}")]
    NamedDeviceMissing(String),

    #[error("failed to enumerate input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use meeting_scribe::audio::{AudioCapture, AudioChunk};
/// use tokio::sync::mpsc;
///
/// let (tx, rx) = mpsc::unbounded_channel::<AudioChunk>();
/// let capture = AudioCapture::open(None).unwrap(); // system default mic
/// let _handle = capture.start(tx).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop recording.
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Open an input device by name, or the system default when `name` is
    /// `None`, and query its preferred stream configuration.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NoDevice`] when no matching device exists, or
    /// [`DeviceError::DefaultConfig`] when it cannot report a default
    /// stream configuration.
    pub fn open(name: Option<&str>) -> Result<Self, DeviceError> {
        let host = cpal::default_host();

        let device = match name {
            Some(wanted) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| DeviceError::NamedDeviceMissing(wanted.to_string()))?,
            None => host.default_input_device().ok_or(DeviceError::NoDevice)?,
        };

        let supported = device.default_input_config()?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        log::debug!(
            "audio: opened input device {:?} ({sample_rate}Hz, {channels}ch)",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        Ok(Self {
            device,
            config: supported.into(),
            sample_rate,
            channels,
        })
    }

    /// Native sample rate of the selected device.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Native channel count of the selected device.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Start recording and forward [`AudioChunk`]s to `tx`.
    ///
    /// The cpal callback runs on a dedicated audio thread; send errors
    /// (receiver dropped) are ignored there so the audio thread never
    /// panics.
    ///
    /// # Errors
    ///
    /// [`DeviceError::BuildStream`] / [`DeviceError::PlayStream`] when the
    /// platform rejects the stream configuration.
    pub fn start(
        &self,
        tx: mpsc::UnboundedSender<AudioChunk>,
    ) -> Result<StreamHandle, DeviceError> {
        let (sample_rate, channels) = (self.sample_rate, self.channels);

        let data_callback = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let _ = tx.send(AudioChunk {
                samples: data.to_vec(),
                sample_rate,
                channels,
            });
        };
        let error_callback = |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        };

        let stream =
            self.device
                .build_input_stream(&self.config, data_callback, error_callback, None)?;
        stream.play()?;
        log::debug!("audio: capture stream running");

        Ok(StreamHandle { _stream: stream })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // Hardware-dependent paths (device enumeration, stream start) are not
    // exercised here — CI machines rarely expose an input device.

    #[test]
    fn chunk_carries_its_format() {
        let chunk = AudioChunk {
            samples: vec![0.0, 0.5],
            sample_rate: 48_000,
            channels: 2,
        };
        let copy = chunk.clone();
        assert_eq!(copy.samples, vec![0.0, 0.5]);
        assert_eq!((copy.sample_rate, copy.channels), (48_000, 2));
    }

    #[test]
    fn missing_device_errors_name_the_device() {
        let anon = DeviceError::NoDevice.to_string();
        assert_eq!(anon, "no default audio input device available");

        let named = DeviceError::NamedDeviceMissing("USB Mic".into()).to_string();
        assert!(named.ends_with(": USB Mic"));
    }
}

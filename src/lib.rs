//! meeting-scribe — record speech, transcribe it live, attribute speakers.
//!
//! The crate turns a stream of continuous-recognition events into a stable,
//! time-stamped utterance log while raw audio accumulates alongside it; when
//! the session stops, the audio is packaged into a canonical PCM container,
//! sent to a diarization relay, and the returned speaker segments are
//! reconciled with the utterance log.  When diarization fails, times out or
//! returns something unrecognizable, a clearly flagged heuristic fallback
//! keeps the transcript usable.
//!
//! # Components
//!
//! | Module       | Responsibility                                          |
//! |--------------|---------------------------------------------------------|
//! | [`capture`]  | recognition events → utterance log (state machine)      |
//! | [`audio`]    | microphone capture, accumulation, canonical PCM encode  |
//! | [`diarize`]  | service client, segment/utterance alignment, colors     |
//! | [`pipeline`] | orchestration and shared state for a front-end          |
//! | [`config`]   | settings, TOML persistence, platform paths              |
//!
//! # Quick start
//!
//! ```rust
//! use meeting_scribe::capture::{CaptureSession, RecognitionEvent, TranscriptFragment};
//! use meeting_scribe::diarize::{align, color_for_label, DiarizationSegment};
//!
//! // 1. Capture: recognition events build the utterance log.
//! let mut session = CaptureSession::new();
//! session.start();
//! session.handle_event(&RecognitionEvent::new(vec![
//!     TranscriptFragment::final_text("good morning everyone"),
//! ]));
//! session.stop();
//!
//! // 2. Align: reconcile diarization segments with the log.
//! let segments = vec![DiarizationSegment::new(0.0, 2.5, "SPEAKER_0")];
//! let results = align(session.utterances(), &Ok(segments));
//!
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].speaker_label, "Speaker 1");
//!
//! // 3. Label: stable display color per speaker.
//! let _rgb = color_for_label(&results[0].speaker_label);
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod diarize;
pub mod pipeline;

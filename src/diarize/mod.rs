//! Speaker diarization — service client, alignment engine, display colors.
//!
//! This module covers everything between "the recording stopped" and "each
//! transcript line carries a speaker label":
//!
//! * [`Diarizer`] / [`ApiDiarizer`] — the external-service boundary (20 s
//!   bound, cooperative cancellation, single-flight guard).
//! * [`extract_segments`] — tolerant parsing of the relay's response shapes.
//! * [`align`] — reconciles segments with the utterance log; degraded
//!   fallback when no usable segments exist.
//! * [`color_for_label`] — stable speaker display colors.
//!
//! # Quick start
//!
//! ```rust
//! use meeting_scribe::capture::Utterance;
//! use meeting_scribe::diarize::{align, DiarizationSegment};
//!
//! let log = vec![Utterance {
//!     id: 0,
//!     text: "hello".into(),
//!     offset_secs: 0.4,
//!     is_final: true,
//! }];
//! let segments = vec![DiarizationSegment::new(0.0, 2.0, "SPEAKER_0")];
//!
//! let results = align(&log, &Ok(segments));
//! assert_eq!(results[0].speaker_label, "Speaker 1");
//! assert!(!results[0].degraded);
//! ```

pub mod align;
pub mod client;
pub mod label;
pub mod response;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use align::{
    align, AlignedResult, DEGRADED_CONFIDENCE, MATCHED_CONFIDENCE, NOMINAL_UTTERANCE_SECS,
    SECONDARY_MATCH_WINDOW_SECS,
};
pub use client::{
    ApiDiarizer, CancelToken, DiarizationError, Diarizer, LocalDiarizationSummary, SpeakerHints,
};
pub use label::{color_for_label, color_for_ordinal, ordinal_from_label, Rgb, SPEAKER_COLORS};
pub use response::{extract_segments, DiarizationSegment};

// test-only re-export so the pipeline test module can import the mock
// without `use meeting_scribe::diarize::client::MockDiarizer`.
#[cfg(test)]
pub use client::MockDiarizer;

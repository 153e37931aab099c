//! Continuous speech capture — recognition events → time-stamped utterance log.
//!
//! # Architecture
//!
//! ```text
//! platform recognizer (external)
//!        │  RecognizerSignal (mpsc)
//!        ▼
//! PipelineOrchestrator ──▶ CaptureSession
//!        │                    ├─ Results  → append Utterance / update preview
//!        │                    ├─ Error    → ErrorDisposition
//!        │                    └─ Ended    → restart (if should_restart())
//!        └─▶ RecognitionSource::start()   ← transient-error restarts
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use meeting_scribe::capture::{CaptureSession, RecognitionEvent, TranscriptFragment};
//!
//! let mut session = CaptureSession::new();
//! session.start();
//! session.handle_event(&RecognitionEvent::new(vec![
//!     TranscriptFragment::final_text("hello there"),
//! ]));
//! session.stop();
//!
//! assert_eq!(session.utterances().len(), 1);
//! assert_eq!(session.utterances()[0].text, "hello there");
//! ```

pub mod event;
pub mod session;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use event::{
    RecognitionError, RecognitionEvent, RecognitionSource, RecognizerSignal, TranscriptFragment,
};
pub use session::{CaptureSession, ErrorDisposition, SessionState, Utterance};

// test-only re-export so the pipeline test module can import the mock
// without `use meeting_scribe::capture::event::MockRecognitionSource`.
#[cfg(test)]
pub use event::MockRecognitionSource;

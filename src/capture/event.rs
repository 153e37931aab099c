//! Recognition event types and the [`RecognitionSource`] boundary.
//!
//! Continuous speech recognition is an external collaborator: some platform
//! recognizer delivers a stream of result events, error events, and
//! end-of-stream notifications.  This module defines the wire-neutral types
//! the rest of the crate consumes and the object-safe trait the pipeline
//! uses to (re)start and stop the underlying stream.
//!
//! Signals travel over a `tokio::sync::mpsc` channel so the orchestrator
//! handles them one at a time — recognition handlers never overlap for the
//! same session.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TranscriptFragment / RecognitionEvent
// ---------------------------------------------------------------------------

/// A single recognized result fragment inside one recognition event.
///
/// A fragment is either *final* (the recognizer has committed to this text)
/// or *interim* (a live, still-changing hypothesis).
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptFragment {
    /// Recognized text as delivered by the recognizer (untrimmed).
    pub text: String,
    /// `true` when the recognizer has finalized this fragment.
    pub is_final: bool,
}

impl TranscriptFragment {
    /// Convenience constructor for a finalized fragment.
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    /// Convenience constructor for an interim hypothesis.
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// One delivered recognition event: zero or more result fragments.
///
/// Recognizers may batch several fragments (final and interim mixed) into a
/// single event; [`crate::capture::CaptureSession::handle_event`] processes
/// them in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionEvent {
    pub fragments: Vec<TranscriptFragment>,
}

impl RecognitionEvent {
    pub fn new(fragments: Vec<TranscriptFragment>) -> Self {
        Self { fragments }
    }
}

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// Errors delivered by the recognition stream.
///
/// | Variant            | Class     | Session behaviour                     |
/// |--------------------|-----------|---------------------------------------|
/// | `PermissionDenied` | fatal     | aborts the session, surfaced          |
/// | `NoSpeech`         | transient | silent stream restart                 |
/// | `StreamEnded`      | transient | silent stream restart                 |
/// | `Unknown`          | benign    | logged, session continues             |
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecognitionError {
    /// Microphone / recognition permission was denied by the platform.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// The recognizer gave up because it heard no speech.
    #[error("no speech detected")]
    NoSpeech,

    /// The underlying stream ended while a session was still listening.
    #[error("recognition stream ended unexpectedly")]
    StreamEnded,

    /// Any other recognizer-reported error.
    #[error("recognition error: {0}")]
    Unknown(String),
}

// ---------------------------------------------------------------------------
// RecognizerSignal
// ---------------------------------------------------------------------------

/// Everything a recognition stream can deliver to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerSignal {
    /// A batch of result fragments.
    Results(RecognitionEvent),
    /// A recognizer error (see [`RecognitionError`] for the taxonomy).
    Error(RecognitionError),
    /// The stream ended on its own (treated like [`RecognitionError::StreamEnded`]
    /// while the session is listening).
    Ended,
}

// ---------------------------------------------------------------------------
// RecognitionSource trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe handle to the underlying recognition stream.
///
/// Implementations must be `Send + Sync` so the pipeline can hold them
/// behind an `Arc<dyn RecognitionSource>`.
///
/// # Contract
///
/// - `start` (re)starts the continuous stream; it is called once when a
///   session begins and again after every transient error or stream end.
///   It must be safe to call on an already-running stream.
/// - `stop` stops delivery; further signals after `stop` are permitted (the
///   session ignores them) but discouraged.
#[async_trait]
pub trait RecognitionSource: Send + Sync {
    /// (Re)start the continuous recognition stream.
    async fn start(&self) -> Result<(), RecognitionError>;

    /// Stop the stream.
    async fn stop(&self);
}

// Compile-time assertion: Box<dyn RecognitionSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RecognitionSource>) {}
};

// ---------------------------------------------------------------------------
// MockRecognitionSource (test only)
// ---------------------------------------------------------------------------

/// Counting stub used by the pipeline tests — records how often the stream
/// was (re)started and stopped, and can be told to fail `start`.
#[cfg(test)]
pub struct MockRecognitionSource {
    pub starts: std::sync::atomic::AtomicUsize,
    pub stops: std::sync::atomic::AtomicUsize,
    fail_with: Option<RecognitionError>,
}

#[cfg(test)]
impl MockRecognitionSource {
    pub fn ok() -> Self {
        Self {
            starts: std::sync::atomic::AtomicUsize::new(0),
            stops: std::sync::atomic::AtomicUsize::new(0),
            fail_with: None,
        }
    }

    pub fn failing(err: RecognitionError) -> Self {
        Self {
            starts: std::sync::atomic::AtomicUsize::new(0),
            stops: std::sync::atomic::AtomicUsize::new(0),
            fail_with: Some(err),
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl RecognitionSource for MockRecognitionSource {
    async fn start(&self) -> Result<(), RecognitionError> {
        self.starts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_constructors_set_finality() {
        assert!(TranscriptFragment::final_text("hello").is_final);
        assert!(!TranscriptFragment::interim("hel…").is_final);
    }

    #[test]
    fn default_event_is_empty() {
        assert!(RecognitionEvent::default().fragments.is_empty());
    }

    #[tokio::test]
    async fn mock_source_counts_starts_and_stops() {
        let source = MockRecognitionSource::ok();
        source.start().await.unwrap();
        source.start().await.unwrap();
        source.stop().await;

        assert_eq!(source.start_count(), 2);
        assert_eq!(source.stop_count(), 1);
    }

    #[tokio::test]
    async fn mock_source_can_fail_start() {
        let source = MockRecognitionSource::failing(RecognitionError::PermissionDenied);
        assert_eq!(
            source.start().await,
            Err(RecognitionError::PermissionDenied)
        );
    }
}

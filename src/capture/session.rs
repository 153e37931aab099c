//! Continuous-capture session state machine.
//!
//! [`CaptureSession`] turns the stream of recognition events into a stable,
//! time-stamped utterance log.  It is a plain synchronous state machine —
//! the pipeline orchestrator drives it from its event loop and performs the
//! actual stream restarts the session requests via [`ErrorDisposition`].
//!
//! # State machine
//!
//! ```text
//! Idle ──start()──▶ Listening ──stop()──▶ Stopped   (terminal)
//!                       │ ▲
//!   transient error ────┘ └── restart (internal, never observable)
//!
//! PermissionDenied: Listening ──▶ Stopped  (fatal, surfaced)
//! ```
//!
//! A restart requested from an error handler can race an externally issued
//! `stop()`; the driver must call [`CaptureSession::should_restart`]
//! immediately before re-issuing the restart so a stream is never revived
//! on a stopped session.

use std::time::Instant;

use crate::capture::event::{RecognitionError, RecognitionEvent};

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

/// One finalized unit of recognized speech.
///
/// Created exactly once per final recognition fragment and immutable
/// thereafter.  `offset_secs` is relative to the session start; offsets are
/// monotonically non-decreasing in creation order but not necessarily
/// strictly increasing (two finals in one event share a timestamp).
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Session-unique identifier (monotonic counter, reset on `start()`).
    pub id: u64,
    /// Trimmed, non-empty recognized text.
    pub text: String,
    /// Seconds since the session started.
    pub offset_secs: f64,
    /// Always `true` — interim hypotheses never become utterances.
    pub is_final: bool,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of a capture session.  `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet recording.
    Idle,
    /// Actively receiving recognition events.
    Listening,
    /// Terminal — no further utterances may be appended.
    Stopped,
}

impl SessionState {
    /// A short human-readable label suitable for display.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Listening => "Listening",
            SessionState::Stopped => "Stopped",
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorDisposition
// ---------------------------------------------------------------------------

/// What the driver should do after feeding an error to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Transient — restart the recognition stream (after re-checking
    /// [`CaptureSession::should_restart`]).
    Restart,
    /// Fatal — the session has been aborted; surface the error to the user.
    Fatal,
    /// Logged; no action required.
    Ignore,
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// Owns the utterance log for one recording session.
///
/// The session is an explicit object — no ambient flags, no globals.  The
/// pipeline creates a fresh `CaptureSession` for every recording so the
/// `Stopped` state stays terminal.
#[derive(Debug)]
pub struct CaptureSession {
    state: SessionState,
    started_at: Option<Instant>,
    next_id: u64,
    utterances: Vec<Utterance>,
    /// Transient interim hypothesis; never persisted as an utterance.
    live_preview: Option<String>,
}

impl CaptureSession {
    /// Create a session in `Idle`.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            started_at: None,
            next_id: 0,
            utterances: Vec::new(),
            live_preview: None,
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// `Idle → Listening`: atomically reset the utterance log, the id
    /// counter, and the live preview, and record the session start used for
    /// all subsequent offsets.  A logged no-op from any other state.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub(crate) fn start_at(&mut self, now: Instant) {
        if self.state != SessionState::Idle {
            log::warn!(
                "capture: start() ignored in state {}",
                self.state.label()
            );
            return;
        }

        self.utterances.clear();
        self.next_id = 0;
        self.live_preview = None;
        self.started_at = Some(now);
        self.state = SessionState::Listening;
        log::debug!("capture: Idle → Listening");
    }

    /// `any → Stopped` (terminal).  Clears the live preview; once stopped
    /// no utterance is ever appended again and pending restarts are
    /// suppressed via [`should_restart`](Self::should_restart).
    pub fn stop(&mut self) {
        if self.state != SessionState::Stopped {
            log::debug!("capture: {} → Stopped", self.state.label());
        }
        self.state = SessionState::Stopped;
        self.live_preview = None;
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    /// Process one recognition event.
    ///
    /// For each final fragment, appends exactly one [`Utterance`] with
    /// `offset = now − session_start` and the fragment's trimmed text —
    /// duplicate finals in the same event each produce a distinct utterance.
    /// Interim fragments update the single transient live preview, which is
    /// cleared whenever a final fragment arrives.  Events delivered outside
    /// `Listening` are ignored.
    pub fn handle_event(&mut self, event: &RecognitionEvent) {
        self.handle_event_at(event, Instant::now());
    }

    pub(crate) fn handle_event_at(&mut self, event: &RecognitionEvent, now: Instant) {
        if self.state != SessionState::Listening {
            log::debug!(
                "capture: event ignored in state {}",
                self.state.label()
            );
            return;
        }

        let offset_secs = self.offset_at(now);
        let mut interim = String::new();
        let mut saw_final = false;

        for fragment in &event.fragments {
            if fragment.is_final {
                let text = fragment.text.trim();
                if text.is_empty() {
                    // Utterance text is non-empty by contract.
                    log::debug!("capture: dropping whitespace-only final fragment");
                    continue;
                }
                let utterance = Utterance {
                    id: self.next_id,
                    text: text.to_string(),
                    offset_secs,
                    is_final: true,
                };
                self.next_id += 1;
                log::debug!(
                    "capture: utterance #{} at {:.2}s ({} chars)",
                    utterance.id,
                    utterance.offset_secs,
                    utterance.text.len()
                );
                self.utterances.push(utterance);
                saw_final = true;
            } else {
                interim.push_str(&fragment.text);
            }
        }

        if saw_final {
            self.live_preview = None;
        } else if !interim.is_empty() {
            self.live_preview = Some(interim);
        }
    }

    // -----------------------------------------------------------------------
    // Error handling
    // -----------------------------------------------------------------------

    /// Feed a recognizer error through the session's error policy.
    ///
    /// - `PermissionDenied` is fatal: the session aborts (`Listening →
    ///   Stopped`) and the caller must surface the failure.
    /// - `NoSpeech` / `StreamEnded` while listening are transient: the
    ///   caller restarts the stream; state is unchanged and nothing is
    ///   surfaced.
    /// - Everything else is logged and the session continues unchanged.
    pub fn on_error(&mut self, err: &RecognitionError) -> ErrorDisposition {
        match err {
            RecognitionError::PermissionDenied => {
                log::error!("capture: fatal recognition error: {err}");
                self.stop();
                ErrorDisposition::Fatal
            }
            RecognitionError::NoSpeech | RecognitionError::StreamEnded => {
                if self.state == SessionState::Listening {
                    log::debug!("capture: transient recognition error ({err}), restarting");
                    ErrorDisposition::Restart
                } else {
                    ErrorDisposition::Ignore
                }
            }
            RecognitionError::Unknown(_) => {
                log::warn!("capture: recognition error ignored: {err}");
                ErrorDisposition::Ignore
            }
        }
    }

    /// `true` while a restart may be issued.  The driver must call this
    /// immediately before re-starting the stream so a restart raced by
    /// `stop()` is suppressed.
    pub fn should_restart(&self) -> bool {
        self.state == SessionState::Listening
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SessionState::Stopped
    }

    /// The utterance log, in creation order.  Read-only: the session owns
    /// the log for its whole lifetime.
    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    /// The current interim hypothesis, if any.
    pub fn live_preview(&self) -> Option<&str> {
        self.live_preview.as_deref()
    }

    /// Seconds since `start()`, or `0.0` before the session started.
    pub fn elapsed_secs(&self) -> f64 {
        self.offset_at(Instant::now())
    }

    fn offset_at(&self, now: Instant) -> f64 {
        match self.started_at {
            Some(t0) => now.saturating_duration_since(t0).as_secs_f64(),
            None => 0.0,
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Pipeline state machine and shared application state.
//!
//! [`RecorderPhase`] tracks where the recording pipeline is; a front-end
//! reads it via [`SharedState`] to render the appropriate view.
//!
//! [`AppState`] is the single source of truth for everything a front-end
//! needs: current phase, live transcript preview, the attributed result
//! list, a config snapshot, and any error message.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>` — cheap to
//! clone and safe to share across threads.

use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::diarize::AlignedResult;

// ---------------------------------------------------------------------------
// RecorderPhase
// ---------------------------------------------------------------------------

/// Phases of the recording pipeline.
///
/// The phase transitions are:
///
/// ```text
/// Idle ──Start──▶ Recording ──Stop──▶ Diarizing ──align done──▶ Complete
/// Recording ──permission denied──▶ Error
/// Complete / Error ──Start──▶ Recording   (fresh session)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    /// Waiting for a recording to start.
    Idle,

    /// Capture session is listening; audio and utterances accumulate.
    Recording,

    /// Recording stopped; audio is being encoded and the diarization call
    /// is in flight (or falling back to the degraded path).
    Diarizing,

    /// The attributed result list is ready.
    Complete,

    /// The session was aborted by an unrecoverable capture error.
    Error,
}

impl RecorderPhase {
    /// Returns `true` while the pipeline is actively recording or
    /// attributing speakers.
    pub fn is_busy(&self) -> bool {
        matches!(self, RecorderPhase::Recording | RecorderPhase::Diarizing)
    }

    /// A short human-readable label suitable for display in a status bar.
    pub fn label(&self) -> &'static str {
        match self {
            RecorderPhase::Idle => "Idle",
            RecorderPhase::Recording => "Recording",
            RecorderPhase::Diarizing => "Attributing speakers",
            RecorderPhase::Complete => "Done",
            RecorderPhase::Error => "Error",
        }
    }
}

impl Default for RecorderPhase {
    fn default() -> Self {
        RecorderPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state — the single source of truth for a front-end.
///
/// Held behind [`SharedState`].  The pipeline orchestrator mutates it; the
/// presentation layer reads it.
pub struct AppState {
    /// Current phase of the recording pipeline.
    pub phase: RecorderPhase,

    /// The transient interim hypothesis while recording, if any.
    pub live_preview: Option<String>,

    /// Number of finalized utterances so far in the current session.
    pub utterance_count: usize,

    /// The attributed transcript.  Replaced wholesale when alignment
    /// completes — never updated incrementally.
    pub results: Vec<AlignedResult>,

    /// Current application configuration snapshot.
    pub config: AppConfig,

    /// Error message to display when `phase == RecorderPhase::Error`.
    pub error_message: Option<String>,

    /// Duration of the current recording in seconds.
    pub recording_secs: f32,
}

impl AppState {
    /// Create a new `AppState` with sensible defaults.
    pub fn new(config: AppConfig) -> Self {
        Self {
            phase: RecorderPhase::Idle,
            live_preview: None,
            utterance_count: 0,
            results: Vec::new(),
            config,
            error_message: None,
            recording_secs: 0.0,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Cheap to clone (`Arc` clone).  Lock with `.lock().unwrap()` for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

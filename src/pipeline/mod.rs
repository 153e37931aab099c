//! Pipeline orchestration — record → encode → diarize → align.
//!
//! This module wires the capture session, the audio buffer, the encoder and
//! the diarization client together and exposes the shared state a front-end
//! reads.
//!
//! # Architecture
//!
//! ```text
//! PipelineCommand (mpsc)      RecognizerSignal (mpsc)   AudioChunk (mpsc)
//!        │                            │                        │
//!        └──────────────┬─────────────┴────────────────────────┘
//!                       ▼
//!         PipelineOrchestrator::run()  ← async tokio task
//!                       │
//!                       ├─ Start → fresh CaptureSession + clear SampleBuffer
//!                       ├─ Results/Error/Ended → session state machine
//!                       └─ Stop
//!                            ├─ spawn_blocking(encode)
//!                            ├─ Diarizer::diarize (cancellable, 20 s bound)
//!                            └─ align → SharedState.results (atomic swap)
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── read by the presentation layer
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{PipelineCommand, PipelineOrchestrator};
pub use state::{new_shared_state, AppState, RecorderPhase, SharedState};

//! Pipeline orchestrator — drives the capture → encode → diarize → align loop.
//!
//! [`PipelineOrchestrator`] owns the explicit session object and responds
//! to [`PipelineCommand`]s, recognizer signals and audio chunks received
//! over `tokio::sync::mpsc` channels.
//!
//! # Pipeline flow
//!
//! ```text
//! PipelineCommand::Start
//!   └─▶ fresh CaptureSession, clear SampleBuffer, RecognitionSource::start
//!
//! RecognizerSignal::Results   → session.handle_event (utterances / preview)
//! RecognizerSignal::Error     → ErrorDisposition
//!       ├─ Restart → re-check should_restart(), then source.start()
//!       ├─ Fatal   → phase = Error, surfaced
//!       └─ Ignore  → logged
//! RecognizerSignal::Ended     → restart while still listening
//!
//! PipelineCommand::Stop
//!   └─▶ session.stop, source.stop
//!         ├─ spawn_blocking(encode)                    [Diarizing]
//!         ├─ diarizer.diarize (20 s bound, cancellable)
//!         └─ align → publish results atomically        [Complete]
//! ```
//!
//! Recognition signals are handled one at a time by this single loop, so
//! event handlers never overlap for the same session.  The only suspending
//! boundary is the diarization call; a failed, timed-out or cancelled call
//! falls straight through to the degraded alignment path — exactly once,
//! never retried.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::{encode, AudioChunk, PcmAudio, SampleBuffer};
use crate::capture::{
    CaptureSession, ErrorDisposition, RecognitionError, RecognitionSource, RecognizerSignal,
};
use crate::config::AppConfig;
use crate::diarize::{align, CancelToken, DiarizationError, Diarizer};

use super::state::{RecorderPhase, SharedState};

// ---------------------------------------------------------------------------
// PipelineCommand
// ---------------------------------------------------------------------------

/// Externally issued pipeline commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    /// Begin a new recording session (clears the previous transcript and
    /// result list).
    Start,
    /// Stop recording and run speaker attribution.
    Stop,
    /// Cancel an in-flight diarization call; alignment proceeds on the
    /// degraded path.
    CancelDiarization,
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the complete record-and-attribute pipeline.
///
/// Create with [`PipelineOrchestrator::new`], then call
/// [`run`](Self::run) inside a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use meeting_scribe::config::AppConfig;
/// use meeting_scribe::pipeline::{new_shared_state, PipelineCommand, PipelineOrchestrator};
///
/// # async fn example() {
/// # use meeting_scribe::capture::RecognitionSource;
/// # use meeting_scribe::diarize::{ApiDiarizer, Diarizer};
/// # fn make_source() -> Arc<dyn RecognitionSource> { unimplemented!() }
/// let config = AppConfig::default();
/// let shared_state = new_shared_state(config.clone());
/// let diarizer: Arc<dyn Diarizer> = Arc::new(ApiDiarizer::from_config(&config.diarization));
///
/// let (command_tx, command_rx) = tokio::sync::mpsc::channel(16);
/// let (_signal_tx, signal_rx) = tokio::sync::mpsc::channel(64);
/// let (_chunk_tx, chunk_rx) = tokio::sync::mpsc::unbounded_channel();
///
/// let orchestrator =
///     PipelineOrchestrator::new(shared_state, config, make_source(), diarizer);
/// tokio::spawn(async move { orchestrator.run(command_rx, signal_rx, chunk_rx).await });
///
/// command_tx.send(PipelineCommand::Start).await.unwrap();
/// # }
/// ```
pub struct PipelineOrchestrator {
    state: SharedState,
    config: AppConfig,
    source: Arc<dyn RecognitionSource>,
    diarizer: Arc<dyn Diarizer>,
    session: CaptureSession,
    audio: SampleBuffer,
    cancel: CancelToken,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`    — shared application state (also read by a front-end).
    /// * `config`   — settings snapshot for this pipeline instance.
    /// * `source`   — handle to the platform recognition stream.
    /// * `diarizer` — diarization backend (e.g. `ApiDiarizer`).
    pub fn new(
        state: SharedState,
        config: AppConfig,
        source: Arc<dyn RecognitionSource>,
        diarizer: Arc<dyn Diarizer>,
    ) -> Self {
        let audio = SampleBuffer::new(config.audio.max_recording_secs);
        Self {
            state,
            config,
            source,
            diarizer,
            session: CaptureSession::new(),
            audio,
            cancel: CancelToken::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the orchestrator until the command channel is closed.
    ///
    /// Pending recognizer signals and audio chunks are drained before the
    /// next command so a `Stop` never races past results that were already
    /// delivered.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<PipelineCommand>,
        mut signals: mpsc::Receiver<RecognizerSignal>,
        mut chunks: mpsc::UnboundedReceiver<AudioChunk>,
    ) {
        loop {
            tokio::select! {
                biased;

                Some(signal) = signals.recv() => {
                    self.handle_signal(signal).await;
                }
                Some(chunk) = chunks.recv() => {
                    self.handle_chunk(&chunk);
                }
                command = commands.recv() => {
                    match command {
                        Some(PipelineCommand::Start) => self.handle_start().await,
                        Some(PipelineCommand::Stop) => self.handle_stop().await,
                        Some(PipelineCommand::CancelDiarization) => self.cancel.cancel(),
                        None => break,
                    }
                }
            }
        }

        log::info!("pipeline: command channel closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    /// Begin a new recording: fresh session object (the previous one's
    /// `Stopped` state is terminal), cleared audio buffer, cleared results.
    async fn handle_start(&mut self) {
        log::debug!("pipeline: Start → Recording");

        self.session = CaptureSession::new();
        self.session.start();
        self.audio.clear();
        self.cancel = CancelToken::new();

        {
            let mut st = self.state.lock().unwrap();
            st.phase = RecorderPhase::Recording;
            st.results.clear();
            st.live_preview = None;
            st.utterance_count = 0;
            st.error_message = None;
            st.recording_secs = 0.0;
        }

        if let Err(err) = self.source.start().await {
            self.dispose_error(err);
        }
    }

    /// Stop recording and run the attribution stage.
    async fn handle_stop(&mut self) {
        if !self.session.is_listening() {
            log::debug!("pipeline: Stop ignored — no active recording");
            return;
        }

        log::debug!("pipeline: Stop → Diarizing");
        self.session.stop();
        self.source.stop().await;
        self.set_phase(RecorderPhase::Diarizing);

        // ── 1. Encode captured audio (blocking → thread pool) ───────────
        let captured = self.audio.take_captured();
        let target = self.config.audio.encode_target();

        let pcm = match tokio::task::spawn_blocking(move || encode(&captured, &target)).await {
            Ok(pcm) => pcm,
            Err(err) => {
                // Encoding must never sink the pipeline; continue with an
                // empty passthrough container.
                log::warn!("pipeline: encode task panicked: {err}");
                PcmAudio::Passthrough { bytes: Vec::new() }
            }
        };

        log::debug!(
            "pipeline: encoded {} bytes ({})",
            pcm.len(),
            if pcm.is_canonical() { "canonical" } else { "passthrough" }
        );

        // ── 2. Single diarization attempt (cancellable, never retried) ──
        let outcome = self
            .diarizer
            .diarize(
                &pcm,
                self.session.utterances(),
                self.config.diarization.hints(),
                &self.cancel,
            )
            .await;

        if let Err(DiarizationError::Busy) = &outcome {
            // Unreachable from this single loop, but the guard contract
            // says a busy call is a no-op — log it distinctly.
            log::warn!("pipeline: duplicate diarization call dropped");
        }

        // ── 3. Align and publish atomically ──────────────────────────────
        let results = align(self.session.utterances(), &outcome);
        let degraded = results.iter().any(|r| r.degraded);

        {
            let mut st = self.state.lock().unwrap();
            st.results = results;
            st.live_preview = None;
            st.phase = RecorderPhase::Complete;
        }

        log::info!(
            "pipeline: attribution complete ({} entries{})",
            self.session.utterances().len().max(1),
            if degraded { ", degraded" } else { "" }
        );
    }

    // -----------------------------------------------------------------------
    // Signal handlers
    // -----------------------------------------------------------------------

    async fn handle_signal(&mut self, signal: RecognizerSignal) {
        match signal {
            RecognizerSignal::Results(event) => {
                self.session.handle_event(&event);
                let mut st = self.state.lock().unwrap();
                st.live_preview = self.session.live_preview().map(str::to_string);
                st.utterance_count = self.session.utterances().len();
            }
            RecognizerSignal::Error(err) => {
                let disposition = self.session.on_error(&err);
                match disposition {
                    ErrorDisposition::Restart => self.try_restart().await,
                    ErrorDisposition::Fatal => self.surface_fatal(&err),
                    ErrorDisposition::Ignore => {}
                }
            }
            RecognizerSignal::Ended => {
                // Stream end while still listening is a transient condition.
                self.try_restart().await;
            }
        }
    }

    fn handle_chunk(&mut self, chunk: &AudioChunk) {
        if !self.session.is_listening() {
            return;
        }
        self.audio.push_chunk(chunk);
        let mut st = self.state.lock().unwrap();
        st.recording_secs = self.audio.duration_secs();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Restart the recognition stream — but only after re-checking that the
    /// session is still listening.  A `stop()` that landed between the
    /// error and this point wins the race and the restart is suppressed.
    async fn try_restart(&mut self) {
        if !self.session.should_restart() {
            log::debug!("pipeline: restart suppressed — session no longer listening");
            return;
        }

        log::debug!("pipeline: restarting recognition stream");
        if let Err(err) = self.source.start().await {
            self.dispose_error(err);
        }
    }

    /// Route a start/restart failure through the session's error policy.
    fn dispose_error(&mut self, err: RecognitionError) {
        match self.session.on_error(&err) {
            ErrorDisposition::Fatal => self.surface_fatal(&err),
            ErrorDisposition::Restart => {
                // A restart that failed transiently will be retried on the
                // recognizer's next Ended/Error signal.
                log::warn!("pipeline: stream restart failed transiently: {err}");
            }
            ErrorDisposition::Ignore => {}
        }
    }

    fn surface_fatal(&mut self, err: &RecognitionError) {
        let mut st = self.state.lock().unwrap();
        st.phase = RecorderPhase::Error;
        st.error_message = Some(err.to_string());
        st.live_preview = None;
        log::error!("pipeline: session aborted: {err}");
    }

    fn set_phase(&self, phase: RecorderPhase) {
        let mut st = self.state.lock().unwrap();
        st.phase = phase;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Diarization service boundary.
//!
//! [`Diarizer`] is the async trait the pipeline depends on; [`ApiDiarizer`]
//! is the production implementation that posts the recording to the local
//! relay service.  All connection details come from
//! [`DiarizationConfig`]; nothing is hardcoded.
//!
//! # Contract
//!
//! - the call carries a 20-second bound (configurable) and is cancellable
//!   before the bound elapses via [`CancelToken`]; cancellation and timeout
//!   are both plain service errors;
//! - at most one call may be outstanding per recording session — a second
//!   invocation while one is pending returns [`DiarizationError::Busy`]
//!   and performs no request (no queueing, no parallel retry);
//! - nothing here retries: a failed call routes straight into the degraded
//!   alignment path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;

use crate::audio::PcmAudio;
use crate::capture::Utterance;
use crate::config::DiarizationConfig;
use crate::diarize::response::{extract_segments, DiarizationSegment};

// ---------------------------------------------------------------------------
// DiarizationError
// ---------------------------------------------------------------------------

/// Errors from the diarization boundary.
///
/// Every variant is absorbed by the alignment engine's degraded path —
/// none propagates as a hard failure of the overall pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DiarizationError {
    /// The request did not complete within the configured bound.
    #[error("diarization request timed out")]
    Timeout,

    /// The caller cancelled the request before the bound elapsed.
    #[error("diarization request cancelled")]
    Cancelled,

    /// HTTP transport failure or non-success status.
    #[error("diarization transport error: {0}")]
    Transport(String),

    /// The response body had no recognizable segment list.
    #[error("diarization response shape not recognized")]
    MalformedResponse,

    /// A call is already in flight for this session; the new one was a
    /// no-op.  Callers log and drop this — it must not trigger the
    /// degraded path while the first call is still pending.
    #[error("a diarization request is already in flight")]
    Busy,
}

impl From<reqwest::Error> for DiarizationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DiarizationError::Timeout
        } else {
            DiarizationError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation handle for an in-flight diarization call.
///
/// Cheap to clone; `cancel()` wakes every task awaiting
/// [`CancelToken::cancelled`].  Once cancelled, a token stays cancelled.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.  Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register for the wakeup before checking the flag so a cancel
            // landing in between cannot be missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// SpeakerHints
// ---------------------------------------------------------------------------

/// Recognition-time hints forwarded to the diarization model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeakerHints {
    pub min_speakers: u32,
    pub max_speakers: u32,
}

impl Default for SpeakerHints {
    fn default() -> Self {
        Self {
            min_speakers: 1,
            max_speakers: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Diarizer trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a diarization backend.
///
/// Implementations must be `Send + Sync` so they can be shared as an
/// `Arc<dyn Diarizer>`.
#[async_trait]
pub trait Diarizer: Send + Sync {
    /// Submit one recording for speaker separation.
    ///
    /// Returns the ordered segment list, or the error that made the result
    /// unavailable; the caller feeds either outcome to the alignment
    /// engine.
    async fn diarize(
        &self,
        audio: &PcmAudio,
        transcript: &[Utterance],
        hints: SpeakerHints,
        cancel: &CancelToken,
    ) -> Result<Vec<DiarizationSegment>, DiarizationError>;
}

// Compile-time assertion: Box<dyn Diarizer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Diarizer>) {}
};

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DiarizationRequest<'a> {
    #[serde(rename = "audioData")]
    audio_data: String,
    #[serde(rename = "transcriptData")]
    transcript_data: Vec<TranscriptLine<'a>>,
    parameters: SpeakerHints,
}

#[derive(Serialize)]
struct TranscriptLine<'a> {
    id: u64,
    text: &'a str,
    timestamp: f64,
}

#[derive(Serialize)]
struct LocalRequest<'a> {
    audio: String,
    transcript: Vec<TranscriptLine<'a>>,
}

fn transcript_lines(transcript: &[Utterance]) -> Vec<TranscriptLine<'_>> {
    transcript
        .iter()
        .map(|u| TranscriptLine {
            id: u.id,
            text: &u.text,
            timestamp: u.offset_secs,
        })
        .collect()
}

/// Result of the alternate local-processing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDiarizationSummary {
    pub total_speakers: u32,
    pub total_segments: u32,
}

// ---------------------------------------------------------------------------
// ApiDiarizer
// ---------------------------------------------------------------------------

/// Production diarizer that talks to the local relay over HTTP.
pub struct ApiDiarizer {
    client: reqwest::Client,
    config: DiarizationConfig,
    /// Single-flight guard: `true` while a call is outstanding.
    in_flight: AtomicBool,
}

impl ApiDiarizer {
    /// Build an `ApiDiarizer` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request bound from
    /// `config.timeout_secs` (20 s by default).  A default client is used
    /// as a last-resort fallback if the builder fails (should never happen
    /// in practice).
    pub fn from_config(config: &DiarizationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Liveness probe against the relay's `/health` endpoint.
    ///
    /// Purely informational — no pipeline decision hangs off it.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                log::debug!("diarize: health probe failed: {err}");
                false
            }
        }
    }

    /// Alternate local-processing variant.
    ///
    /// Posts `{audio, transcript}` to the relay's local endpoint and
    /// returns the reported counts.  A non-`"success"` status — like any
    /// transport or shape failure — is an error the caller routes into the
    /// same degraded-path decision as the main call.
    pub async fn diarize_local(
        &self,
        audio: &PcmAudio,
        transcript: &[Utterance],
        cancel: &CancelToken,
    ) -> Result<LocalDiarizationSummary, DiarizationError> {
        let _guard = self.acquire_flight()?;

        let body = LocalRequest {
            audio: BASE64_STANDARD.encode(audio.bytes()),
            transcript: transcript_lines(transcript),
        };
        let url = format!("{}/api/local-speaker-diarization", self.config.base_url);

        let value = self.post_json(&url, &body, cancel).await?;

        let status = value.get("status").and_then(|v| v.as_str()).unwrap_or("");
        if status != "success" {
            return Err(DiarizationError::Transport(format!(
                "local diarization status: {}",
                if status.is_empty() { "<missing>" } else { status }
            )));
        }

        Ok(LocalDiarizationSummary {
            total_speakers: value
                .get("total_speakers")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            total_segments: value
                .get("total_segments")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn acquire_flight(&self) -> Result<FlightGuard<'_>, DiarizationError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("diarize: request already in flight, dropping new invocation");
            return Err(DiarizationError::Busy);
        }
        Ok(FlightGuard {
            flag: &self.in_flight,
        })
    }

    async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value, DiarizationError> {
        let request = self.client.post(url).json(body).send();

        let response = tokio::select! {
            // Cancellation takes priority over a simultaneously ready response.
            biased;
            _ = cancel.cancelled() => {
                log::debug!("diarize: request cancelled");
                return Err(DiarizationError::Cancelled);
            }
            result = request => result?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DiarizationError::Transport(format!("HTTP {status}")));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|_| DiarizationError::MalformedResponse)
    }
}

/// Resets the single-flight flag when a call completes on any path.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Diarizer for ApiDiarizer {
    async fn diarize(
        &self,
        audio: &PcmAudio,
        transcript: &[Utterance],
        hints: SpeakerHints,
        cancel: &CancelToken,
    ) -> Result<Vec<DiarizationSegment>, DiarizationError> {
        let _guard = self.acquire_flight()?;

        let body = DiarizationRequest {
            audio_data: BASE64_STANDARD.encode(audio.bytes()),
            transcript_data: transcript_lines(transcript),
            parameters: hints,
        };
        let url = format!("{}/api/speaker-diarization", self.config.base_url);

        log::debug!(
            "diarize: submitting {} bytes of audio, {} transcript lines",
            audio.len(),
            transcript.len()
        );

        let value = self.post_json(&url, &body, cancel).await?;
        extract_segments(&value).ok_or(DiarizationError::MalformedResponse)
    }
}

// ---------------------------------------------------------------------------
// MockDiarizer (test only)
// ---------------------------------------------------------------------------

/// Scripted diarizer for pipeline tests: returns a fixed outcome and counts
/// invocations.
#[cfg(test)]
pub struct MockDiarizer {
    outcome: Result<Vec<DiarizationSegment>, DiarizationError>,
    pub calls: AtomicBool,
}

#[cfg(test)]
impl MockDiarizer {
    pub fn ok(segments: Vec<DiarizationSegment>) -> Self {
        Self {
            outcome: Ok(segments),
            calls: AtomicBool::new(false),
        }
    }

    pub fn failing(err: DiarizationError) -> Self {
        Self {
            outcome: Err(err),
            calls: AtomicBool::new(false),
        }
    }

    pub fn was_called(&self) -> bool {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Diarizer for MockDiarizer {
    async fn diarize(
        &self,
        _audio: &PcmAudio,
        _transcript: &[Utterance],
        _hints: SpeakerHints,
        _cancel: &CancelToken,
    ) -> Result<Vec<DiarizationSegment>, DiarizationError> {
        self.calls.store(true, Ordering::SeqCst);
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DiarizationConfig {
        DiarizationConfig::default()
    }

    // ---- CancelToken -------------------------------------------------------

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        // Must not hang.
        token.cancelled().await;
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    // ---- Single-flight guard -----------------------------------------------

    #[test]
    fn second_acquire_returns_busy() {
        let diarizer = ApiDiarizer::from_config(&config());

        let first = diarizer.acquire_flight().expect("first acquire");
        assert_eq!(
            diarizer.acquire_flight().err(),
            Some(DiarizationError::Busy)
        );

        drop(first);
        assert!(diarizer.acquire_flight().is_ok());
    }

    // ---- Cancellation of an in-flight call ---------------------------------

    #[tokio::test]
    async fn pre_cancelled_call_returns_cancelled() {
        // Unroutable address — the select must hit the cancel arm first.
        let mut cfg = config();
        cfg.base_url = "http://192.0.2.1:9".into();
        let diarizer = ApiDiarizer::from_config(&cfg);

        let token = CancelToken::new();
        token.cancel();

        let audio = PcmAudio::Passthrough { bytes: vec![0u8] };
        let result = diarizer.diarize(&audio, &[], SpeakerHints::default(), &token).await;
        assert_eq!(result, Err(DiarizationError::Cancelled));
    }

    // ---- Error mapping -----------------------------------------------------

    #[test]
    fn default_hints_span_one_to_five_speakers() {
        let hints = SpeakerHints::default();
        assert_eq!(hints.min_speakers, 1);
        assert_eq!(hints.max_speakers, 5);
    }

    #[test]
    fn request_body_uses_relay_field_names() {
        let utterances = vec![Utterance {
            id: 7,
            text: "hello".into(),
            offset_secs: 1.25,
            is_final: true,
        }];
        let body = DiarizationRequest {
            audio_data: BASE64_STANDARD.encode(b"pcm"),
            transcript_data: transcript_lines(&utterances),
            parameters: SpeakerHints::default(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("audioData").is_some());
        let lines = json.get("transcriptData").unwrap().as_array().unwrap();
        assert_eq!(lines[0].get("id").unwrap().as_u64(), Some(7));
        assert_eq!(lines[0].get("text").unwrap().as_str(), Some("hello"));
        assert_eq!(lines[0].get("timestamp").unwrap().as_f64(), Some(1.25));
        assert_eq!(
            json.pointer("/parameters/min_speakers").unwrap().as_u64(),
            Some(1)
        );
        assert_eq!(
            json.pointer("/parameters/max_speakers").unwrap().as_u64(),
            Some(5)
        );
    }

    // ---- Mock behaviour ----------------------------------------------------

    #[tokio::test]
    async fn mock_diarizer_returns_scripted_outcome() {
        let segments = vec![DiarizationSegment::new(0.0, 1.0, "A")];
        let mock = MockDiarizer::ok(segments.clone());
        let audio = PcmAudio::Passthrough { bytes: vec![] };

        let result = mock
            .diarize(&audio, &[], SpeakerHints::default(), &CancelToken::new())
            .await;
        assert_eq!(result, Ok(segments));
        assert!(mock.was_called());
    }
}

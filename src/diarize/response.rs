//! Diarization response parsing.
//!
//! The relay service has gone through several backend models and each one
//! shaped its JSON differently.  Three container shapes are accepted —
//! `{"segments": [...]}`, `{"speaker_segments": [...]}` and a bare array —
//! and each segment element may use any of `start`/`start_time`/`begin`,
//! `end`/`end_time`/`finish` and `speaker`/`label` as field names.  All
//! aliases are probed before a response is declared unrecognized.

use serde_json::Value;

// ---------------------------------------------------------------------------
// DiarizationSegment
// ---------------------------------------------------------------------------

/// A time interval with an associated speaker tag, as produced by the
/// external voice-separation service.  Ordered by `start` in the list the
/// service returns; discarded after alignment, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DiarizationSegment {
    /// Segment start in seconds from the beginning of the recording.
    pub start: f64,
    /// Segment end in seconds (`end >= start` as received).
    pub end: f64,
    /// Raw speaker tag (e.g. `"SPEAKER_0"`); humanized during alignment.
    pub speaker: String,
}

impl DiarizationSegment {
    pub fn new(start: f64, end: f64, speaker: impl Into<String>) -> Self {
        Self {
            start,
            end,
            speaker: speaker.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// extract_segments
// ---------------------------------------------------------------------------

/// Probe a parsed response body for a segment list.
///
/// Returns `None` when none of the accepted container shapes is present —
/// the caller treats that as a malformed response and falls back to the
/// degraded alignment path.  An empty list is a recognized shape and comes
/// back as `Some(vec![])`.
pub fn extract_segments(body: &Value) -> Option<Vec<DiarizationSegment>> {
    let list = if let Some(segments) = body.get("segments").and_then(Value::as_array) {
        log::debug!("diarize: response uses `segments` shape");
        segments
    } else if let Some(segments) = body.get("speaker_segments").and_then(Value::as_array) {
        log::debug!("diarize: response uses `speaker_segments` shape");
        segments
    } else if let Some(segments) = body.as_array() {
        log::debug!("diarize: response is a bare segment array");
        segments
    } else {
        log::warn!("diarize: unrecognized response shape");
        return None;
    };

    let segments = list
        .iter()
        .enumerate()
        .filter_map(|(index, element)| parse_segment(element, index))
        .collect();

    Some(segments)
}

/// Parse one segment element, probing all field aliases.  Elements that are
/// not objects are skipped; missing numeric fields default to `0.0` and a
/// missing speaker tag gets a positional `SPEAKER_{index}` placeholder.
fn parse_segment(element: &Value, index: usize) -> Option<DiarizationSegment> {
    if !element.is_object() {
        log::debug!("diarize: skipping non-object segment element #{index}");
        return None;
    }

    let start = field_f64(element, &["start", "start_time", "begin"]).unwrap_or(0.0);
    let end = field_f64(element, &["end", "end_time", "finish"]).unwrap_or(0.0);
    let speaker = field_str(element, &["speaker", "label"])
        .map(str::to_string)
        .unwrap_or_else(|| format!("SPEAKER_{index}"));

    Some(DiarizationSegment {
        start,
        end,
        speaker,
    })
}

fn field_f64(element: &Value, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .find_map(|key| element.get(key).and_then(Value::as_f64))
}

fn field_str<'a>(element: &'a Value, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .find_map(|key| element.get(key).and_then(Value::as_str))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

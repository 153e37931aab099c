//! Alignment of diarization segments with the utterance log.
//!
//! [`align`] reconciles two independently timed views of the same
//! recording: the capture session's utterance log and the diarization
//! service's speaker segments.  It is pure and synchronous; identical
//! inputs always yield identical output.
//!
//! The caller **always** receives a complete, non-empty result list —
//! exactly one entry per utterance, or a single placeholder when the log is
//! empty.  Reduced confidence is communicated through the `degraded` flag,
//! never through an error.
//!
//! # Matching strategy
//!
//! Segments are processed greedily, first-fit, in the order the service
//! returned them; each segment claims at most one utterance:
//!
//! 1. *primary* — the first unclaimed utterance whose offset lies inside
//!    the segment's time span (claims it);
//! 2. *secondary* — the unclaimed utterance closest to the segment start
//!    and within [`SECONDARY_MATCH_WINDOW_SECS`] of it (claims it);
//! 3. *tertiary* — `utterances[segment_index % len]`, without claiming, so
//!    utterances may be reused when there are more segments than
//!    utterances.
//!
//! This greedy first-fit pass is a deliberate approximation, not a
//! globally optimal (min-cost bipartite) assignment, and when an offset
//! falls inside two overlapping segments whichever segment comes first in
//! the returned list wins.  Both behaviours are intentional; do not "fix"
//! them.
//!
//! The final list is then rebuilt one-entry-per-utterance in utterance
//! order: each utterance keeps the attribution of the first segment that
//! selected it, and utterances no segment selected receive a clearly
//! flagged heuristic entry instead of being dropped.

use crate::capture::Utterance;
use crate::diarize::client::DiarizationError;
use crate::diarize::response::DiarizationSegment;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Confidence assigned to segment-backed attributions.
pub const MATCHED_CONFIDENCE: f64 = 0.95;
/// Confidence assigned to heuristic (degraded) attributions.
pub const DEGRADED_CONFIDENCE: f64 = 0.5;
/// Secondary-match window: utterance offset must be within this many
/// seconds of the segment start.
pub const SECONDARY_MATCH_WINDOW_SECS: f64 = 1.0;
/// Nominal utterance duration used when no true segment span exists.
pub const NOMINAL_UTTERANCE_SECS: f64 = 3.0;

// ---------------------------------------------------------------------------
// AlignedResult
// ---------------------------------------------------------------------------

/// The final per-utterance record: text, timing, and an attributed speaker
/// label with a confidence and degraded flag.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedResult {
    /// Source utterance id, or a synthesized id for placeholder entries.
    pub id: String,
    /// Human-readable speaker label ("Speaker 1", "Speaker 2", …).
    pub speaker_label: String,
    /// Utterance text, or synthesized placeholder text.
    pub text: String,
    /// The utterance's recording-relative offset in seconds.
    pub offset_secs: f64,
    /// Attributed span start in seconds.
    pub start_time: f64,
    /// Attributed span end in seconds.
    pub end_time: f64,
    /// Attribution confidence in `[0, 1]`.
    pub confidence: f64,
    /// `true` when the label comes from the heuristic fallback rather than
    /// the diarization model.  Never dropped — downstream consumers rely on
    /// it to distinguish model-backed labels from simulation.
    pub degraded: bool,
}

// ---------------------------------------------------------------------------
// align
// ---------------------------------------------------------------------------

/// Produce the speaker-attributed result list for one recording.
///
/// `outcome` is the diarization call's result: an ordered segment list on
/// success, or the error that made it unavailable.  Service errors,
/// timeouts, cancellations, malformed responses and empty segment lists all
/// route to the degraded path — none of them propagates.
///
/// The returned list always has exactly `max(|utterances|, 1)` entries and
/// replaces any previous alignment output wholesale.
pub fn align(
    utterances: &[Utterance],
    outcome: &Result<Vec<DiarizationSegment>, DiarizationError>,
) -> Vec<AlignedResult> {
    match outcome {
        Ok(segments) if !segments.is_empty() => {
            let results = align_segments(utterances, segments);
            if results.is_empty() {
                log::warn!("align: segment pass produced nothing, using degraded path");
                align_degraded(utterances)
            } else {
                results
            }
        }
        Ok(_) => {
            log::warn!("align: empty segment list, using degraded path");
            align_degraded(utterances)
        }
        Err(err) => {
            log::warn!("align: diarization unavailable ({err}), using degraded path");
            align_degraded(utterances)
        }
    }
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

/// Attribution recorded when a segment selects an utterance.
struct Claim {
    label: String,
    start: f64,
    end: f64,
}

fn align_segments(
    utterances: &[Utterance],
    segments: &[DiarizationSegment],
) -> Vec<AlignedResult> {
    let mut numbering = SpeakerNumbering::new();

    if utterances.is_empty() {
        // No transcript at all: a single placeholder synthesized from the
        // first segment keeps the output cardinality at one.
        let seg = &segments[0];
        return vec![AlignedResult {
            id: "segment-0".to_string(),
            speaker_label: numbering.label_for(&seg.speaker),
            text: format!("[audio segment {:.1}s - {:.1}s]", seg.start, seg.end),
            offset_secs: seg.start,
            start_time: seg.start,
            end_time: seg.end,
            confidence: MATCHED_CONFIDENCE,
            degraded: false,
        }];
    }

    let mut consumed = vec![false; utterances.len()];
    let mut claims: Vec<Option<Claim>> = Vec::with_capacity(utterances.len());
    claims.resize_with(utterances.len(), || None);

    for (seg_index, seg) in segments.iter().enumerate() {
        let selected = select_utterance(utterances, &mut consumed, seg, seg_index);
        let label = numbering.label_for(&seg.speaker);

        // First claim wins; tertiary re-selections of an already-claimed
        // utterance change nothing.
        if claims[selected].is_none() {
            claims[selected] = Some(Claim {
                label,
                start: seg.start,
                end: seg.end,
            });
        }
    }

    utterances
        .iter()
        .zip(claims.iter())
        .map(|(utterance, claim)| match claim {
            Some(claim) => AlignedResult {
                id: utterance.id.to_string(),
                speaker_label: claim.label.clone(),
                text: utterance.text.clone(),
                offset_secs: utterance.offset_secs,
                start_time: claim.start,
                end_time: claim.end,
                confidence: MATCHED_CONFIDENCE,
                degraded: false,
            },
            None => {
                // No segment selected this utterance; attribute it to the
                // temporally nearest segment but flag the entry as
                // heuristic rather than dropping the text.
                let nearest = nearest_segment(segments, utterance.offset_secs);
                AlignedResult {
                    id: utterance.id.to_string(),
                    speaker_label: numbering.label_for(&nearest.speaker),
                    text: utterance.text.clone(),
                    offset_secs: utterance.offset_secs,
                    start_time: utterance.offset_secs,
                    end_time: utterance.offset_secs + NOMINAL_UTTERANCE_SECS,
                    confidence: DEGRADED_CONFIDENCE,
                    degraded: true,
                }
            }
        })
        .collect()
}

/// Pick the utterance index for one segment (primary → secondary →
/// tertiary).  Only primary and secondary matches mark the utterance as
/// consumed.
fn select_utterance(
    utterances: &[Utterance],
    consumed: &mut [bool],
    seg: &DiarizationSegment,
    seg_index: usize,
) -> usize {
    // Primary: first unclaimed utterance whose offset lies in [start, end].
    let primary = (0..utterances.len()).find(|&i| {
        !consumed[i]
            && utterances[i].offset_secs >= seg.start
            && utterances[i].offset_secs <= seg.end
    });
    if let Some(i) = primary {
        consumed[i] = true;
        return i;
    }

    // Secondary: unclaimed utterance closest to the segment start, within
    // the match window.
    let secondary = (0..utterances.len())
        .filter(|&i| !consumed[i])
        .map(|i| (i, (utterances[i].offset_secs - seg.start).abs()))
        .filter(|&(_, distance)| distance < SECONDARY_MATCH_WINDOW_SECS)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((i, _)) = secondary {
        consumed[i] = true;
        return i;
    }

    // Tertiary: modulo reuse without consuming.
    seg_index % utterances.len()
}

fn nearest_segment<'a>(segments: &'a [DiarizationSegment], offset: f64) -> &'a DiarizationSegment {
    // `segments` is non-empty on every call path.
    segments
        .iter()
        .min_by(|a, b| interval_distance(a, offset).total_cmp(&interval_distance(b, offset)))
        .unwrap_or(&segments[0])
}

fn interval_distance(seg: &DiarizationSegment, offset: f64) -> f64 {
    if offset < seg.start {
        seg.start - offset
    } else if offset > seg.end {
        offset - seg.end
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Degraded path
// ---------------------------------------------------------------------------

/// Build results from the utterance log alone.
///
/// Two synthetic speakers alternate every two consecutive utterances
/// (indices 0–1 → Speaker 1, 2–3 → Speaker 2, 4–5 → Speaker 1, …).  Each
/// entry carries [`DEGRADED_CONFIDENCE`] and a nominal
/// [`NOMINAL_UTTERANCE_SECS`] span since no true segment duration exists.
fn align_degraded(utterances: &[Utterance]) -> Vec<AlignedResult> {
    if utterances.is_empty() {
        return vec![AlignedResult {
            id: "placeholder-0".to_string(),
            speaker_label: "Speaker 1".to_string(),
            text: "[simulated] no transcript captured - speaker attribution unavailable"
                .to_string(),
            offset_secs: 0.0,
            start_time: 0.0,
            end_time: 5.0,
            confidence: DEGRADED_CONFIDENCE,
            degraded: true,
        }];
    }

    utterances
        .iter()
        .enumerate()
        .map(|(index, utterance)| AlignedResult {
            id: utterance.id.to_string(),
            speaker_label: if (index / 2) % 2 == 0 {
                "Speaker 1".to_string()
            } else {
                "Speaker 2".to_string()
            },
            text: utterance.text.clone(),
            offset_secs: utterance.offset_secs,
            start_time: utterance.offset_secs,
            end_time: utterance.offset_secs + NOMINAL_UTTERANCE_SECS,
            confidence: DEGRADED_CONFIDENCE,
            degraded: true,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// SpeakerNumbering
// ---------------------------------------------------------------------------

/// Humanizes raw speaker tags: distinct tags are numbered from 1 in order
/// of first appearance, so `SPEAKER_0` → "Speaker 1", `SPEAKER_1` →
/// "Speaker 2", and arbitrary tags still get stable labels.
struct SpeakerNumbering {
    order: Vec<String>,
}

impl SpeakerNumbering {
    fn new() -> Self {
        Self { order: Vec::new() }
    }

    fn label_for(&mut self, tag: &str) -> String {
        let ordinal = match self.order.iter().position(|t| t == tag) {
            Some(i) => i,
            None => {
                self.order.push(tag.to_string());
                self.order.len() - 1
            }
        };
        format!("Speaker {}", ordinal + 1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(id: u64, text: &str, offset_secs: f64) -> Utterance {
        Utterance {
            id,
            text: text.to_string(),
            offset_secs,
            is_final: true,
        }
    }

    fn seg(start: f64, end: f64, speaker: &str) -> DiarizationSegment {
        DiarizationSegment::new(start, end, speaker)
    }

    fn unavailable() -> Result<Vec<DiarizationSegment>, DiarizationError> {
        Err(DiarizationError::Timeout)
    }

    // ---- Scenario 1: two utterances, two matching segments -----------------

    #[test]
    fn matched_segments_attribute_speakers() {
        let utterances = vec![utterance(1, "hello", 0.0), utterance(2, "world", 3.2)];
        let outcome = Ok(vec![
            seg(0.0, 2.0, "SPEAKER_0"),
            seg(3.0, 5.0, "SPEAKER_1"),
        ]);

        let results = align(&utterances, &outcome);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].speaker_label, "Speaker 1");
        assert_eq!(results[0].text, "hello");
        assert!((results[0].confidence - 0.95).abs() < f64::EPSILON);
        assert!(!results[0].degraded);
        assert!((results[0].start_time - 0.0).abs() < f64::EPSILON);
        assert!((results[0].end_time - 2.0).abs() < f64::EPSILON);

        assert_eq!(results[1].speaker_label, "Speaker 2");
        assert_eq!(results[1].text, "world");
        assert!((results[1].confidence - 0.95).abs() < f64::EPSILON);
        assert!(!results[1].degraded);
        assert!((results[1].start_time - 3.0).abs() < f64::EPSILON);
        assert!((results[1].end_time - 5.0).abs() < f64::EPSILON);
    }

    // ---- Scenario 2: diarization timeout with four utterances --------------

    #[test]
    fn timeout_degrades_with_alternating_speakers() {
        let utterances = vec![
            utterance(0, "a", 0.0),
            utterance(1, "b", 2.0),
            utterance(2, "c", 4.0),
            utterance(3, "d", 6.0),
        ];

        let results = align(&utterances, &unavailable());

        assert_eq!(results.len(), 4);
        let labels: Vec<&str> = results.iter().map(|r| r.speaker_label.as_str()).collect();
        assert_eq!(labels, ["Speaker 1", "Speaker 1", "Speaker 2", "Speaker 2"]);
        for r in &results {
            assert!(r.degraded);
            assert!((r.confidence - 0.5).abs() < f64::EPSILON);
        }
    }

    // ---- Scenario 3: empty log, diarization unavailable --------------------

    #[test]
    fn empty_log_unavailable_yields_single_placeholder() {
        let results = align(&[], &unavailable());

        assert_eq!(results.len(), 1);
        let placeholder = &results[0];
        assert!(placeholder.degraded);
        assert!((placeholder.confidence - 0.5).abs() < f64::EPSILON);
        assert!((placeholder.start_time - 0.0).abs() < f64::EPSILON);
        assert!((placeholder.end_time - 5.0).abs() < f64::EPSILON);
        assert!(placeholder.text.contains("[simulated]"));
    }

    // ---- Scenario 4: more segments than utterances -------------------------

    #[test]
    fn surplus_segments_reuse_utterances_without_error() {
        let utterances = vec![utterance(0, "one", 0.5), utterance(1, "two", 10.5)];
        let outcome = Ok(vec![
            seg(0.0, 1.0, "SPEAKER_0"),
            seg(10.0, 11.0, "SPEAKER_1"),
            seg(20.0, 21.0, "SPEAKER_0"),
            seg(30.0, 31.0, "SPEAKER_1"),
            seg(40.0, 41.0, "SPEAKER_2"),
        ]);

        let results = align(&utterances, &outcome);

        // Tertiary modulo reuse happens internally; the output stays one
        // entry per utterance.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "one");
        assert_eq!(results[1].text, "two");
        assert!(results.iter().all(|r| !r.degraded));
    }

    // ---- Cardinality property ----------------------------------------------

    #[test]
    fn cardinality_is_max_of_log_len_and_one() {
        let utterances: Vec<Utterance> = (0..5)
            .map(|i| utterance(i, "text", i as f64 * 2.0))
            .collect();

        let shapes: Vec<Result<Vec<DiarizationSegment>, DiarizationError>> = vec![
            Ok(vec![]),
            Ok(vec![seg(0.0, 1.0, "A")]),
            Ok(vec![
                seg(0.0, 1.0, "A"),
                seg(2.0, 3.0, "B"),
                seg(4.0, 5.0, "A"),
                seg(6.0, 7.0, "B"),
                seg(8.0, 9.0, "A"),
                seg(10.0, 11.0, "B"),
                seg(12.0, 13.0, "A"),
            ]),
            Err(DiarizationError::Transport("connection refused".into())),
            Err(DiarizationError::MalformedResponse),
        ];

        for outcome in &shapes {
            assert_eq!(align(&utterances, outcome).len(), 5);
            assert_eq!(align(&[], outcome).len(), 1);
        }
    }

    // ---- Purity / idempotence ----------------------------------------------

    #[test]
    fn align_is_idempotent() {
        let utterances = vec![utterance(0, "x", 0.3), utterance(1, "y", 4.0)];
        let outcome = Ok(vec![seg(0.0, 2.0, "A"), seg(3.5, 6.0, "B")]);

        assert_eq!(align(&utterances, &outcome), align(&utterances, &outcome));
        assert_eq!(align(&utterances, &unavailable()), align(&utterances, &unavailable()));
    }

    // ---- Degraded alternation boundaries -----------------------------------

    #[test]
    fn degraded_labels_change_exactly_at_even_indices() {
        let utterances: Vec<Utterance> = (0..7)
            .map(|i| utterance(i, "t", i as f64))
            .collect();

        let results = align(&utterances, &unavailable());
        let labels: Vec<&str> = results.iter().map(|r| r.speaker_label.as_str()).collect();

        assert_eq!(
            labels,
            [
                "Speaker 1", "Speaker 1", "Speaker 2", "Speaker 2", "Speaker 1", "Speaker 1",
                "Speaker 2"
            ]
        );
        let distinct: std::collections::BTreeSet<&str> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn degraded_timing_uses_nominal_duration() {
        let utterances = vec![utterance(0, "t", 7.5)];
        let results = align(&utterances, &unavailable());

        assert!((results[0].start_time - 7.5).abs() < f64::EPSILON);
        assert!((results[0].end_time - 10.5).abs() < f64::EPSILON);
    }

    // ---- Fallthrough and empty-list handling -------------------------------

    #[test]
    fn empty_segment_list_falls_through_to_degraded() {
        let utterances = vec![utterance(0, "a", 0.0)];
        let results = align(&utterances, &Ok(vec![]));

        assert_eq!(results.len(), 1);
        assert!(results[0].degraded);
    }

    #[test]
    fn malformed_response_error_degrades() {
        let utterances = vec![utterance(0, "a", 0.0)];
        let results = align(
            &utterances,
            &Err(DiarizationError::MalformedResponse),
        );
        assert!(results[0].degraded);
    }

    // ---- Matching details --------------------------------------------------

    #[test]
    fn secondary_match_picks_closest_within_window() {
        // Neither utterance lies inside the segment; 4.6 is closer to the
        // 5.0 start than 4.2 and both are within 1.0 s.
        let utterances = vec![utterance(0, "far", 4.2), utterance(1, "near", 4.6)];
        let outcome = Ok(vec![seg(5.0, 6.0, "A")]);

        let results = align(&utterances, &outcome);

        // "near" got the model-backed claim; "far" is the flagged leftover.
        assert!(!results[1].degraded);
        assert!((results[1].start_time - 5.0).abs() < f64::EPSILON);
        assert!(results[0].degraded);
    }

    #[test]
    fn secondary_match_respects_window() {
        // 2.0 s away from the segment start — outside the 1.0 s window, so
        // the segment falls back to tertiary reuse of index 0.
        let utterances = vec![utterance(0, "only", 3.0)];
        let outcome = Ok(vec![seg(5.0, 6.0, "A")]);

        let results = align(&utterances, &outcome);
        assert_eq!(results.len(), 1);
        assert!(!results[0].degraded); // tertiary still attributes the segment
        assert!((results[0].start_time - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overlapping_segments_first_in_order_wins() {
        // Both segments contain the utterance offset; array order decides.
        let utterances = vec![utterance(0, "contested", 1.0)];
        let outcome = Ok(vec![seg(0.0, 2.0, "FIRST"), seg(0.5, 3.0, "SECOND")]);

        let results = align(&utterances, &outcome);
        assert_eq!(results[0].speaker_label, "Speaker 1"); // FIRST's label
        assert!((results[0].end_time - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unmatched_utterance_is_kept_with_degraded_flag() {
        // The second utterance is far from the only segment: it must still
        // appear in the output, flagged as heuristic.
        let utterances = vec![utterance(0, "matched", 0.5), utterance(1, "orphan", 60.0)];
        let outcome = Ok(vec![seg(0.0, 1.0, "A")]);

        let results = align(&utterances, &outcome);

        assert_eq!(results.len(), 2);
        assert!(!results[0].degraded);
        assert!(results[1].degraded);
        assert_eq!(results[1].text, "orphan");
        assert!((results[1].confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_log_with_segments_synthesizes_one_placeholder() {
        let outcome = Ok(vec![seg(1.0, 2.5, "SPEAKER_0"), seg(3.0, 4.0, "SPEAKER_1")]);
        let results = align(&[], &outcome);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "[audio segment 1.0s - 2.5s]");
        assert_eq!(results[0].speaker_label, "Speaker 1");
        assert!(!results[0].degraded);
    }

    #[test]
    fn speaker_numbering_follows_first_appearance() {
        let utterances = vec![
            utterance(0, "a", 0.5),
            utterance(1, "b", 2.5),
            utterance(2, "c", 4.5),
        ];
        let outcome = Ok(vec![
            seg(0.0, 1.0, "bob"),
            seg(2.0, 3.0, "alice"),
            seg(4.0, 5.0, "bob"),
        ]);

        let results = align(&utterances, &outcome);
        let labels: Vec<&str> = results.iter().map(|r| r.speaker_label.as_str()).collect();
        assert_eq!(labels, ["Speaker 1", "Speaker 2", "Speaker 1"]);
    }
}

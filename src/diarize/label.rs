//! Speaker display colors.
//!
//! Stateless presentation mapping from a zero-based speaker ordinal to one
//! of exactly six fixed RGB triples, cycling via modulo.  No side effects,
//! no memory of prior calls — the same ordinal always produces the same
//! color.

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// An RGB color triple.
pub type Rgb = (u8, u8, u8);

/// The fixed six-color speaker palette.
pub const SPEAKER_COLORS: [Rgb; 6] = [
    (168, 85, 247), // purple
    (16, 185, 129), // green
    (245, 158, 11), // orange
    (239, 68, 68),  // red
    (59, 130, 246), // blue
    (139, 92, 246), // violet
];

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Color for a zero-based speaker ordinal; ordinals beyond the palette wrap
/// around.
pub fn color_for_ordinal(ordinal: usize) -> Rgb {
    SPEAKER_COLORS[ordinal % SPEAKER_COLORS.len()]
}

/// Color for a speaker label such as `"Speaker 3"`.
///
/// The trailing number is parsed as a 1-based speaker index and converted
/// to the zero-based ordinal; labels without a parsable number map to
/// ordinal 0.
pub fn color_for_label(label: &str) -> Rgb {
    color_for_ordinal(ordinal_from_label(label))
}

/// Parse the zero-based ordinal out of a `"Speaker N"` label.
pub fn ordinal_from_label(label: &str) -> usize {
    label
        .rsplit(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse::<usize>().ok())
        .map(|n| n.saturating_sub(1))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_six_ordinals_map_to_distinct_colors() {
        let colors: std::collections::BTreeSet<Rgb> =
            (0..6).map(color_for_ordinal).collect();
        assert_eq!(colors.len(), 6);
    }

    #[test]
    fn ordinals_cycle_via_modulo() {
        assert_eq!(color_for_ordinal(0), color_for_ordinal(6));
        assert_eq!(color_for_ordinal(5), color_for_ordinal(11));
        assert_eq!(color_for_ordinal(2), color_for_ordinal(14));
    }

    #[test]
    fn mapping_is_stateless() {
        // Same input, same output — call order must not matter.
        let a = color_for_ordinal(3);
        let _ = color_for_ordinal(0);
        let b = color_for_ordinal(3);
        assert_eq!(a, b);
    }

    #[test]
    fn labels_parse_to_zero_based_ordinals() {
        assert_eq!(ordinal_from_label("Speaker 1"), 0);
        assert_eq!(ordinal_from_label("Speaker 2"), 1);
        assert_eq!(ordinal_from_label("Speaker 12"), 11);
    }

    #[test]
    fn unparseable_labels_map_to_first_color() {
        assert_eq!(color_for_label("Speaker"), SPEAKER_COLORS[0]);
        assert_eq!(color_for_label(""), SPEAKER_COLORS[0]);
    }

    #[test]
    fn label_and_ordinal_paths_agree() {
        assert_eq!(color_for_label("Speaker 3"), color_for_ordinal(2));
        assert_eq!(color_for_label("Speaker 7"), color_for_ordinal(6));
    }
}

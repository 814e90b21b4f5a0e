//! Per-rule match thresholds and relevance.

/// Minimum match length for token-based matching.
pub const MIN_MATCH_LENGTH: usize = 4;

/// Minimum match length for high-value (legalese) token matching.
pub const MIN_MATCH_HIGH_LENGTH: usize = 3;

/// Rules shorter than this are "small".
pub const SMALL_RULE: usize = 15;

/// Rules shorter than this are "tiny".
pub const TINY_RULE: usize = 6;

/// Rules with at least this many tokens get full relevance by default.
pub const RELEVANCE_SATURATION_LENGTH: usize = 18;

/// Thresholds a partial match must reach to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleThresholds {
    pub minimum_coverage: Option<u8>,
    pub min_matched_length: usize,
    pub min_high_matched_length: usize,
    pub min_matched_length_unique: usize,
    pub min_high_matched_length_unique: usize,
}

/// Compute the thresholds of a rule from its token counts.
///
/// # Arguments
/// * `minimum_coverage` - Coverage declared by the rule, if any
/// * `length` - Total tokens in the rule
/// * `high_length` - Legalese token occurrences
/// * `length_unique` - Distinct tokens
/// * `high_length_unique` - Distinct legalese tokens
///
/// A declared coverage of 100 forces every threshold to the full rule.
/// Otherwise short rules get a default coverage and stricter lengths.
pub fn compute_thresholds(
    minimum_coverage: Option<u8>,
    length: usize,
    high_length: usize,
    length_unique: usize,
    high_length_unique: usize,
) -> RuleThresholds {
    if minimum_coverage == Some(100) {
        return RuleThresholds {
            minimum_coverage,
            min_matched_length: length,
            min_high_matched_length: high_length,
            min_matched_length_unique: length_unique,
            min_high_matched_length_unique: high_length_unique,
        };
    }

    let (minimum_coverage, min_matched_length, min_high_matched_length) = match length {
        0..3 => (Some(100), length, high_length),
        3..10 => (Some(80), length, high_length),
        10..30 => (Some(50), length / 2, high_length.min(MIN_MATCH_HIGH_LENGTH)),
        30..200 => (
            minimum_coverage,
            MIN_MATCH_LENGTH,
            high_length.min(MIN_MATCH_HIGH_LENGTH),
        ),
        _ => (minimum_coverage, length / 10, high_length / 10),
    };

    let (min_matched_length_unique, min_high_matched_length_unique) = if length > 200 {
        (length / 10, high_length_unique / 10)
    } else if length < 5 {
        (length_unique, high_length_unique)
    } else if length < 10 {
        let min_unique = if length_unique < 2 {
            length_unique
        } else {
            length_unique - 1
        };
        (min_unique, high_length_unique)
    } else if length < 20 {
        (high_length_unique, high_length_unique)
    } else {
        let half = match high_length_unique / 2 {
            0 => high_length_unique,
            half => half,
        };
        (MIN_MATCH_LENGTH, half.min(MIN_MATCH_HIGH_LENGTH))
    };

    RuleThresholds {
        minimum_coverage,
        min_matched_length,
        min_high_matched_length,
        min_matched_length_unique,
        min_high_matched_length_unique,
    }
}

/// Default relevance of a rule: proportional to its length, capped at 100.
///
/// # Examples
/// ```
/// # use license_detector::license_detection::rules::thresholds::compute_relevance;
/// assert_eq!(compute_relevance(1), 5);
/// assert_eq!(compute_relevance(18), 100);
/// ```
pub fn compute_relevance(length: usize) -> u8 {
    if length >= RELEVANCE_SATURATION_LENGTH {
        return 100;
    }
    (length * 100 / RELEVANCE_SATURATION_LENGTH) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_coverage_forces_full_lengths() {
        let t = compute_thresholds(Some(100), 50, 20, 30, 15);
        assert_eq!(t.minimum_coverage, Some(100));
        assert_eq!(t.min_matched_length, 50);
        assert_eq!(t.min_high_matched_length, 20);
        assert_eq!(t.min_matched_length_unique, 30);
        assert_eq!(t.min_high_matched_length_unique, 15);
    }

    #[test]
    fn test_tiny_rule_requires_everything() {
        let t = compute_thresholds(None, 2, 1, 2, 1);
        assert_eq!(t.minimum_coverage, Some(100));
        assert_eq!(t.min_matched_length, 2);
        assert_eq!(t.min_matched_length_unique, 2);
    }

    #[test]
    fn test_small_rule() {
        let t = compute_thresholds(None, 8, 3, 5, 3);
        assert_eq!(t.minimum_coverage, Some(80));
        assert_eq!(t.min_matched_length, 8);
        assert_eq!(t.min_matched_length_unique, 4);
        assert_eq!(t.min_high_matched_length_unique, 3);
    }

    #[test]
    fn test_medium_rule() {
        let t = compute_thresholds(None, 25, 10, 20, 7);
        assert_eq!(t.minimum_coverage, Some(50));
        assert_eq!(t.min_matched_length, 12);
        assert_eq!(t.min_high_matched_length, 3);
        assert_eq!(t.min_matched_length_unique, MIN_MATCH_LENGTH);
        assert_eq!(t.min_high_matched_length_unique, 3);
    }

    #[test]
    fn test_large_rules_keep_declared_coverage() {
        let t = compute_thresholds(Some(70), 100, 40, 60, 20);
        assert_eq!(t.minimum_coverage, Some(70));
        assert_eq!(t.min_matched_length, MIN_MATCH_LENGTH);

        let t = compute_thresholds(None, 500, 200, 300, 150);
        assert_eq!(t.minimum_coverage, None);
        assert_eq!(t.min_matched_length, 50);
        assert_eq!(t.min_high_matched_length, 20);
        assert_eq!(t.min_matched_length_unique, 50);
        assert_eq!(t.min_high_matched_length_unique, 15);
    }

    #[test]
    fn test_single_high_token_keeps_one() {
        let t = compute_thresholds(None, 40, 1, 30, 1);
        assert_eq!(t.min_high_matched_length_unique, 1);
    }

    #[test]
    fn test_compute_relevance() {
        assert_eq!(compute_relevance(0), 0);
        assert_eq!(compute_relevance(1), 5);
        assert_eq!(compute_relevance(9), 50);
        assert_eq!(compute_relevance(17), 94);
        assert_eq!(compute_relevance(200), 100);
    }
}

//! Unknown license matching.
//!
//! Finds license-like text that no rule matched. Regions of the query not
//! covered by any match are searched for the legalese n-grams collected from
//! the regular rules; where enough of them are found, a match to the
//! synthetic `unknown` rule is returned.

use crate::license_detection::index::{LicenseIndex, UNKNOWN_NGRAM_LENGTH, tokens_to_bytes};
use crate::license_detection::license_match::{LicenseMatch, MATCH_UNKNOWN};
use crate::license_detection::query::Query;
use crate::license_detection::spans::Span;

/// Positions of `query` not covered by `known_matches`, as contiguous ranges
/// of at least one n-gram.
fn uncovered_regions(query: &Query, known_matches: &[LicenseMatch<'_>]) -> Vec<Span> {
    let mut covered = Span::new();
    for m in known_matches {
        covered.union_with(&m.qspan);
    }
    Span::from_range(0..query.len())
        .difference(&covered)
        .ranges()
        .iter()
        .filter(|r| r.len() >= UNKNOWN_NGRAM_LENGTH)
        .map(|r| Span::from_range(r.clone()))
        .collect()
}

/// Union of the query spans of every unknown n-gram found in `region`.
fn matched_ngrams(index: &LicenseIndex, query: &Query, region: &Span) -> Span {
    let (Some(start), Some(end)) = (region.start(), region.end()) else {
        return Span::new();
    };
    let encoded = tokens_to_bytes(&query.tokens[start..=end]);
    let mut qspan = Span::new();
    for found in index.unknown_automaton.find_overlapping_iter(&encoded) {
        if found.start() % 2 != 0 {
            continue;
        }
        let qstart = start + found.start() / 2;
        qspan.add(qstart..qstart + found.len() / 2);
    }
    qspan
}

/// Match license-like text in the regions not covered by `known_matches`.
///
/// Each uncovered region yields at most one match to the synthetic unknown
/// rule, spanning all the n-grams found in that region.
pub fn unknown_match<'a>(
    index: &'a LicenseIndex,
    query: &'a Query,
    known_matches: &[LicenseMatch<'a>],
) -> Vec<LicenseMatch<'a>> {
    if query.is_empty() {
        return Vec::new();
    }
    let rule = index.unknown_rule();

    uncovered_regions(query, known_matches)
        .iter()
        .filter_map(|region| {
            let qspan = matched_ngrams(index, query, region);
            if qspan.len() < UNKNOWN_NGRAM_LENGTH {
                return None;
            }
            let ispan = Span::from_range(0..qspan.len());
            let hispan = Span::from_iterator(
                qspan
                    .iter()
                    .enumerate()
                    .filter(|&(_, pos)| index.is_high(query.tokens[pos]))
                    .map(|(ipos, _)| ipos),
            );
            log::debug!("Unknown license text at positions {qspan:?}");
            Some(LicenseMatch::new(
                index.unknown_rid,
                rule,
                query,
                qspan,
                ispan,
                hispan,
                MATCH_UNKNOWN,
            ))
        })
        .collect()
}

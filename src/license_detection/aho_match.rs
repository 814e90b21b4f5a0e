//! Aho-Corasick exact matching.
//!
//! Rule token sequences are encoded as little-endian bytes, two per token,
//! and matched in a single pass over the encoded query run. Overlapping
//! occurrences are all reported and sorted out during refinement.

use crate::license_detection::index::{LicenseIndex, tokens_to_bytes};
use crate::license_detection::license_match::{LicenseMatch, MATCH_AHO};
use crate::license_detection::query::{Matchables, Query, QueryRun};
use crate::license_detection::spans::Span;

/// Find every whole rule occurring in `query_run` on matchable positions.
///
/// # Arguments
/// * `index` - The license index holding the rules automaton
/// * `query` - The query owning the run
/// * `query_run` - The run to match
/// * `matchables` - Positions still available for matching
pub fn aho_match<'a>(
    index: &'a LicenseIndex,
    query: &'a Query,
    query_run: &QueryRun,
    matchables: &Matchables,
) -> Vec<LicenseMatch<'a>> {
    let tokens = query_run.tokens(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let encoded = tokens_to_bytes(tokens);
    let qbegin = query_run.start;
    let mut matches = Vec::new();

    for found in index.rules_automaton.find_overlapping_iter(&encoded) {
        // An odd offset straddles two tokens.
        if found.start() % 2 != 0 {
            continue;
        }
        let qstart = qbegin + found.start() / 2;
        let qend = qbegin + found.end() / 2;
        if qstart == qend || !(qstart..qend).all(|pos| matchables.is_matchable(pos)) {
            continue;
        }

        for &rid in &index.rids_by_pattern[found.pattern().as_usize()] {
            let rule = index.rule(rid);
            let ispan = Span::from_range(0..rule.length);
            let hispan = index.hispan(rule, &ispan);
            matches.push(LicenseMatch::new(
                rid,
                rule,
                query,
                Span::from_range(qstart..qend),
                ispan,
                hispan,
                MATCH_AHO,
            ));
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::test_utils::create_test_index;

    #[test]
    fn test_aho_match_finds_embedded_rules() {
        let index = create_test_index(&[
            ("mit.RULE", "mit", "MIT license"),
            ("gpl.RULE", "gpl-2.0", "GPL version 2"),
        ]);
        let query = Query::new("released under the MIT license or GPL version 2", &index);
        let matchables = Matchables::new(&query, &index);
        let mut matches = aho_match(&index, &query, &query.whole_query_run(), &matchables);
        matches.sort_by_key(|m| m.qstart());

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].rule.identifier, "mit.RULE");
        assert_eq!(matches[0].qspan, Span::from_range(0..2));
        assert_eq!(matches[1].rule.identifier, "gpl.RULE");
        assert_eq!(matches[1].ispan, Span::from_range(0..3));
        assert!(matches.iter().all(|m| m.coverage() == 100.0));
    }

    #[test]
    fn test_aho_match_reports_overlapping_rules() {
        let index = create_test_index(&[
            ("short.RULE", "mit", "MIT license"),
            ("long.RULE", "mit", "the MIT license text"),
        ]);
        let query = Query::new("the MIT license text", &index);
        let matchables = Matchables::new(&query, &index);
        let matches = aho_match(&index, &query, &query.whole_query_run(), &matchables);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_aho_match_shared_pattern_yields_each_rule() {
        let index = create_test_index(&[("a.RULE", "mit", "MIT license"), ("b.RULE", "mit", "mit LICENSE")]);
        let query = Query::new("MIT license", &index);
        let matchables = Matchables::new(&query, &index);
        let matches = aho_match(&index, &query, &query.whole_query_run(), &matchables);
        let rids: Vec<usize> = matches.iter().map(|m| m.rid).collect();
        assert_eq!(rids, vec![0, 1]);
    }

    #[test]
    fn test_aho_match_skips_unmatchable_positions() {
        let index = create_test_index(&[("mit.RULE", "mit", "MIT license")]);
        let query = Query::new("MIT license", &index);
        let mut matchables = Matchables::new(&query, &index);
        matchables.subtract(&Span::from_range(1..2));
        assert!(aho_match(&index, &query, &query.whole_query_run(), &matchables).is_empty());
    }
}

//! Hash-based exact matching.
//!
//! A whole query run matches a whole rule when the SHA1 of their token id
//! sequences are equal.

use sha1::{Digest, Sha1};

use crate::license_detection::index::LicenseIndex;
use crate::license_detection::license_match::{LicenseMatch, MATCH_HASH};
use crate::license_detection::query::{Query, QueryRun};
use crate::license_detection::spans::Span;

/// SHA1 of a token id sequence.
///
/// Token ids are serialized as signed 16-bit little-endian integers.
pub fn compute_hash(tokens: &[u16]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for &token in tokens {
        hasher.update((token as i16).to_le_bytes());
    }
    hasher.finalize().into()
}

/// Match a whole query run against the rule with the same token hash.
///
/// # Returns
/// Zero or one match covering the whole run and the whole rule.
pub fn hash_match<'a>(
    index: &'a LicenseIndex,
    query: &'a Query,
    query_run: &QueryRun,
) -> Vec<LicenseMatch<'a>> {
    let tokens = query_run.tokens(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let Some(&rid) = index.rid_by_hash.get(&compute_hash(tokens)) else {
        return Vec::new();
    };
    let rule = index.rule(rid);
    let qspan = Span::from_range(query_run.range());
    let ispan = Span::from_range(0..rule.length);
    let hispan = index.hispan(rule, &ispan);

    vec![LicenseMatch::new(rid, rule, query, qspan, ispan, hispan, MATCH_HASH)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::test_utils::{MIT_GRANT, create_test_index};

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&[1, 2, 3]), compute_hash(&[1, 2, 3]));
        assert_ne!(compute_hash(&[1, 2, 3]), compute_hash(&[3, 2, 1]));
        assert_eq!(compute_hash(&[]).len(), 20);
    }

    #[test]
    fn test_hash_match_exact_text() {
        let index = create_test_index(&[("mit_1.RULE", "mit", MIT_GRANT), ("x.RULE", "bsd-new", "BSD license")]);
        let query = Query::new(MIT_GRANT, &index);
        let matches = hash_match(&index, &query, &query.whole_query_run());

        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.rule.identifier, "mit_1.RULE");
        assert_eq!(m.qspan, Span::from_range(0..query.len()));
        assert_eq!(m.qspan, m.ispan);
        assert_eq!(m.coverage(), 100.0);
        assert_eq!(m.score(), 100.0);
        assert_eq!(m.matcher, MATCH_HASH);
    }

    #[test]
    fn test_hash_match_ignores_case_and_punctuation() {
        let index = create_test_index(&[("x.RULE", "bsd-new", "BSD license")]);
        let query = Query::new("bsd -- LICENSE.", &index);
        assert_eq!(hash_match(&index, &query, &query.whole_query_run()).len(), 1);
    }

    #[test]
    fn test_hash_match_needs_whole_text() {
        let index = create_test_index(&[("x.RULE", "bsd-new", "BSD license")]);
        let query = Query::new("BSD license BSD", &index);
        assert!(hash_match(&index, &query, &query.whole_query_run()).is_empty());

        let empty = Query::new("", &index);
        assert!(hash_match(&index, &empty, &empty.whole_query_run()).is_empty());
    }
}

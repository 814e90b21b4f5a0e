//! License index: the rule corpus prepared for matching.
//!
//! The index is built once by [`build_index`] and is read-only afterwards,
//! so it can be shared across threads behind an `Arc`.
//!
//! # Index Structures
//!
//! - **Hash matching**: `rid_by_hash` maps the hash of a rule's token ids to the rule
//! - **Automaton matching**: `rules_automaton` finds whole rules in a query, and
//!   `unknown_automaton` finds license-like n-grams
//! - **Candidate selection**: `bags_by_rid` holds token sets and multisets of
//!   approx-matchable rules
//! - **Sequence matching**: `high_postings_by_rid` holds legalese token positions
//! - **Lookups**: `licenses_by_key` and SPDX keys for reporting

mod builder;
pub mod dictionary;
pub mod token_sets;

pub use builder::{UNKNOWN_NGRAM_LENGTH, build_index};
pub(crate) use builder::tokens_to_bytes;

use std::collections::{HashMap, HashSet};

use aho_corasick::AhoCorasick;
use thiserror::Error;

use crate::license_detection::expression::{ParseError, render_spdx};
use crate::license_detection::index::dictionary::TokenDictionary;
use crate::license_detection::index::token_sets::TokenBag;
use crate::license_detection::models::{License, Rule};
use crate::license_detection::spans::Span;

/// Failure to build an index from a rule corpus.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("rule {identifier} has an invalid license expression")]
    InvalidExpression {
        identifier: String,
        #[source]
        source: ParseError,
    },

    #[error("rule {identifier} has no license expression and is not a false positive")]
    MissingExpression { identifier: String },

    #[error("rule {identifier} has no indexable token")]
    EmptyRule { identifier: String },

    #[error("rule {identifier} needs more than {} distinct tokens", usize::from(u16::MAX) + 1)]
    TooManyTokens { identifier: String },

    #[error("failed to build rule automaton")]
    Automaton(#[from] aho_corasick::BuildError),
}

/// A lookup that found more than one license.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ambiguous license lookup for {query:?}: candidates {candidates:?}")]
pub struct AmbiguousMatch {
    pub query: String,
    pub candidates: Vec<String>,
}

/// License index containing all data structures for license detection.
#[derive(Debug, Clone)]
pub struct LicenseIndex {
    /// Token dictionary mapping token strings to integer ids.
    pub dictionary: TokenDictionary,

    /// Tokens with an id below this are legalese ("high") tokens.
    pub len_legalese: usize,

    /// Ids of tokens made only of digits.
    pub digit_only_tids: HashSet<u16>,

    /// SHA1 of a rule's token ids to its rule id. False-positive rules are not
    /// hash matchable.
    pub rid_by_hash: HashMap<[u8; 20], usize>,

    /// All rules by rule id, the two synthetic rules last.
    pub rules_by_rid: Vec<Rule>,

    /// Whole-rule patterns as little-endian token id bytes.
    pub rules_automaton: AhoCorasick,

    /// Rule ids sharing each automaton pattern, by pattern id.
    pub rids_by_pattern: Vec<Vec<usize>>,

    /// License-like n-grams of `UNKNOWN_NGRAM_LENGTH` tokens.
    pub unknown_automaton: AhoCorasick,

    /// Token set and multiset of each approx-matchable rule.
    pub bags_by_rid: HashMap<usize, TokenBag>,

    /// Positions of each legalese token in each approx-matchable rule.
    pub high_postings_by_rid: HashMap<usize, HashMap<u16, Vec<usize>>>,

    pub regular_rids: HashSet<usize>,
    pub false_positive_rids: HashSet<usize>,

    /// Rules considered by the sequence matcher, in ascending order.
    pub approx_matchable_rids: Vec<usize>,

    pub licenses_by_key: HashMap<String, License>,

    /// License key to the SPDX key used when rendering SPDX expressions.
    pub spdx_keys: HashMap<String, String>,

    /// Synthetic rule backing unknown-license matches.
    pub unknown_rid: usize,

    /// Synthetic rule backing the undetected placeholder match.
    pub undetected_rid: usize,
}

impl LicenseIndex {
    pub fn rule(&self, rid: usize) -> &Rule {
        &self.rules_by_rid[rid]
    }

    pub fn unknown_rule(&self) -> &Rule {
        &self.rules_by_rid[self.unknown_rid]
    }

    pub fn undetected_rule(&self) -> &Rule {
        &self.rules_by_rid[self.undetected_rid]
    }

    /// Number of rules loaded from the corpus, synthetic rules excluded.
    pub fn corpus_rules_count(&self) -> usize {
        self.rules_by_rid.iter().filter(|r| !r.is_synthetic).count()
    }

    /// True if `tid` is a legalese token.
    #[inline]
    pub fn is_high(&self, tid: u16) -> bool {
        (tid as usize) < self.len_legalese
    }

    /// Positions of `ispan` holding a legalese token of `rule`.
    pub fn hispan(&self, rule: &Rule, ispan: &Span) -> Span {
        Span::from_iterator(
            ispan
                .iter()
                .filter(|&pos| rule.tokens.get(pos).is_some_and(|&tid| self.is_high(tid))),
        )
    }

    pub fn license(&self, key: &str) -> Option<&License> {
        self.licenses_by_key.get(key)
    }

    /// `expression` rendered with SPDX keys, `None` if it does not parse.
    pub fn spdx_expression(&self, expression: &str) -> Option<String> {
        render_spdx(expression, &self.spdx_keys).ok()
    }

    /// Find the license whose primary or secondary SPDX key is `spdx_key`,
    /// ignoring case. Deprecated licenses are not considered.
    ///
    /// # Returns
    /// `Ok(None)` when nothing matches and `Err(AmbiguousMatch)` when more
    /// than one license does.
    pub fn license_by_spdx_key(&self, spdx_key: &str) -> Result<Option<&License>, AmbiguousMatch> {
        self.unique_license(spdx_key, |license| {
            license
                .spdx_license_key
                .iter()
                .chain(license.other_spdx_license_keys.iter())
                .any(|k| k.eq_ignore_ascii_case(spdx_key))
        })
    }

    /// Find the license whose name or short name is `name`, ignoring case.
    pub fn license_by_name(&self, name: &str) -> Result<Option<&License>, AmbiguousMatch> {
        let name = name.trim();
        self.unique_license(name, |license| {
            license.name.eq_ignore_ascii_case(name)
                || license
                    .short_name
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(name))
        })
    }

    fn unique_license(
        &self,
        query: &str,
        predicate: impl Fn(&License) -> bool,
    ) -> Result<Option<&License>, AmbiguousMatch> {
        let mut found: Vec<&License> = self
            .licenses_by_key
            .values()
            .filter(|license| !license.is_deprecated && predicate(license))
            .collect();
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            _ => {
                let mut candidates: Vec<String> = found.iter().map(|l| l.key.clone()).collect();
                candidates.sort();
                Err(AmbiguousMatch {
                    query: query.to_string(),
                    candidates,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn license(key: &str, name: &str, spdx: &str) -> License {
        License {
            key: key.to_string(),
            name: name.to_string(),
            spdx_license_key: Some(spdx.to_string()),
            text: format!("{name} text here"),
            ..License::default()
        }
    }

    fn index_with(licenses: Vec<License>) -> LicenseIndex {
        let rules = vec![Rule::new("mit_1.RULE", "mit", "permission is hereby granted free of charge")];
        build_index(rules, licenses).expect("index should build")
    }

    #[test]
    fn test_license_by_spdx_key() {
        let index = index_with(vec![
            license("mit", "MIT License", "MIT"),
            license("apache-2.0", "Apache License 2.0", "Apache-2.0"),
        ]);
        assert_eq!(
            index.license_by_spdx_key("apache-2.0").unwrap().map(|l| l.key.as_str()),
            Some("apache-2.0")
        );
        assert_eq!(index.license_by_spdx_key("GPL-2.0").unwrap(), None);
    }

    #[test]
    fn test_license_by_spdx_key_ambiguous() {
        let mut other = license("mit-old", "Old MIT", "MIT-0");
        other.other_spdx_license_keys = vec!["MIT".to_string()];
        let index = index_with(vec![license("mit", "MIT License", "MIT"), other]);

        let err = index.license_by_spdx_key("MIT").unwrap_err();
        assert_eq!(err.candidates, vec!["mit", "mit-old"]);
    }

    #[test]
    fn test_license_by_spdx_key_skips_deprecated() {
        let mut deprecated = license("mit-legacy", "MIT Legacy", "MIT");
        deprecated.is_deprecated = true;
        let index = index_with(vec![license("mit", "MIT License", "MIT"), deprecated]);
        assert_eq!(index.license_by_spdx_key("MIT").unwrap().map(|l| l.key.as_str()), Some("mit"));
    }

    #[test]
    fn test_license_by_name() {
        let mut bsd = license("bsd-new", "BSD-3-Clause", "BSD-3-Clause");
        bsd.short_name = Some("BSD New".to_string());
        let index = index_with(vec![bsd, license("mit", "MIT License", "MIT")]);
        assert_eq!(
            index.license_by_name("bsd new").unwrap().map(|l| l.key.as_str()),
            Some("bsd-new")
        );
        assert_eq!(index.license_by_name("Unknown License").unwrap(), None);
    }

    #[test]
    fn test_synthetic_rules() {
        let index = index_with(vec![]);
        assert!(index.unknown_rule().is_synthetic);
        assert!(index.undetected_rule().is_synthetic);
        assert_eq!(index.unknown_rule().expression(), "unknown");
        assert_eq!(index.corpus_rules_count(), 1);
    }
}

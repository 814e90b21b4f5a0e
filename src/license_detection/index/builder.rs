//! License index builder.
//!
//! Tokenizes every rule, assigns token ids, computes per-rule thresholds and
//! builds the hash table, automatons and candidate bags of the index.

use std::collections::{HashMap, HashSet};

use aho_corasick::{AhoCorasick, MatchKind};
use log::{info, warn};

use crate::license_detection::expression::parse_expression;
use crate::license_detection::hash_match::compute_hash;
use crate::license_detection::index::dictionary::TokenDictionary;
use crate::license_detection::index::token_sets::TokenBag;
use crate::license_detection::index::{IndexError, LicenseIndex};
use crate::license_detection::models::{License, Rule};
use crate::license_detection::rules::legalese::{legalese_count, legalese_words};
use crate::license_detection::rules::thresholds::{
    SMALL_RULE, TINY_RULE, compute_relevance, compute_thresholds,
};
use crate::license_detection::tokenize::{parse_required_phrase_spans, tokenize};

/// Length of the n-grams used to detect unknown license text.
pub const UNKNOWN_NGRAM_LENGTH: usize = 6;

const UNKNOWN_RULE_ID: &str = "license-detection-unknown";
const UNDETECTED_RULE_ID: &str = "license-detection-undetected";

/// Tokens that point at copyright statements or URLs rather than license text.
const MARKERS: &[&str] = &[
    "copyright",
    "c",
    "copyrights",
    "rights",
    "reserved",
    "trademark",
    "foundation",
    "government",
    "institute",
    "university",
    "inc",
    "corp",
    "co",
    "author",
    "com",
    "org",
    "net",
    "uk",
    "fr",
    "be",
    "de",
    "http",
    "https",
    "www",
];

/// An n-gram is good evidence of license text when it has few digits, years
/// and single characters, some variety, at least one legalese token and no
/// copyright or URL marker.
fn is_good_tokens_ngram(tokens: &[String], tids: &[u16], len_legalese: usize) -> bool {
    const MIN_GOOD: usize = 3;

    let is_digits = |t: &String| t.chars().all(|c| c.is_ascii_digit());
    if tokens.iter().filter(|t| is_digits(t)).count() >= MIN_GOOD {
        return false;
    }
    if tokens.iter().any(|t| t.len() == 4 && is_digits(t)) {
        return false;
    }
    if tokens.iter().filter(|t| t.chars().count() == 1).count() >= MIN_GOOD {
        return false;
    }

    let unique: HashSet<u16> = tids.iter().copied().collect();
    if unique.len() <= 2 {
        return false;
    }
    if !tids.iter().any(|&tid| (tid as usize) < len_legalese) {
        return false;
    }
    !tokens.iter().any(|t| MARKERS.contains(&t.as_str()))
}

pub(crate) fn tokens_to_bytes(tokens: &[u16]) -> Vec<u8> {
    tokens.iter().flat_map(|t| t.to_le_bytes()).collect()
}

fn synthetic_rule(identifier: &str) -> Rule {
    Rule {
        is_synthetic: true,
        has_unknown: true,
        has_stored_relevance: true,
        ..Rule::new(identifier, "unknown", "")
    }
}

fn check_expression(rule: &Rule) -> Result<(), IndexError> {
    match &rule.license_expression {
        Some(expr) => parse_expression(expr)
            .map(|_| ())
            .map_err(|source| IndexError::InvalidExpression {
                identifier: rule.identifier.clone(),
                source,
            }),
        None if rule.is_false_positive => Ok(()),
        None => Err(IndexError::MissingExpression {
            identifier: rule.identifier.clone(),
        }),
    }
}

/// Build a [`LicenseIndex`] from rules and licenses.
///
/// Fails on the first rule with an unparsable expression or without any
/// token. The two synthetic rules for unknown and undetected matches are
/// appended after the corpus rules.
pub fn build_index(rules: Vec<Rule>, licenses: Vec<License>) -> Result<LicenseIndex, IndexError> {
    let mut dictionary = TokenDictionary::new_with_legalese(&legalese_words(), legalese_count());
    let len_legalese = dictionary.len_legalese();

    let mut digit_only_tids = HashSet::new();
    let mut rid_by_hash: HashMap<[u8; 20], usize> = HashMap::new();
    let mut rules_by_rid: Vec<Rule> = Vec::with_capacity(rules.len() + 2);
    let mut bags_by_rid: HashMap<usize, TokenBag> = HashMap::new();
    let mut high_postings_by_rid: HashMap<usize, HashMap<u16, Vec<usize>>> = HashMap::new();
    let mut regular_rids = HashSet::new();
    let mut false_positive_rids = HashSet::new();
    let mut approx_matchable_rids = Vec::new();

    let mut pattern_ids: HashMap<Vec<u8>, usize> = HashMap::new();
    let mut rids_by_pattern: Vec<Vec<usize>> = Vec::new();
    let mut unknown_patterns: HashSet<Vec<u8>> = HashSet::new();

    for (rid, mut rule) in rules.into_iter().enumerate() {
        check_expression(&rule)?;

        let rule_tokens = tokenize(&rule.text);
        if rule_tokens.is_empty() {
            return Err(IndexError::EmptyRule {
                identifier: rule.identifier,
            });
        }

        let mut tids = Vec::with_capacity(rule_tokens.len());
        for token in &rule_tokens {
            let Some(tid) = dictionary.get_or_assign(token) else {
                return Err(IndexError::TooManyTokens {
                    identifier: rule.identifier,
                });
            };
            if token.chars().all(|c| c.is_ascii_digit()) {
                digit_only_tids.insert(tid);
            }
            tids.push(tid);
        }

        let length = tids.len();
        rule.length = length;
        if rule.text.contains("{{") {
            rule.required_phrase_spans = parse_required_phrase_spans(&rule.text);
        }
        rule.has_unknown = rule.license_keys().iter().any(|key| key.contains("unknown"));
        if !rule.has_stored_relevance {
            rule.relevance = compute_relevance(length);
        }
        rule.is_small = length < SMALL_RULE;
        rule.is_tiny = length < TINY_RULE;

        let bag = TokenBag::from_tokens(tids.iter().copied());
        rule.length_unique = bag.len_unique();
        rule.high_length_unique = bag.high_len_unique(len_legalese);
        rule.high_length = bag.high_len(len_legalese);

        let thresholds = compute_thresholds(
            rule.minimum_coverage,
            length,
            rule.high_length,
            rule.length_unique,
            rule.high_length_unique,
        );
        rule.minimum_coverage = thresholds.minimum_coverage;
        rule.min_matched_length = thresholds.min_matched_length;
        rule.min_high_matched_length = thresholds.min_high_matched_length;
        rule.min_matched_length_unique = thresholds.min_matched_length_unique;
        rule.min_high_matched_length_unique = thresholds.min_high_matched_length_unique;

        let pattern = tokens_to_bytes(&tids);
        let next_pattern_id = rids_by_pattern.len();
        let pattern_id = *pattern_ids.entry(pattern).or_insert(next_pattern_id);
        if pattern_id == next_pattern_id {
            rids_by_pattern.push(Vec::new());
        }
        rids_by_pattern[pattern_id].push(rid);

        if rule.is_false_positive {
            false_positive_rids.insert(rid);
        } else {
            regular_rids.insert(rid);

            let hash = compute_hash(&tids);
            if let Some(&existing) = rid_by_hash.get(&hash) {
                let existing: &Rule = &rules_by_rid[existing];
                warn!(
                    "Rules {} and {} have the same tokens, only the first is hash matchable",
                    existing.identifier, rule.identifier
                );
            } else {
                rid_by_hash.insert(hash, rid);
            }

            for (toks, ngram) in rule_tokens
                .windows(UNKNOWN_NGRAM_LENGTH)
                .zip(tids.windows(UNKNOWN_NGRAM_LENGTH))
            {
                if is_good_tokens_ngram(toks, ngram, len_legalese) {
                    unknown_patterns.insert(tokens_to_bytes(ngram));
                }
            }

            if rule.is_approx_matchable() && rule.high_length > 0 {
                approx_matchable_rids.push(rid);
                let mut postings: HashMap<u16, Vec<usize>> = HashMap::new();
                for (pos, &tid) in tids.iter().enumerate() {
                    if (tid as usize) < len_legalese {
                        postings.entry(tid).or_default().push(pos);
                    }
                }
                high_postings_by_rid.insert(rid, postings);
                bags_by_rid.insert(rid, bag);
            }
        }

        rule.tokens = tids;
        rules_by_rid.push(rule);
    }

    let mut patterns: Vec<(usize, Vec<u8>)> =
        pattern_ids.into_iter().map(|(bytes, id)| (id, bytes)).collect();
    patterns.sort_unstable_by_key(|(id, _)| *id);
    let rules_automaton = AhoCorasick::builder()
        .match_kind(MatchKind::Standard)
        .build(patterns.iter().map(|(_, bytes)| bytes))?;

    let mut unknown_patterns: Vec<Vec<u8>> = unknown_patterns.into_iter().collect();
    unknown_patterns.sort_unstable();
    let unknown_automaton = AhoCorasick::builder()
        .match_kind(MatchKind::Standard)
        .build(&unknown_patterns)?;

    let unknown_rid = rules_by_rid.len();
    rules_by_rid.push(synthetic_rule(UNKNOWN_RULE_ID));
    let undetected_rid = rules_by_rid.len();
    rules_by_rid.push(synthetic_rule(UNDETECTED_RULE_ID));

    let spdx_keys = licenses
        .iter()
        .map(|license| {
            let spdx = license
                .spdx_license_key
                .clone()
                .unwrap_or_else(|| format!("LicenseRef-scancode-{}", license.key));
            (license.key.clone(), spdx)
        })
        .collect();
    let licenses_by_key: HashMap<String, License> = licenses
        .into_iter()
        .map(|license| (license.key.clone(), license))
        .collect();

    info!(
        "Built license index: {} rules, {} licenses, {} tokens, {} approx matchable",
        unknown_rid,
        licenses_by_key.len(),
        dictionary.len(),
        approx_matchable_rids.len()
    );

    Ok(LicenseIndex {
        dictionary,
        len_legalese,
        digit_only_tids,
        rid_by_hash,
        rules_by_rid,
        rules_automaton,
        rids_by_pattern,
        unknown_automaton,
        bags_by_rid,
        high_postings_by_rid,
        regular_rids,
        false_positive_rids,
        approx_matchable_rids,
        licenses_by_key,
        spdx_keys,
        unknown_rid,
        undetected_rid,
    })
}

//! Core data structures for license detection: licenses and rules.

use std::ops::Range;

use crate::license_detection::expression::parse_expression;

/// Base URL of the rule and license corpus, used to build `rule_url`.
pub const CORPUS_BASE_URL: &str =
    "https://github.com/aboutcode-org/scancode-toolkit/tree/develop/src/licensedcode/data";

/// License metadata loaded from a `.LICENSE` file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct License {
    /// Unique lowercase identifier, also the file stem.
    pub key: String,
    pub name: String,
    pub short_name: Option<String>,
    pub spdx_license_key: Option<String>,
    pub other_spdx_license_keys: Vec<String>,
    /// e.g. "Permissive" or "Copyleft"
    pub category: Option<String>,
    pub text: String,
    pub reference_urls: Vec<String>,
    pub notes: Option<String>,
    pub is_deprecated: bool,
    pub replaced_by: Vec<String>,
    pub is_exception: bool,
    pub is_unknown: bool,
    pub is_generic: bool,
    pub minimum_coverage: Option<u8>,
}

/// A reference text or fragment tagged with a license expression.
///
/// Rules are immutable once the index is built. Token-derived fields are
/// zero until then.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Unique name such as `mit.LICENSE` or `gpl-2.0_12.RULE`.
    pub identifier: String,

    /// `None` only for false-positive rules.
    pub license_expression: Option<String>,

    pub text: String,

    /// Token ids, assigned during indexing.
    pub tokens: Vec<u16>,

    pub is_license_text: bool,
    pub is_license_notice: bool,
    pub is_license_reference: bool,
    pub is_license_tag: bool,
    pub is_license_intro: bool,
    pub is_license_clue: bool,
    pub is_false_positive: bool,
    pub is_required_phrase: bool,

    /// Built from the text of a `.LICENSE` file.
    pub is_from_license: bool,

    /// Built in code (unknown and undetected rules), not loaded from the corpus.
    pub is_synthetic: bool,

    /// Matches must not contain unknown tokens inside their bounds.
    pub only_known_words: bool,

    /// The expression names an `unknown` license key.
    pub has_unknown: bool,

    /// 0-100 a priori confidence.
    pub relevance: u8,

    /// False when relevance was not declared and is computed from length.
    pub has_stored_relevance: bool,

    pub minimum_coverage: Option<u8>,

    /// Files this rule points to, as in "see LICENSE.txt".
    pub referenced_filenames: Vec<String>,

    pub notes: Option<String>,

    /// Rule token ranges that a partial match must include.
    pub required_phrase_spans: Vec<Range<usize>>,

    /// Number of tokens.
    pub length: usize,
    pub length_unique: usize,
    pub high_length: usize,
    pub high_length_unique: usize,

    pub min_matched_length: usize,
    pub min_high_matched_length: usize,
    pub min_matched_length_unique: usize,
    pub min_high_matched_length_unique: usize,

    pub is_small: bool,
    pub is_tiny: bool,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            license_expression: None,
            text: String::new(),
            tokens: Vec::new(),
            is_license_text: false,
            is_license_notice: false,
            is_license_reference: false,
            is_license_tag: false,
            is_license_intro: false,
            is_license_clue: false,
            is_false_positive: false,
            is_required_phrase: false,
            is_from_license: false,
            is_synthetic: false,
            only_known_words: false,
            has_unknown: false,
            relevance: 100,
            has_stored_relevance: false,
            minimum_coverage: None,
            referenced_filenames: Vec::new(),
            notes: None,
            required_phrase_spans: Vec::new(),
            length: 0,
            length_unique: 0,
            high_length: 0,
            high_length_unique: 0,
            min_matched_length: 0,
            min_high_matched_length: 0,
            min_matched_length_unique: 0,
            min_high_matched_length_unique: 0,
            is_small: false,
            is_tiny: false,
        }
    }
}

impl Rule {
    /// Create a rule for `license_expression` with default flags.
    pub fn new(
        identifier: impl Into<String>,
        license_expression: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            license_expression: Some(license_expression.into()),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Expression string, empty for false-positive rules without one.
    pub fn expression(&self) -> &str {
        self.license_expression.as_deref().unwrap_or("")
    }

    /// License keys of the expression. Empty if it does not parse.
    pub fn license_keys(&self) -> Vec<String> {
        parse_expression(self.expression())
            .map(|e| e.license_keys())
            .unwrap_or_default()
    }

    /// Rules that may be matched by the sequence matcher.
    ///
    /// Only meaningful once the index has computed `is_tiny` and `is_small`.
    pub fn is_approx_matchable(&self) -> bool {
        !(self.is_false_positive
            || self.is_required_phrase
            || self.is_tiny
            || self.is_synthetic
            || self.only_known_words
            || (self.is_small && (self.is_license_reference || self.is_license_tag)))
    }

    /// Link to the rule in the corpus, `None` for synthetic rules.
    pub fn rule_url(&self) -> Option<String> {
        if self.is_synthetic {
            return None;
        }
        if self.is_from_license {
            Some(format!("{CORPUS_BASE_URL}/licenses/{}", self.identifier))
        } else {
            Some(format!("{CORPUS_BASE_URL}/rules/{}", self.identifier))
        }
    }

    /// Short flag names set on this rule, for reports.
    pub fn kind_flags(&self) -> Vec<&'static str> {
        [
            (self.is_license_text, "is_license_text"),
            (self.is_license_notice, "is_license_notice"),
            (self.is_license_reference, "is_license_reference"),
            (self.is_license_tag, "is_license_tag"),
            (self.is_license_intro, "is_license_intro"),
            (self.is_license_clue, "is_license_clue"),
            (self.is_false_positive, "is_false_positive"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

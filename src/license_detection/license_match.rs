//! A candidate match between a region of a query and a rule.

use thiserror::Error;

use crate::license_detection::models::Rule;
use crate::license_detection::query::Query;
use crate::license_detection::spans::Span;

/// Exact match of a whole query to a whole rule by hash.
pub const MATCH_HASH: &str = "1-hash";
/// Exact match of an SPDX license identifier.
pub const MATCH_SPDX_ID: &str = "1-spdx-id";
/// Exact match of a whole rule by automaton.
pub const MATCH_AHO: &str = "2-aho";
/// Approximate match by sequence alignment.
pub const MATCH_SEQ: &str = "3-seq";
/// Placeholder match for declared license text that matched nothing.
pub const MATCH_UNDETECTED: &str = "5-undetected";
/// License-like text that matched no known rule.
pub const MATCH_UNKNOWN: &str = "6-unknown";

/// Merging two matches that do not share a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("cannot combine a match to rule {left} with a match to rule {right}")]
    RuleMismatch { left: String, right: String },
}

/// One correspondence between query positions and rule positions.
///
/// `qspan` and `ispan` always have the same length: the n-th query position
/// matched the n-th rule position. `hispan` is the legalese subset of
/// `ispan`.
#[derive(Debug, Clone)]
pub struct LicenseMatch<'a> {
    pub rid: usize,
    pub rule: &'a Rule,
    pub query: &'a Query,
    pub qspan: Span,
    pub ispan: Span,
    pub hispan: Span,
    /// One or more space-separated matcher tags, sorted.
    pub matcher: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl<'a> LicenseMatch<'a> {
    pub fn new(
        rid: usize,
        rule: &'a Rule,
        query: &'a Query,
        qspan: Span,
        ispan: Span,
        hispan: Span,
        matcher: &str,
    ) -> Self {
        let mut m = Self {
            rid,
            rule,
            query,
            qspan,
            ispan,
            hispan,
            matcher: matcher.to_string(),
            start_line: 0,
            end_line: 0,
        };
        m.set_lines();
        m
    }

    fn set_lines(&mut self) {
        self.start_line = self
            .qspan
            .start()
            .and_then(|p| self.query.line_for_pos(p))
            .unwrap_or(0);
        self.end_line = self
            .qspan
            .end()
            .and_then(|p| self.query.line_for_pos(p))
            .unwrap_or(0);
    }

    pub fn qstart(&self) -> usize {
        self.qspan.start().unwrap_or(0)
    }

    /// Last matched query position, inclusive.
    pub fn qend(&self) -> usize {
        self.qspan.end().unwrap_or(0)
    }

    pub fn istart(&self) -> usize {
        self.ispan.start().unwrap_or(0)
    }

    pub fn iend(&self) -> usize {
        self.ispan.end().unwrap_or(0)
    }

    /// Number of matched tokens.
    pub fn len(&self) -> usize {
        self.qspan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qspan.is_empty()
    }

    pub fn ilen(&self) -> usize {
        self.ispan.len()
    }

    /// Number of matched legalese tokens.
    pub fn hilen(&self) -> usize {
        self.hispan.len()
    }

    pub fn lines(&self) -> (usize, usize) {
        (self.start_line, self.end_line)
    }

    pub fn license_expression(&self) -> &str {
        self.rule.expression()
    }

    /// Length of the rule. A synthetic rule is as long as its match.
    pub fn rule_length(&self) -> usize {
        if self.rule.is_synthetic {
            self.ilen()
        } else {
            self.rule.length
        }
    }

    fn icoverage(&self) -> f64 {
        match self.rule_length() {
            0 => 0.0,
            rule_length => self.ilen() as f64 / rule_length as f64,
        }
    }

    /// Percentage of the rule tokens that were matched.
    pub fn coverage(&self) -> f64 {
        round2(self.icoverage() * 100.0)
    }

    /// Extent of the matched query region, unknown tokens inside included.
    pub fn qmagnitude(&self) -> usize {
        self.qspan.magnitude() + self.query.unknowns_within(&self.qspan)
    }

    /// Ratio of matched tokens to the query region they span.
    pub fn qdensity(&self) -> f64 {
        self.qspan.density()
    }

    pub fn idensity(&self) -> f64 {
        self.ispan.density()
    }

    /// Confidence of this match, from 0 to 100.
    ///
    /// The product of rule relevance, rule coverage and query coverage, where
    /// query coverage penalizes unmatched tokens inside the matched region.
    /// When both coverages are partial only rule coverage counts.
    pub fn score(&self) -> f64 {
        let relevance = f64::from(self.rule.relevance) / 100.0;
        if relevance == 0.0 {
            return 0.0;
        }
        let qmagnitude = self.qmagnitude();
        if qmagnitude == 0 {
            return 0.0;
        }
        let query_coverage = self.len() as f64 / qmagnitude as f64;
        let rule_coverage = self.icoverage();
        if query_coverage < 1.0 && rule_coverage < 1.0 {
            return round2(rule_coverage * relevance * 100.0);
        }
        round2(query_coverage * rule_coverage * relevance * 100.0)
    }

    /// Individual matcher tags of this match.
    pub fn matcher_tags(&self) -> impl Iterator<Item = &str> {
        self.matcher.split_whitespace()
    }

    /// True if any contributing matcher is the approximate one.
    pub fn is_approximate(&self) -> bool {
        self.matcher_tags().any(|t| t == MATCH_SEQ)
    }

    /// Rank of the best contributing matcher, lower is more exact.
    pub fn matcher_order(&self) -> u8 {
        self.matcher_tags()
            .filter_map(|t| t.split('-').next()?.parse().ok())
            .min()
            .unwrap_or(u8::MAX)
    }

    /// True if this match region contains `other` (positions, not extent).
    pub fn qcontains(&self, other: &LicenseMatch) -> bool {
        self.qspan.contains(&other.qspan)
    }

    /// True if both the query and rule extents of `other` are inside this one.
    pub fn surround(&self, other: &LicenseMatch) -> bool {
        self.qspan.surround(&other.qspan) && self.ispan.surround(&other.ispan)
    }

    /// True if `self` comes strictly after `other` on both sides.
    pub fn is_after(&self, other: &LicenseMatch) -> bool {
        self.qspan.is_after(&other.qspan) && self.ispan.is_after(&other.ispan)
    }

    pub fn qdistance_to(&self, other: &LicenseMatch) -> usize {
        self.qspan.distance_to(&other.qspan)
    }

    pub fn idistance_to(&self, other: &LicenseMatch) -> usize {
        self.ispan.distance_to(&other.ispan)
    }

    /// Number of query positions shared with `other`.
    pub fn overlap(&self, other: &LicenseMatch) -> usize {
        self.qspan.overlap(&other.qspan)
    }

    /// A new match covering both `self` and `other`.
    ///
    /// # Errors
    /// Returns `MatchError::RuleMismatch` if the matches have different rules.
    pub fn combine(&self, other: &LicenseMatch<'a>) -> Result<LicenseMatch<'a>, MatchError> {
        let mut combined = self.clone();
        combined.update(other)?;
        Ok(combined)
    }

    /// Extend `self` in place with the spans of `other`.
    ///
    /// # Errors
    /// Returns `MatchError::RuleMismatch` if the matches have different rules.
    pub fn update(&mut self, other: &LicenseMatch<'a>) -> Result<(), MatchError> {
        if self.rid != other.rid {
            return Err(MatchError::RuleMismatch {
                left: self.rule.identifier.clone(),
                right: other.rule.identifier.clone(),
            });
        }
        self.qspan.union_with(&other.qspan);
        self.ispan.union_with(&other.ispan);
        self.hispan.union_with(&other.hispan);
        self.matcher = union_matchers(&self.matcher, &other.matcher);
        self.set_lines();
        Ok(())
    }
}

fn union_matchers(left: &str, right: &str) -> String {
    let mut tags: Vec<&str> = left.split_whitespace().chain(right.split_whitespace()).collect();
    tags.sort_unstable();
    tags.dedup();
    tags.join(" ")
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

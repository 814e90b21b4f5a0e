//! License detection assembly.
//!
//! Refined matches are grouped by proximity into regions of a file. Each
//! group is classified by [`analyze_detection`] and becomes a
//! [`LicenseDetection`] carrying one combined license expression, a log of
//! how it was derived and a content-derived identifier.

use std::collections::HashSet;

use serde::Serialize;
use sha1::{Digest, Sha1};
use strum::{AsRefStr, EnumIter};
use uuid::Uuid;

use crate::license_detection::expression::{ParseError, combine_expressions, parse_expression};
use crate::license_detection::index::LicenseIndex;
use crate::license_detection::license_match::{
    LicenseMatch, MATCH_AHO, MATCH_HASH, MATCH_SPDX_ID, MATCH_UNDETECTED,
};
use crate::license_detection::matched_text::MatchedTextCache;
use crate::license_detection::records::{weighted_coverage, weighted_score};
use crate::license_detection::spans::Span;
use crate::license_detection::tokenize::tokenize;

/// Matches more than this many lines apart go to separate detections.
pub const LINES_THRESHOLD: usize = 4;

/// A group where no match covers more than this is reported as clues.
pub const CLUES_MATCH_COVERAGE_THR: f64 = 60.0;

/// Any match covering less than this makes a detection imperfect.
pub const IMPERFECT_MATCH_COVERAGE_THR: f64 = 100.0;

/// Short matches starting after this line are suspect.
pub const FALSE_POSITIVE_START_LINE_THRESHOLD: usize = 1000;

/// Rules this short or shorter are suspect late in a file.
pub const FALSE_POSITIVE_RULE_LENGTH_THRESHOLD: usize = 3;

/// Log entry of a clue promoted to a detection by [`process_detections`].
pub const NOT_LICENSE_CLUES: &str = "not-license-clues-as-more-detections-present";

/// Matcher tags whose matches are exact.
const EXACT_MATCHERS: [&str; 3] = [MATCH_HASH, MATCH_SPDX_ID, MATCH_AHO];

/// Rule identifier fragments of bare license mentions.
const BARE_RULES: [&str; 3] = ["gpl_bare", "freeware_bare", "public-domain_bare"];

/// How a group of matches was judged. The string form is the log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
pub enum DetectionCategory {
    #[strum(serialize = "perfect-detection")]
    PerfectDetection,
    #[strum(serialize = "undetected-license")]
    UndetectedLicense,
    #[strum(serialize = "unknown-intro-followed-by-match")]
    UnknownIntroBeforeDetection,
    #[strum(serialize = "unknown-reference-to-local-file")]
    UnknownFileReferenceLocal,
    #[strum(serialize = "possible-false-positive")]
    FalsePositive,
    #[strum(serialize = "unknown-match")]
    UnknownMatch,
    #[strum(serialize = "license-clues")]
    LicenseClues,
    #[strum(serialize = "imperfect-match-coverage")]
    ImperfectCoverage,
    #[strum(serialize = "extra-words")]
    ExtraWords,
}

/// How [`LicenseDetection::append`] updates the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionUpdate {
    /// Leave the expression as is.
    Keep,
    /// AND the match expression into the current one.
    Combine,
    /// Replace the expression with the match expression.
    Override,
}

/// Where a detection was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileRegion {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// One or more matches of one region combined into a single finding.
#[derive(Debug, Clone)]
pub struct LicenseDetection<'a> {
    /// Combined expression, `None` for clues and false positives.
    pub license_expression: Option<String>,
    pub license_expression_spdx: Option<String>,
    pub matches: Vec<LicenseMatch<'a>>,
    /// How the expression was derived, empty for a perfect detection.
    pub detection_log: Vec<String>,
    /// Slug of the expression and a UUID hashed from the match contents.
    pub identifier: String,
    pub file_region: Option<FileRegion>,
}

impl<'a> LicenseDetection<'a> {
    /// Classify a group of matches and build its detection.
    pub fn from_matches(
        matches: Vec<LicenseMatch<'a>>,
        package_license: bool,
        index: &LicenseIndex,
        cache: &MatchedTextCache<'_>,
    ) -> Result<Self, ParseError> {
        let category = analyze_detection(&matches, package_license);
        let license_expression = match category {
            DetectionCategory::FalsePositive | DetectionCategory::LicenseClues => None,
            DetectionCategory::UnknownIntroBeforeDetection => {
                let kept: Vec<&LicenseMatch<'a>> = matches.iter().filter(|m| !is_license_intro(m)).collect();
                if kept.is_empty() {
                    combined_expression(matches.iter())?
                } else {
                    combined_expression(kept.into_iter())?
                }
            }
            _ => combined_expression(matches.iter())?,
        };
        let detection_log = if category == DetectionCategory::PerfectDetection {
            Vec::new()
        } else {
            vec![category.as_ref().to_string()]
        };

        let mut detection = Self {
            license_expression,
            license_expression_spdx: None,
            matches,
            detection_log,
            identifier: String::new(),
            file_region: None,
        };
        detection.refresh(index, cache);
        Ok(detection)
    }

    /// An empty detection, filled by [`append`](Self::append).
    pub fn empty() -> Self {
        Self {
            license_expression: None,
            license_expression_spdx: None,
            matches: Vec::new(),
            detection_log: Vec::new(),
            identifier: detection_identifier(None, []),
            file_region: None,
        }
    }

    /// Add one match, optionally updating the expression.
    ///
    /// The first match of an empty detection always sets the expression.
    pub fn append(
        &mut self,
        license_match: LicenseMatch<'a>,
        reason: Option<&str>,
        update: ExpressionUpdate,
        index: &LicenseIndex,
        cache: &MatchedTextCache<'_>,
    ) -> Result<(), ParseError> {
        let update = if self.matches.is_empty() {
            ExpressionUpdate::Override
        } else {
            update
        };
        let match_expression = license_match.license_expression().to_string();
        self.matches.push(license_match);
        if let Some(reason) = reason {
            self.detection_log.push(reason.to_string());
        }

        match update {
            ExpressionUpdate::Keep => {}
            ExpressionUpdate::Override => {
                self.license_expression = (!match_expression.is_empty()).then_some(match_expression);
            }
            ExpressionUpdate::Combine => {
                let mut expressions: Vec<&str> = Vec::new();
                if let Some(current) = self.license_expression.as_deref() {
                    expressions.push(current);
                }
                if !match_expression.is_empty() {
                    expressions.push(&match_expression);
                }
                self.license_expression = combine_expressions(&expressions, true)?;
            }
        }
        self.refresh(index, cache);
        Ok(())
    }

    /// Recompute the SPDX expression and the identifier.
    fn refresh(&mut self, index: &LicenseIndex, cache: &MatchedTextCache<'_>) {
        self.license_expression_spdx = self
            .license_expression
            .as_deref()
            .and_then(|e| index.spdx_expression(e));
        self.identifier = self.compute_identifier(cache);
    }

    fn compute_identifier(&self, cache: &MatchedTextCache<'_>) -> String {
        let digests: Vec<String> = self
            .matches
            .iter()
            .map(|m| matched_text_digest(&m.matched_text(cache, false, false)))
            .collect();
        detection_identifier(
            self.license_expression.as_deref(),
            self.matches
                .iter()
                .zip(&digests)
                .map(|(m, digest)| (m.rule.identifier.as_str(), m.score(), digest.as_str())),
        )
    }

    /// Sum of the lengths of the matched rules.
    pub fn rules_length(&self) -> usize {
        self.matches.iter().map(|m| m.rule.length).sum()
    }

    pub fn score(&self) -> f64 {
        weighted_score(&self.matches)
    }

    pub fn coverage(&self) -> f64 {
        weighted_coverage(&self.matches)
    }

    /// Union of the query spans of all matches.
    pub fn qspans(&self) -> Span {
        let mut qspan = Span::new();
        for m in &self.matches {
            qspan.union_with(&m.qspan);
        }
        qspan
    }

    /// First and last line over all matches.
    pub fn lines(&self) -> (usize, usize) {
        let start = self.matches.iter().map(|m| m.start_line).min().unwrap_or(0);
        let end = self.matches.iter().map(|m| m.end_line).max().unwrap_or(0);
        (start, end)
    }

    pub fn file_region(&self, path: &str) -> FileRegion {
        let (start_line, end_line) = self.lines();
        FileRegion {
            path: path.to_string(),
            start_line,
            end_line,
        }
    }

    /// Matched text of every match, separated by blank lines.
    pub fn matched_text(&self, cache: &MatchedTextCache<'_>) -> String {
        self.matches
            .iter()
            .map(|m| m.matched_text(cache, false, false))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// AND of the rule expressions of `matches`, without duplicates.
fn combined_expression<'m, 'a: 'm>(
    matches: impl Iterator<Item = &'m LicenseMatch<'a>>,
) -> Result<Option<String>, ParseError> {
    let expressions: Vec<&str> = matches
        .map(|m| m.license_expression())
        .filter(|e| !e.is_empty())
        .collect();
    combine_expressions(&expressions, true)
}

/// Digest of the tokens of a matched text.
///
/// Formatting differences that tokenize alike give the same digest.
pub fn matched_text_digest(text: &str) -> String {
    format!("{:x}", Sha1::digest(tokenize(text).join(" ").as_bytes()))
}

/// Identifier of a detection: a slug of its expression and a UUID built from
/// `(rule identifier, score, matched text digest)` of each match.
pub fn detection_identifier<'m>(
    license_expression: Option<&str>,
    matches: impl IntoIterator<Item = (&'m str, f64, &'m str)>,
) -> String {
    let content: Vec<(&str, f64, &str)> = matches.into_iter().collect();
    let serialized = serde_json::to_string(&content).unwrap_or_default();
    let digest = Sha1::digest(serialized.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    format!("{}-{}", safe_name(license_expression.unwrap_or("none")), Uuid::from_bytes(bytes))
}

/// Lowercase `text` with every run of non-alphanumerics turned into `_`.
fn safe_name(text: &str) -> String {
    let mut name = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    name.trim_matches('_').to_string()
}

/// Split matches sorted by query position into groups of nearby matches.
///
/// A license intro stays attached to what follows it. A clue is always a
/// group of its own.
pub fn group_matches<'a>(matches: Vec<LicenseMatch<'a>>, lines_threshold: usize) -> Vec<Vec<LicenseMatch<'a>>> {
    let mut groups = Vec::new();
    let mut group: Vec<LicenseMatch<'a>> = Vec::new();

    for m in matches {
        let Some(previous) = group.last() else {
            group.push(m);
            continue;
        };
        if previous.rule.is_license_intro {
            group.push(m);
        } else if m.rule.is_license_intro {
            groups.push(std::mem::take(&mut group));
            group.push(m);
        } else if m.rule.is_license_clue {
            groups.push(std::mem::take(&mut group));
            groups.push(vec![m]);
        } else if m.start_line <= previous.end_line + lines_threshold {
            group.push(m);
        } else {
            groups.push(std::mem::take(&mut group));
            group.push(m);
        }
    }
    if !group.is_empty() {
        groups.push(group);
    }
    groups
}

/// Classify a group of matches. The first rule that applies wins.
pub fn analyze_detection(matches: &[LicenseMatch<'_>], package_license: bool) -> DetectionCategory {
    if is_undetected(matches) {
        DetectionCategory::UndetectedLicense
    } else if has_unknown_intro_before_detection(matches) {
        DetectionCategory::UnknownIntroBeforeDetection
    } else if matches.iter().any(|m| !m.rule.referenced_filenames.is_empty()) {
        DetectionCategory::UnknownFileReferenceLocal
    } else if !package_license && is_false_positive(matches) {
        DetectionCategory::FalsePositive
    } else if is_correct_detection(matches) {
        DetectionCategory::PerfectDetection
    } else if matches.iter().any(|m| m.rule.has_unknown) {
        DetectionCategory::UnknownMatch
    } else if matches.iter().all(|m| m.coverage() <= CLUES_MATCH_COVERAGE_THR) {
        DetectionCategory::LicenseClues
    } else if matches.iter().any(|m| m.coverage() < IMPERFECT_MATCH_COVERAGE_THR) {
        DetectionCategory::ImperfectCoverage
    } else if has_extra_words(matches) {
        DetectionCategory::ExtraWords
    } else {
        DetectionCategory::PerfectDetection
    }
}

fn is_undetected(matches: &[LicenseMatch<'_>]) -> bool {
    matches.len() == 1 && matches[0].matcher == MATCH_UNDETECTED
}

/// Exact matchers only, full coverage, no unknown rule.
fn is_correct_detection(matches: &[LicenseMatch<'_>]) -> bool {
    matches.iter().all(|m| {
        m.matcher_tags().all(|tag| EXACT_MATCHERS.contains(&tag))
            && m.coverage() == 100.0
            && !m.rule.has_unknown
    })
}

fn has_extra_words(matches: &[LicenseMatch<'_>]) -> bool {
    matches
        .iter()
        .any(|m| m.coverage() * f64::from(m.rule.relevance) / 100.0 - m.score() > 0.0)
}

fn is_false_positive(matches: &[LicenseMatch<'_>]) -> bool {
    if matches.is_empty() {
        return false;
    }
    let all_length_one = matches.iter().all(|m| m.rule.length == 1);

    let all_bare = matches
        .iter()
        .all(|m| BARE_RULES.iter().any(|bare| m.rule.identifier.contains(bare)));
    if all_bare && all_length_one {
        return true;
    }

    let all_gpl = matches.iter().all(|m| m.rule.identifier.contains("gpl"));
    if all_gpl && all_length_one {
        return true;
    }

    let start_line = matches.iter().map(|m| m.start_line).min().unwrap_or(0);
    if start_line > FALSE_POSITIVE_START_LINE_THRESHOLD
        && matches
            .iter()
            .any(|m| m.rule.length <= FALSE_POSITIVE_RULE_LENGTH_THRESHOLD)
    {
        return true;
    }

    matches.iter().all(|m| m.rule.is_license_tag) && all_length_one
}

/// An intro or clue to an unknown license.
fn is_unknown_intro(m: &LicenseMatch<'_>) -> bool {
    m.rule.has_unknown && (m.rule.is_license_intro || m.rule.is_license_clue)
}

/// An intro matched whole, dropped when a real detection follows it.
fn is_license_intro(m: &LicenseMatch<'_>) -> bool {
    (m.rule.is_license_intro || m.rule.is_license_clue || m.rule.expression() == "free-unknown")
        && (m.matcher_tags().any(|tag| tag == MATCH_AHO) || m.coverage() == 100.0)
}

fn has_unknown_intro_before_detection(matches: &[LicenseMatch<'_>]) -> bool {
    if matches.len() < 2 || matches.iter().all(is_unknown_intro) {
        return false;
    }
    let mut seen_intro = false;
    for m in matches {
        if is_unknown_intro(m) {
            seen_intro = true;
        } else if seen_intro && m.coverage() >= IMPERFECT_MATCH_COVERAGE_THR && !m.rule.has_unknown {
            return true;
        }
    }
    false
}

/// Promote clues whose licenses are all detected elsewhere in the file.
///
/// A file with a single detection is left as is.
pub fn process_detections(
    detections: &mut [LicenseDetection<'_>],
    index: &LicenseIndex,
    cache: &MatchedTextCache<'_>,
) -> Result<(), ParseError> {
    if detections.len() < 2 {
        return Ok(());
    }

    let mut detected_keys: HashSet<String> = HashSet::new();
    for expression in detections.iter().filter_map(|d| d.license_expression.as_deref()) {
        detected_keys.extend(parse_expression(expression)?.license_keys());
    }

    for detection in detections.iter_mut().filter(|d| d.license_expression.is_none()) {
        let Some(expression) = combined_expression(detection.matches.iter())? else {
            continue;
        };
        let keys = parse_expression(&expression)?.license_keys();
        if keys.iter().all(|k| detected_keys.contains(k)) {
            detection.license_expression = Some(expression);
            detection.detection_log.push(NOT_LICENSE_CLUES.to_string());
            detection.refresh(index, cache);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::license_match::{MATCH_SEQ, MATCH_UNKNOWN};
    use crate::license_detection::models::Rule;
    use crate::license_detection::query::Query;
    use crate::license_detection::test_utils::create_test_index_from_rules;
    use strum::IntoEnumIterator;

    fn rule(identifier: &str, expression: &str, text: &str) -> Rule {
        Rule {
            relevance: 100,
            has_stored_relevance: true,
            ..Rule::new(identifier, expression, text)
        }
    }

    /// A match of the whole rule `rid` starting at query position `qstart`.
    fn whole_match<'a>(
        index: &'a LicenseIndex,
        query: &'a Query,
        rid: usize,
        qstart: usize,
        matcher: &str,
    ) -> LicenseMatch<'a> {
        let rule = index.rule(rid);
        let qspan = Span::from_range(qstart..qstart + rule.length);
        let ispan = Span::from_range(0..rule.length);
        let hispan = index.hispan(rule, &ispan);
        LicenseMatch::new(rid, rule, query, qspan, ispan, hispan, matcher)
    }

    /// A match of the first `len` tokens of rule `rid`.
    fn partial_match<'a>(
        index: &'a LicenseIndex,
        query: &'a Query,
        rid: usize,
        qstart: usize,
        len: usize,
    ) -> LicenseMatch<'a> {
        let rule = index.rule(rid);
        let qspan = Span::from_range(qstart..qstart + len);
        let ispan = Span::from_range(0..len);
        let hispan = index.hispan(rule, &ispan);
        LicenseMatch::new(rid, rule, query, qspan, ispan, hispan, MATCH_SEQ)
    }

    fn lines_text(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn test_group_matches_by_line_distance() {
        let index = create_test_index_from_rules(vec![rule("mit.RULE", "mit", "mit license")]);
        let text = lines_text(&["mit license", "mit license", "", "", "", "", "", "", "mit license"]);
        let query = Query::new(&text, &index);
        let matches = vec![
            whole_match(&index, &query, 0, 0, MATCH_AHO),
            whole_match(&index, &query, 0, 2, MATCH_AHO),
            whole_match(&index, &query, 0, 4, MATCH_AHO),
        ];
        assert_eq!(matches[2].start_line, 9);

        let groups = group_matches(matches, LINES_THRESHOLD);
        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_group_matches_intro_and_clue() {
        let mut intro = rule("intro.RULE", "unknown", "licensed under");
        intro.is_license_intro = true;
        let mut clue = rule("clue.RULE", "mit", "mit");
        clue.is_license_clue = true;
        let index = create_test_index_from_rules(vec![
            rule("mit.RULE", "mit", "mit license"),
            intro,
            clue,
        ]);
        let query = Query::new("mit license licensed under mit license mit", &index);
        let matches = vec![
            whole_match(&index, &query, 0, 0, MATCH_AHO),
            whole_match(&index, &query, 1, 2, MATCH_AHO),
            whole_match(&index, &query, 0, 4, MATCH_AHO),
            whole_match(&index, &query, 2, 6, MATCH_AHO),
        ];
        let groups = group_matches(matches, LINES_THRESHOLD);
        let identifiers: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.iter().map(|m| m.rule.identifier.as_str()).collect())
            .collect();
        assert_eq!(
            identifiers,
            vec![vec!["mit.RULE"], vec!["intro.RULE", "mit.RULE"], vec!["clue.RULE"]]
        );
    }

    #[test]
    fn test_analyze_perfect_and_imperfect() {
        let index = create_test_index_from_rules(vec![rule(
            "mit.RULE",
            "mit",
            "permission is hereby granted free of charge to any person",
        )]);
        let query = Query::new("permission is hereby granted free of charge to any person", &index);

        let exact = whole_match(&index, &query, 0, 0, MATCH_AHO);
        assert_eq!(
            analyze_detection(std::slice::from_ref(&exact), false),
            DetectionCategory::PerfectDetection
        );

        let partial = partial_match(&index, &query, 0, 0, 8);
        assert_eq!(partial.coverage(), 80.0);
        assert_eq!(
            analyze_detection(&[partial], false),
            DetectionCategory::ImperfectCoverage
        );

        let clue = partial_match(&index, &query, 0, 0, 5);
        assert_eq!(analyze_detection(&[clue], false), DetectionCategory::LicenseClues);
    }

    #[test]
    fn test_analyze_package_license_skips_only_false_positive() {
        let index = create_test_index_from_rules(vec![rule("gpl_bare_1.RULE", "gpl-2.0", "gpl")]);
        let query = Query::new("gpl", &index);
        let m = whole_match(&index, &query, 0, 0, MATCH_AHO);

        assert_eq!(
            analyze_detection(std::slice::from_ref(&m), false),
            DetectionCategory::FalsePositive
        );
        assert_eq!(analyze_detection(&[m], true), DetectionCategory::PerfectDetection);
    }

    #[test]
    fn test_analyze_package_license_still_yields_clues() {
        let index = create_test_index_from_rules(vec![rule(
            "mit.RULE",
            "mit",
            "permission is hereby granted free of charge to any person",
        )]);
        let query = Query::new("permission is hereby granted free of charge to any person", &index);
        let clue = partial_match(&index, &query, 0, 0, 5);
        assert_eq!(analyze_detection(&[clue], true), DetectionCategory::LicenseClues);
    }

    #[test]
    fn test_analyze_late_short_match_is_false_positive() {
        let index = create_test_index_from_rules(vec![rule("mit_short.RULE", "mit", "mit license")]);
        let mut text = "\n".repeat(1200);
        text.push_str("mit license");
        let query = Query::new(&text, &index);
        let m = whole_match(&index, &query, 0, 0, MATCH_AHO);
        assert!(m.start_line > FALSE_POSITIVE_START_LINE_THRESHOLD);
        assert_eq!(analyze_detection(&[m], false), DetectionCategory::FalsePositive);
    }

    #[test]
    fn test_analyze_unknown_and_references() {
        let mut reference = rule("see_license.RULE", "mit", "see license file");
        reference.referenced_filenames = vec!["LICENSE".to_string()];
        let index = create_test_index_from_rules(vec![
            reference,
            rule("unknown_1.RULE", "unknown-license-reference", "license terms apply here"),
        ]);
        let query = Query::new("see license file license terms apply here", &index);

        let refers = whole_match(&index, &query, 0, 0, MATCH_AHO);
        assert_eq!(
            analyze_detection(&[refers], false),
            DetectionCategory::UnknownFileReferenceLocal
        );

        let unknown = whole_match(&index, &query, 1, 3, MATCH_AHO);
        assert!(unknown.rule.has_unknown);
        assert_eq!(analyze_detection(&[unknown], false), DetectionCategory::UnknownMatch);
    }

    #[test]
    fn test_analyze_unknown_intro_before_detection() {
        let mut intro = rule("license-intro_unknown.RULE", "unknown-license-reference", "released under");
        intro.is_license_intro = true;
        let index = create_test_index_from_rules(vec![
            intro,
            rule("apache.RULE", "apache-2.0", "apache license version 2.0"),
        ]);
        let query = Query::new("released under apache license version 2.0", &index);
        let matches = vec![
            whole_match(&index, &query, 0, 0, MATCH_AHO),
            whole_match(&index, &query, 1, 2, MATCH_AHO),
        ];
        assert_eq!(
            analyze_detection(&matches, false),
            DetectionCategory::UnknownIntroBeforeDetection
        );

        let cache = MatchedTextCache::new(&index.dictionary);
        let detection = LicenseDetection::from_matches(matches, false, &index, &cache).unwrap();
        assert_eq!(detection.license_expression.as_deref(), Some("apache-2.0"));
        assert_eq!(detection.detection_log, vec!["unknown-intro-followed-by-match"]);
        assert_eq!(detection.matches.len(), 2);
    }

    #[test]
    fn test_analyze_undetected_placeholder() {
        let index = create_test_index_from_rules(vec![rule("mit.RULE", "mit", "mit license")]);
        let query = Query::new("some custom terms", &index);
        let undetected = LicenseMatch::new(
            index.undetected_rid,
            index.undetected_rule(),
            &query,
            Span::new(),
            Span::new(),
            Span::new(),
            MATCH_UNDETECTED,
        );
        assert_eq!(
            analyze_detection(&[undetected], true),
            DetectionCategory::UndetectedLicense
        );
    }

    #[test]
    fn test_detection_identifier_is_stable() {
        let index = create_test_index_from_rules(vec![rule("mit.RULE", "mit", "mit license")]);
        let cache = MatchedTextCache::new(&index.dictionary);
        let first = Query::new("// MIT License", &index);
        let second = Query::new("#  mit   LICENSE\n", &index);

        let a = LicenseDetection::from_matches(
            vec![whole_match(&index, &first, 0, 0, MATCH_AHO)],
            false,
            &index,
            &cache,
        )
        .unwrap();
        let b = LicenseDetection::from_matches(
            vec![whole_match(&index, &second, 0, 0, MATCH_AHO)],
            false,
            &index,
            &cache,
        )
        .unwrap();

        assert_eq!(a.identifier, b.identifier);
        assert!(a.identifier.starts_with("mit-"));
        assert_eq!(a.identifier.len(), "mit-".len() + 36);
        assert!(a.detection_log.is_empty());
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("gpl-2.0 OR mit"), "gpl_2_0_or_mit");
        assert_eq!(safe_name("(apache-2.0)"), "apache_2_0");
    }

    #[test]
    fn test_append_combines_expressions() {
        let index = create_test_index_from_rules(vec![
            rule("mit.RULE", "mit", "mit license"),
            rule("apache.RULE", "apache-2.0", "apache license"),
        ]);
        let cache = MatchedTextCache::new(&index.dictionary);
        let query = Query::new("mit license apache license", &index);

        let mut detection = LicenseDetection::empty();
        detection
            .append(
                whole_match(&index, &query, 0, 0, MATCH_AHO),
                None,
                ExpressionUpdate::Combine,
                &index,
                &cache,
            )
            .unwrap();
        assert_eq!(detection.license_expression.as_deref(), Some("mit"));

        let before = detection.identifier.clone();
        detection
            .append(
                whole_match(&index, &query, 1, 2, MATCH_AHO),
                Some("appended"),
                ExpressionUpdate::Combine,
                &index,
                &cache,
            )
            .unwrap();
        assert_eq!(detection.license_expression.as_deref(), Some("mit AND apache-2.0"));
        assert_eq!(detection.detection_log, vec!["appended"]);
        assert_ne!(detection.identifier, before);
        assert_eq!(detection.rules_length(), 4);
        assert_eq!(detection.lines(), (1, 1));
        assert_eq!(detection.qspans(), Span::from_range(0..4));
    }

    #[test]
    fn test_process_detections_promotes_confirmed_clues() {
        let index = create_test_index_from_rules(vec![
            rule(
                "mit_full.RULE",
                "mit",
                "permission is hereby granted free of charge to any person",
            ),
            rule("bsd.RULE", "bsd-new", "redistribution and use in source and binary forms"),
        ]);
        let cache = MatchedTextCache::new(&index.dictionary);
        let text = lines_text(&[
            "permission is hereby granted free of charge to any person",
            "",
            "",
            "",
            "",
            "",
            "",
            "permission is hereby granted free",
            "",
            "",
            "",
            "",
            "",
            "",
            "redistribution and use",
        ]);
        let query = Query::new(&text, &index);
        let full = whole_match(&index, &query, 0, 0, MATCH_AHO);
        let mit_clue = partial_match(&index, &query, 0, 10, 5);
        let bsd_clue = partial_match(&index, &query, 1, 15, 3);

        let mut detections: Vec<LicenseDetection<'_>> = [vec![full], vec![mit_clue], vec![bsd_clue]]
            .into_iter()
            .map(|group| LicenseDetection::from_matches(group, false, &index, &cache).unwrap())
            .collect();
        assert_eq!(detections[1].license_expression, None);
        assert_eq!(detections[2].license_expression, None);

        process_detections(&mut detections, &index, &cache).unwrap();
        assert_eq!(detections[1].license_expression.as_deref(), Some("mit"));
        assert_eq!(
            detections[1].detection_log,
            vec!["license-clues", NOT_LICENSE_CLUES]
        );
        assert!(detections[1].identifier.starts_with("mit-"));
        assert_eq!(detections[2].license_expression, None);
    }

    #[test]
    fn test_unknown_matcher_tag_is_not_exact() {
        let index = create_test_index_from_rules(vec![rule("mit.RULE", "mit", "mit license")]);
        let query = Query::new("mit license", &index);
        let m = whole_match(&index, &query, 0, 0, MATCH_UNKNOWN);
        assert!(!is_correct_detection(&[m]));
    }

    #[test]
    fn test_category_log_names() {
        let names: Vec<String> = DetectionCategory::iter().map(|c| c.as_ref().to_string()).collect();
        assert!(names.contains(&"possible-false-positive".to_string()));
        assert!(names.contains(&"unknown-intro-followed-by-match".to_string()));
        assert_eq!(names.len(), 9);
    }
}

//! Serialized form of matches and detections.
//!
//! Records are what the scanner writes out and what can be read back. A
//! rehydrated record answers the same questions as a live match through
//! [`MatchView`], with score and coverage taken as stored.

use serde::{Deserialize, Serialize};

use crate::license_detection::detection::{LicenseDetection, detection_identifier, matched_text_digest};
use crate::license_detection::index::LicenseIndex;
use crate::license_detection::license_match::{LicenseMatch, round2};
use crate::license_detection::matched_text::MatchedTextCache;

/// What a match reports, live or rehydrated.
pub trait MatchView {
    fn rule_identifier(&self) -> &str;
    fn license_expression(&self) -> &str;
    fn matcher(&self) -> &str;
    fn score(&self) -> f64;
    fn coverage(&self) -> f64;
    fn matched_length(&self) -> usize;
    fn rule_relevance(&self) -> u8;
    fn lines(&self) -> (usize, usize);
}

impl MatchView for LicenseMatch<'_> {
    fn rule_identifier(&self) -> &str {
        &self.rule.identifier
    }

    fn license_expression(&self) -> &str {
        self.rule.expression()
    }

    fn matcher(&self) -> &str {
        &self.matcher
    }

    fn score(&self) -> f64 {
        LicenseMatch::score(self)
    }

    fn coverage(&self) -> f64 {
        LicenseMatch::coverage(self)
    }

    fn matched_length(&self) -> usize {
        self.len()
    }

    fn rule_relevance(&self) -> u8 {
        self.rule.relevance
    }

    fn lines(&self) -> (usize, usize) {
        LicenseMatch::lines(self)
    }
}

/// Score of a group of matches: match scores weighted by match length.
pub fn weighted_score<M: MatchView>(matches: &[M]) -> f64 {
    weighted(matches, M::score)
}

/// Coverage of a group of matches, weighted like [`weighted_score`].
pub fn weighted_coverage<M: MatchView>(matches: &[M]) -> f64 {
    weighted(matches, M::coverage)
}

fn weighted<M: MatchView>(matches: &[M], value: impl Fn(&M) -> f64) -> f64 {
    let length: usize = matches.iter().map(MatchView::matched_length).sum();
    if length == 0 {
        return 0.0;
    }
    let total: f64 = matches
        .iter()
        .map(|m| value(m) * m.matched_length() as f64 / length as f64)
        .sum();
    round2(total).min(100.0)
}

/// One match as written to the scan output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub score: f64,
    pub start_line: usize,
    pub end_line: usize,
    pub matched_length: usize,
    pub match_coverage: f64,
    pub matcher: String,
    pub license_expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_expression_spdx: Option<String>,
    pub rule_identifier: String,
    pub rule_relevance: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// Token digest of the matched text, kept even when the text is not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text_digest: Option<String>,
}

impl MatchRecord {
    /// Snapshot a live match. The matched text is stored only with
    /// `include_text`; its digest always is.
    pub fn from_match(
        m: &LicenseMatch<'_>,
        index: &LicenseIndex,
        cache: &MatchedTextCache<'_>,
        include_text: bool,
    ) -> Self {
        let (start_line, end_line) = m.lines();
        let matched_text = m.matched_text(cache, false, false);
        let license_expression = m.license_expression().to_string();
        let license_expression_spdx = index.spdx_expression(&license_expression);
        Self {
            score: m.score(),
            start_line,
            end_line,
            matched_length: m.len(),
            match_coverage: m.coverage(),
            matcher: m.matcher.clone(),
            license_expression,
            license_expression_spdx,
            rule_identifier: m.rule.identifier.clone(),
            rule_relevance: m.rule.relevance,
            rule_url: m.rule.rule_url(),
            matched_text_digest: Some(matched_text_digest(&matched_text)),
            matched_text: include_text.then_some(matched_text),
        }
    }

    /// Stored digest, or one computed from the stored text.
    fn text_digest(&self) -> Option<String> {
        self.matched_text_digest
            .clone()
            .or_else(|| self.matched_text.as_deref().map(matched_text_digest))
    }
}

impl MatchView for MatchRecord {
    fn rule_identifier(&self) -> &str {
        &self.rule_identifier
    }

    fn license_expression(&self) -> &str {
        &self.license_expression
    }

    fn matcher(&self) -> &str {
        &self.matcher
    }

    fn score(&self) -> f64 {
        self.score
    }

    fn coverage(&self) -> f64 {
        self.match_coverage
    }

    fn matched_length(&self) -> usize {
        self.matched_length
    }

    fn rule_relevance(&self) -> u8 {
        self.rule_relevance
    }

    fn lines(&self) -> (usize, usize) {
        (self.start_line, self.end_line)
    }
}

/// One detection as written to the scan output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub license_expression: Option<String>,
    #[serde(default)]
    pub license_expression_spdx: Option<String>,
    pub matches: Vec<MatchRecord>,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detection_log: Vec<String>,
}

impl DetectionRecord {
    /// Snapshot a live detection. With `include_text` every match carries
    /// its matched text.
    pub fn from_detection(
        detection: &LicenseDetection<'_>,
        index: &LicenseIndex,
        cache: &MatchedTextCache<'_>,
        include_text: bool,
    ) -> Self {
        Self {
            license_expression: detection.license_expression.clone(),
            license_expression_spdx: detection.license_expression_spdx.clone(),
            matches: detection
                .matches
                .iter()
                .map(|m| MatchRecord::from_match(m, index, cache, include_text))
                .collect(),
            identifier: detection.identifier.clone(),
            detection_log: detection.detection_log.clone(),
        }
    }

    pub fn score(&self) -> f64 {
        weighted_score(&self.matches)
    }

    pub fn coverage(&self) -> f64 {
        weighted_coverage(&self.matches)
    }

    /// First and last line over all matches.
    pub fn lines(&self) -> (usize, usize) {
        let start = self.matches.iter().map(|m| m.start_line).min().unwrap_or(0);
        let end = self.matches.iter().map(|m| m.end_line).max().unwrap_or(0);
        (start, end)
    }

    /// Identifier computed from the stored fields.
    ///
    /// `None` if a match carries neither its matched text nor its digest.
    pub fn recompute_identifier(&self) -> Option<String> {
        let digests = self
            .matches
            .iter()
            .map(MatchRecord::text_digest)
            .collect::<Option<Vec<String>>>()?;
        Some(detection_identifier(
            self.license_expression.as_deref(),
            self.matches
                .iter()
                .zip(&digests)
                .map(|(m, digest)| (m.rule_identifier.as_str(), m.score, digest.as_str())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::LicenseDetectionEngine;
    use crate::license_detection::test_utils::{MIT_GRANT, create_test_index};

    #[test]
    fn test_detection_record_round_trip() {
        let engine = LicenseDetectionEngine::from_index(create_test_index(&[("mit_1.RULE", "mit", MIT_GRANT)]));
        let text = format!("Header line\n{MIT_GRANT}\n");
        let query = engine.query(&text);
        let detections = engine
            .detect_licenses(&query, &Default::default())
            .expect("detection should succeed");
        assert_eq!(detections.len(), 1);

        let cache = MatchedTextCache::new(&engine.index().dictionary);
        let record = DetectionRecord::from_detection(&detections[0], engine.index(), &cache, true);
        let json = serde_json::to_string(&record).unwrap();
        let rehydrated: DetectionRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(rehydrated, record);
        assert_eq!(rehydrated.recompute_identifier().as_deref(), Some(detections[0].identifier.as_str()));
        assert_eq!(rehydrated.score(), weighted_score(&detections[0].matches));
        assert_eq!(rehydrated.coverage(), 100.0);
        assert_eq!(rehydrated.lines(), (2, 2));
    }

    #[test]
    fn test_detection_record_round_trip_without_text() {
        let engine = LicenseDetectionEngine::from_index(create_test_index(&[("mit_1.RULE", "mit", MIT_GRANT)]));
        let text = format!("Header line\n{MIT_GRANT}\n");
        let query = engine.query(&text);
        let detections = engine
            .detect_licenses(&query, &Default::default())
            .expect("detection should succeed");

        let cache = MatchedTextCache::new(&engine.index().dictionary);
        let record = DetectionRecord::from_detection(&detections[0], engine.index(), &cache, false);
        assert!(record.matches.iter().all(|m| m.matched_text.is_none()));

        let json = serde_json::to_string(&record).unwrap();
        let rehydrated: DetectionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rehydrated.recompute_identifier().as_deref(), Some(record.identifier.as_str()));
    }

    #[test]
    fn test_recompute_identifier_needs_text_or_digest() {
        let engine = LicenseDetectionEngine::from_index(create_test_index(&[("mit_1.RULE", "mit", MIT_GRANT)]));
        let query = engine.query(MIT_GRANT);
        let detections = engine.detect_licenses(&query, &Default::default()).unwrap();
        let cache = MatchedTextCache::new(&engine.index().dictionary);

        let mut with_text = DetectionRecord::from_detection(&detections[0], engine.index(), &cache, true);
        for m in &mut with_text.matches {
            m.matched_text_digest = None;
        }
        assert_eq!(with_text.recompute_identifier().as_deref(), Some(detections[0].identifier.as_str()));

        for m in &mut with_text.matches {
            m.matched_text = None;
        }
        assert!(with_text.recompute_identifier().is_none());
    }

    #[test]
    fn test_match_record_field_names() {
        let record = MatchRecord {
            score: 100.0,
            start_line: 1,
            end_line: 2,
            matched_length: 3,
            match_coverage: 100.0,
            matcher: "2-aho".to_string(),
            license_expression: "mit".to_string(),
            license_expression_spdx: Some("MIT".to_string()),
            rule_identifier: "mit.RULE".to_string(),
            rule_relevance: 100,
            rule_url: None,
            matched_text: None,
            matched_text_digest: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "score",
                "start_line",
                "end_line",
                "matched_length",
                "match_coverage",
                "matcher",
                "license_expression",
                "license_expression_spdx",
                "rule_identifier",
                "rule_relevance",
            ]
        );
    }

    #[test]
    fn test_weighted_score_of_records() {
        let base = MatchRecord {
            score: 100.0,
            start_line: 1,
            end_line: 1,
            matched_length: 30,
            match_coverage: 100.0,
            matcher: "2-aho".to_string(),
            license_expression: "mit".to_string(),
            license_expression_spdx: None,
            rule_identifier: "a.RULE".to_string(),
            rule_relevance: 100,
            rule_url: None,
            matched_text: None,
            matched_text_digest: None,
        };
        let weak = MatchRecord {
            score: 50.0,
            matched_length: 10,
            match_coverage: 50.0,
            ..base.clone()
        };
        assert_eq!(weighted_score(&[base.clone(), weak]), 87.5);
        assert_eq!(weighted_score::<MatchRecord>(&[]), 0.0);
    }
}

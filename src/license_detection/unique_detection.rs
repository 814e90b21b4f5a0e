//! Codebase-level deduplication of detections.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::license_detection::detection::FileRegion;
use crate::license_detection::records::{DetectionRecord, MatchRecord};

/// Detections sharing one identifier across a whole scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueDetection {
    pub identifier: String,
    pub license_expression: Option<String>,
    pub license_expression_spdx: Option<String>,
    pub detection_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detection_log: Vec<String>,
    /// Matches of the first detection seen.
    #[serde(rename = "reference_matches")]
    pub matches: Vec<MatchRecord>,
    pub file_regions: Vec<FileRegion>,
}

impl UniqueDetection {
    fn first(path: &str, detection: &DetectionRecord) -> Self {
        let (start_line, end_line) = detection.lines();
        Self {
            identifier: detection.identifier.clone(),
            license_expression: detection.license_expression.clone(),
            license_expression_spdx: detection.license_expression_spdx.clone(),
            detection_count: 1,
            detection_log: detection.detection_log.clone(),
            matches: detection.matches.clone(),
            file_regions: vec![FileRegion {
                path: path.to_string(),
                start_line,
                end_line,
            }],
        }
    }

    fn add(&mut self, path: &str, detection: &DetectionRecord) {
        let (start_line, end_line) = detection.lines();
        self.detection_count += 1;
        for entry in &detection.detection_log {
            if !self.detection_log.contains(entry) {
                self.detection_log.push(entry.clone());
            }
        }
        self.file_regions.push(FileRegion {
            path: path.to_string(),
            start_line,
            end_line,
        });
    }

    /// Group `(path, detection)` pairs by identifier, sorted by identifier.
    ///
    /// The expression of a group is the one of its first detection; equal
    /// identifiers always carry equal expressions.
    pub fn get_unique_detections<'r>(
        detections: impl IntoIterator<Item = (&'r str, &'r DetectionRecord)>,
    ) -> Vec<UniqueDetection> {
        let mut by_identifier: BTreeMap<&'r str, UniqueDetection> = BTreeMap::new();
        for (path, detection) in detections {
            by_identifier
                .entry(detection.identifier.as_str())
                .and_modify(|unique| unique.add(path, detection))
                .or_insert_with(|| UniqueDetection::first(path, detection));
        }
        by_identifier
            .into_values()
            .map(|mut unique| {
                unique.file_regions.sort_by(|a, b| {
                    a.path
                        .cmp(&b.path)
                        .then(a.start_line.cmp(&b.start_line))
                        .then(a.end_line.cmp(&b.end_line))
                });
                unique
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identifier: &str, expression: &str, start_line: usize) -> DetectionRecord {
        DetectionRecord {
            license_expression: Some(expression.to_string()),
            license_expression_spdx: None,
            matches: vec![MatchRecord {
                score: 100.0,
                start_line,
                end_line: start_line + 2,
                matched_length: 12,
                match_coverage: 100.0,
                matcher: "2-aho".to_string(),
                license_expression: expression.to_string(),
                license_expression_spdx: None,
                rule_identifier: format!("{expression}.RULE"),
                rule_relevance: 100,
                rule_url: None,
                matched_text: None,
                matched_text_digest: None,
            }],
            identifier: identifier.to_string(),
            detection_log: Vec::new(),
        }
    }

    #[test]
    fn test_get_unique_detections_groups_by_identifier() {
        let mit_a = record("mit-1", "mit", 1);
        let mit_b = record("mit-1", "mit", 10);
        let mut apache = record("apache_2_0-2", "apache-2.0", 3);
        apache.detection_log = vec!["extra-words".to_string()];

        let unique = UniqueDetection::get_unique_detections([
            ("src/b.rs", &mit_b),
            ("src/a.rs", &mit_a),
            ("src/a.rs", &apache),
        ]);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].identifier, "apache_2_0-2");
        assert_eq!(unique[0].detection_log, vec!["extra-words"]);

        let mit = &unique[1];
        assert_eq!(mit.detection_count, 2);
        assert_eq!(mit.license_expression.as_deref(), Some("mit"));
        assert_eq!(
            mit.file_regions,
            vec![
                FileRegion {
                    path: "src/a.rs".to_string(),
                    start_line: 1,
                    end_line: 3
                },
                FileRegion {
                    path: "src/b.rs".to_string(),
                    start_line: 10,
                    end_line: 12
                },
            ]
        );
    }

    #[test]
    fn test_unique_detection_serializes_reference_matches() {
        let mit = record("mit-1", "mit", 1);
        let unique = UniqueDetection::get_unique_detections([("LICENSE", &mit)]);
        let value = serde_json::to_value(&unique[0]).unwrap();
        assert!(value.get("reference_matches").is_some());
        assert!(value.get("detection_log").is_none());
        assert_eq!(value["detection_count"], 1);
    }
}

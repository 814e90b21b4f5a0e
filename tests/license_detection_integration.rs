use std::fs;
use std::path::Path;

use license_detector::license_detection::{DetectOptions, DetectionCategory, LicenseDetectionEngine};
use license_detector::license_detection::index::build_index;
use license_detector::license_detection::license_match::{MATCH_AHO, MATCH_HASH, MATCH_SEQ};
use license_detector::license_detection::models::Rule;

const RULES_PATH: &str = "testdata/license-rules";

fn engine() -> LicenseDetectionEngine {
    LicenseDetectionEngine::new(Path::new(RULES_PATH)).expect("fixture corpus should load")
}

#[test]
fn test_engine_loads_fixture_corpus() {
    let engine = engine();
    let index = engine.index();

    // three license texts plus six rule files
    assert_eq!(index.corpus_rules_count(), 9);
    assert_eq!(index.license("mit").map(|l| l.name.as_str()), Some("MIT License"));
    assert_eq!(
        index.license_by_spdx_key("Apache-2.0").unwrap().map(|l| l.key.as_str()),
        Some("apache-2.0")
    );
    assert_eq!(
        index.spdx_expression("mit OR apache-2.0").as_deref(),
        Some("MIT OR Apache-2.0")
    );
}

#[test]
fn test_full_license_text_is_a_hash_match() {
    let engine = engine();
    let text = fs::read_to_string("testdata/scan-tree/LICENSE").unwrap();
    let query = engine.query(&text);
    let detections = engine.detect_licenses(&query, &DetectOptions::default()).unwrap();

    assert_eq!(detections.len(), 1);
    let detection = &detections[0];
    assert_eq!(detection.license_expression.as_deref(), Some("mit"));
    assert_eq!(detection.license_expression_spdx.as_deref(), Some("MIT"));
    assert!(detection.detection_log.is_empty());
    assert_eq!(detection.matches.len(), 1);
    assert_eq!(detection.matches[0].matcher, MATCH_HASH);
    assert_eq!(detection.matches[0].rule.identifier, "mit.LICENSE");
    assert_eq!(detection.score(), 100.0);
}

#[test]
fn test_notice_in_source_file() {
    let engine = engine();
    let text = fs::read_to_string("testdata/scan-tree/src/lib.rs").unwrap();
    let query = engine.query(&text);
    let detections = engine.detect_licenses(&query, &DetectOptions::default()).unwrap();

    assert_eq!(detections.len(), 1);
    let detection = &detections[0];
    assert_eq!(detection.license_expression.as_deref(), Some("apache-2.0"));
    assert_eq!(detection.matches[0].matcher, MATCH_AHO);
    assert_eq!(detection.matches[0].rule.identifier, "apache-2.0_notice.RULE");
    assert_eq!(detection.lines(), (1, 11));
    assert_eq!(detection.coverage(), 100.0);
}

#[test]
fn test_declared_license_statement() {
    let engine = engine();
    let query = engine.query("MIT OR Apache-2.0");
    let options = DetectOptions {
        package_license: true,
        ..DetectOptions::default()
    };
    let detections = engine.detect_licenses(&query, &options).unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].license_expression.as_deref(), Some("mit OR apache-2.0"));
    assert_eq!(detections[0].matches[0].rule.identifier, "mit_or_apache-2.0_tag.RULE");
}

#[test]
fn test_unmatched_declared_license_is_undetected() {
    let engine = engine();
    let query = engine.query("Proprietary EULA negotiated privately");
    let options = DetectOptions {
        package_license: true,
        ..DetectOptions::default()
    };
    let detections = engine.detect_licenses(&query, &options).unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].license_expression.as_deref(), Some("unknown"));
    assert_eq!(
        detections[0].detection_log,
        vec![DetectionCategory::UndetectedLicense.as_ref().to_string()]
    );
}

#[test]
fn test_text_without_license_has_no_detection() {
    let engine = engine();
    let query = engine.query("fn main() {\n    println!(\"hello\");\n}\n");
    let detections = engine.detect_licenses(&query, &DetectOptions::default()).unwrap();
    assert!(detections.is_empty());
}

#[test]
fn test_paraphrased_text_matches_the_containing_rule() {
    let engine = engine();
    let original = fs::read_to_string("testdata/license-rules/licenses/bsd-new.LICENSE").unwrap();
    let text = original
        .split("---")
        .last()
        .unwrap()
        .replace("without\nspecific prior written permission", "without\nspecific prior signed permission");
    let query = engine.query(&text);
    let detections = engine.detect_licenses(&query, &DetectOptions::default()).unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].license_expression.as_deref(), Some("bsd-new"));
    assert_eq!(detections[0].matches[0].matcher, MATCH_SEQ);
    assert!(detections[0].coverage() < 100.0);
}

#[test]
fn test_containing_rule_beats_exact_contained_phrase() {
    let index = build_index(
        vec![
            Rule::new("short.RULE", "bsd-simplified", "Redistribution and use permitted."),
            Rule::new(
                "long.RULE",
                "bsd-new",
                "Redistribution and use permitted in source and binary forms provided that the \
                 copyright notice is retained and prior written permission is obtained before any \
                 distribution.",
            ),
        ],
        Vec::new(),
    )
    .unwrap();
    let engine = LicenseDetectionEngine::from_index(index);
    let query = engine.query(
        "Redistribution and use permitted in source and binary forms provided that the \
         copyright notice is retained and prior signed permission is obtained before any \
         distribution.",
    );
    let detections = engine.detect_licenses(&query, &DetectOptions::default()).unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].license_expression.as_deref(), Some("bsd-new"));
    assert_eq!(detections[0].matches.len(), 1);
    assert_eq!(detections[0].matches[0].rule.identifier, "long.RULE");
}

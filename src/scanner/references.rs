//! Codebase-level summaries of a scan.

use std::collections::{BTreeSet, HashMap};

use crate::license_detection::UniqueDetection;
use crate::license_detection::expression::parse_expression;
use crate::license_detection::index::LicenseIndex;
use crate::license_detection::models::Rule;
use crate::models::{FileInfo, LicenseReference, LicenseRuleReference};

/// Detections of all files, one entry per identifier.
pub fn unique_detections(files: &[FileInfo]) -> Vec<UniqueDetection> {
    UniqueDetection::get_unique_detections(
        files
            .iter()
            .flat_map(|file| file.all_detections().map(move |d| (file.path.as_str(), d))),
    )
}

/// Licenses named by any detection, sorted by key.
pub fn license_references(files: &[FileInfo], index: &LicenseIndex) -> Vec<LicenseReference> {
    let keys: BTreeSet<String> = files
        .iter()
        .flat_map(FileInfo::all_detections)
        .filter_map(|d| d.license_expression.as_deref())
        .filter_map(|e| parse_expression(e).ok())
        .flat_map(|e| e.license_keys())
        .collect();

    keys.iter()
        .filter_map(|key| index.license(key))
        .map(|license| LicenseReference {
            key: license.key.clone(),
            name: license.name.clone(),
            short_name: license.short_name.clone(),
            spdx_license_key: license.spdx_license_key.clone(),
            category: license.category.clone(),
        })
        .collect()
}

/// Rules matched anywhere in the scan, sorted by identifier.
pub fn rule_references(files: &[FileInfo], index: &LicenseIndex) -> Vec<LicenseRuleReference> {
    let identifiers: BTreeSet<&str> = files
        .iter()
        .flat_map(FileInfo::all_matches)
        .map(|m| m.rule_identifier.as_str())
        .collect();
    let rules_by_identifier: HashMap<&str, &Rule> = index
        .rules_by_rid
        .iter()
        .map(|rule| (rule.identifier.as_str(), rule))
        .collect();

    identifiers
        .into_iter()
        .filter_map(|identifier| rules_by_identifier.get(identifier))
        .map(|rule| LicenseRuleReference {
            identifier: rule.identifier.clone(),
            license_expression: rule.license_expression.clone(),
            relevance: rule.relevance,
            rule_url: rule.rule_url(),
            is_license_text: rule.is_license_text,
            is_license_notice: rule.is_license_notice,
            is_license_reference: rule.is_license_reference,
            is_license_tag: rule.is_license_tag,
            is_license_clue: rule.is_license_clue,
            is_license_intro: rule.is_license_intro,
            is_false_positive: rule.is_false_positive,
            is_synthetic: rule.is_synthetic,
        })
        .collect()
}

use serde::Serialize;

use super::FileInfo;
use crate::license_detection::UniqueDetection;

pub const OUTPUT_FORMAT_VERSION: &str = "4.0.0";

#[derive(Serialize, Debug)]
pub struct Output {
    pub headers: Vec<Header>,
    /// Detections of the whole scan, one entry per identifier.
    pub license_detections: Vec<UniqueDetection>,
    pub files: Vec<FileInfo>,
    pub license_references: Vec<LicenseReference>,
    pub license_rule_references: Vec<LicenseRuleReference>,
}

#[derive(Serialize, Debug)]
pub struct Header {
    pub start_timestamp: String,
    pub end_timestamp: String,
    pub duration: f64,
    pub extra_data: ExtraData,
    pub errors: Vec<String>,
    pub output_format_version: String,
}

#[derive(Serialize, Debug)]
pub struct ExtraData {
    pub files_count: usize,
    pub directories_count: usize,
    pub excluded_count: usize,
    pub license_rules_count: usize,
    pub system_environment: SystemEnvironment,
}

#[derive(Serialize, Debug)]
pub struct SystemEnvironment {
    pub operating_system: Option<String>,
    pub cpu_architecture: String,
    pub platform: String,
    pub rust_version: String,
}

/// A license named by at least one detection of the scan.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LicenseReference {
    pub key: String,
    pub name: String,
    pub short_name: Option<String>,
    pub spdx_license_key: Option<String>,
    pub category: Option<String>,
}

/// A rule matched at least once during the scan.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LicenseRuleReference {
    pub identifier: String,
    pub license_expression: Option<String>,
    pub relevance: u8,
    pub rule_url: Option<String>,
    pub is_license_text: bool,
    pub is_license_notice: bool,
    pub is_license_reference: bool,
    pub is_license_tag: bool,
    pub is_license_clue: bool,
    pub is_license_intro: bool,
    pub is_false_positive: bool,
    pub is_synthetic: bool,
}

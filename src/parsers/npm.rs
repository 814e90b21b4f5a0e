//! Declared license of a package.json manifest.
//!
//! Handles the `license` string, the legacy `license` object with a `type`
//! and the legacy `licenses` array.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use super::{PackageParser, file_name_is, package_data};
use crate::models::PackageData;

const FIELD_NAME: &str = "name";
const FIELD_VERSION: &str = "version";
const FIELD_LICENSE: &str = "license";
const FIELD_LICENSES: &str = "licenses";

pub struct NpmParser;

impl PackageParser for NpmParser {
    const PACKAGE_TYPE: &'static str = "npm";

    fn is_match(path: &Path) -> bool {
        file_name_is(path, "package.json")
    }

    fn extract_package_data(content: &str) -> Result<PackageData> {
        let json: Value = serde_json::from_str(content).context("Invalid package.json")?;
        let field = |key: &str| json.get(key).and_then(Value::as_str).map(String::from);

        Ok(package_data(
            Self::PACKAGE_TYPE,
            field(FIELD_NAME),
            field(FIELD_VERSION),
            extract_license_statement(&json),
        ))
    }
}

fn license_type(value: &Value) -> Option<&str> {
    value
        .as_str()
        .or_else(|| value.get("type").and_then(Value::as_str))
}

/// License statements, one per line.
fn extract_license_statement(json: &Value) -> Option<String> {
    let mut statements: Vec<&str> = Vec::new();
    if let Some(license) = json.get(FIELD_LICENSE).and_then(license_type) {
        statements.push(license);
    }
    if let Some(licenses) = json.get(FIELD_LICENSES).and_then(Value::as_array) {
        statements.extend(licenses.iter().filter_map(license_type));
    }
    (!statements.is_empty()).then(|| statements.join("\n"))
}

//! Declared license of a Cargo.toml manifest.

use anyhow::{Context, Result};
use std::path::Path;
use toml::{Table, Value};

use super::{PackageParser, file_name_is, package_data};
use crate::models::PackageData;

const FIELD_PACKAGE: &str = "package";
const FIELD_NAME: &str = "name";
const FIELD_VERSION: &str = "version";
const FIELD_LICENSE: &str = "license";
const FIELD_LICENSE_FILE: &str = "license-file";

pub struct CargoParser;

impl PackageParser for CargoParser {
    const PACKAGE_TYPE: &'static str = "cargo";

    fn is_match(path: &Path) -> bool {
        file_name_is(path, "Cargo.toml")
    }

    fn extract_package_data(content: &str) -> Result<PackageData> {
        let manifest: Table = toml::from_str(content).context("Invalid Cargo.toml")?;
        let package = manifest.get(FIELD_PACKAGE).and_then(Value::as_table);
        let field = |key: &str| {
            package
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(String::from)
        };

        // An inherited `license.workspace = true` is not a string and is skipped.
        let statement = field(FIELD_LICENSE).or_else(|| field(FIELD_LICENSE_FILE).map(|file| format!("see {file}")));

        Ok(package_data(
            Self::PACKAGE_TYPE,
            field(FIELD_NAME),
            field(FIELD_VERSION),
            statement,
        ))
    }
}

//! Package manifest parsers.
//!
//! A manifest is only read for its package identity and its declared license
//! statement. Detecting the license in that statement is left to the scanner.

mod cargo;
mod npm;

use std::path::Path;

use anyhow::Result;

use crate::models::PackageData;

/// Parser of one kind of package manifest.
///
/// Implementors provide:
/// - `PACKAGE_TYPE`: Package URL (purl) type identifier (e.g., "npm", "cargo")
/// - `is_match()`: True if the path is a manifest this parser reads
/// - `extract_package_data()`: Package data with the declared license statement
///   and no detection yet
pub trait PackageParser {
    const PACKAGE_TYPE: &'static str;

    fn is_match(path: &Path) -> bool;

    fn extract_package_data(content: &str) -> Result<PackageData>;
}

pub use self::cargo::CargoParser;
pub use self::npm::NpmParser;

macro_rules! define_parsers {
    ($($parser:ty),* $(,)?) => {
        /// Parse `content` with the first parser matching `path`.
        ///
        /// Returns `None` when `path` is not a known manifest.
        pub fn try_parse_file(path: &Path, content: &str) -> Option<Result<PackageData>> {
            $(
                if <$parser>::is_match(path) {
                    return Some(<$parser>::extract_package_data(content));
                }
            )*
            None
        }
    };
}

define_parsers! {
    CargoParser,
    NpmParser,
}

fn file_name_is(path: &Path, expected: &str) -> bool {
    path.file_name().is_some_and(|name| name == expected)
}

fn package_data(
    package_type: &str,
    name: Option<String>,
    version: Option<String>,
    extracted_license_statement: Option<String>,
) -> PackageData {
    PackageData {
        package_type: package_type.to_string(),
        name,
        version,
        extracted_license_statement,
        declared_license_expression: None,
        declared_license_expression_spdx: None,
        license_detections: Vec::new(),
    }
}

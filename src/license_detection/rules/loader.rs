//! Parse `.LICENSE` and `.RULE` files.
//!
//! Both file kinds hold YAML frontmatter between two `---` lines followed by
//! the text. A corpus directory has a `rules/` and a `licenses/` subdirectory.

use crate::license_detection::models::{License, Rule};
use anyhow::{Context, Result, anyhow, bail};
use log::warn;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Accept YAML booleans as well as `yes`/`no` strings.
fn deserialize_yes_no<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum YesNo {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<YesNo>::deserialize(deserializer)? {
        Some(YesNo::Bool(b)) => Some(b),
        Some(YesNo::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Some(true),
            "no" | "false" | "0" => Some(false),
            _ => None,
        },
        None => None,
    })
}

/// Accept integer or float percentages in 0..=100.
fn deserialize_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_yaml::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| {
        let value = n.as_f64()?;
        (0.0..=100.0).contains(&value).then_some(value as u8)
    }))
}

#[derive(Debug, Deserialize)]
struct LicenseFrontmatter {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    homepage_url: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    spdx_license_key: Option<String>,
    #[serde(default)]
    other_spdx_license_keys: Option<Vec<String>>,
    #[serde(default)]
    text_urls: Option<Vec<String>>,
    #[serde(default)]
    osi_url: Option<String>,
    #[serde(default)]
    other_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_deprecated: Option<bool>,
    #[serde(default)]
    replaced_by: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_exception: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_unknown: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_generic: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_percent")]
    minimum_coverage: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RuleFrontmatter {
    #[serde(default)]
    license_expression: Option<String>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_license_text: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_license_notice: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_license_reference: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_license_tag: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_license_intro: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_license_clue: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_false_positive: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_yes_no")]
    is_required_phrase: Option<bool>,
    #[serde(default, alias = "is_continuous", deserialize_with = "deserialize_yes_no")]
    only_known_words: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_percent")]
    relevance: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_percent")]
    minimum_coverage: Option<u8>,
    #[serde(default)]
    referenced_filenames: Option<Vec<String>>,
    #[serde(default)]
    notes: Option<String>,
}

/// Split `---` delimited frontmatter from the text that follows it.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.trim_start_matches('\u{feff}');
    let rest = rest.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn read_frontmatter_file(path: &Path) -> Result<(String, String)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let (yaml, text) = split_frontmatter(&content)
        .ok_or_else(|| anyhow!("Missing '---' frontmatter delimiters in {}", path.display()))?;
    Ok((yaml.to_string(), text.trim().to_string()))
}

pub fn parse_rule_file(path: &Path) -> Result<Rule> {
    let (yaml, text) = read_frontmatter_file(path)?;

    let identifier = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid rule file name: {}", path.display()))?
        .to_string();

    if text.is_empty() {
        bail!("Rule file has empty text: {}", path.display());
    }

    let fm: RuleFrontmatter = serde_yaml::from_str(&yaml)
        .with_context(|| format!("Failed to parse rule frontmatter in {}", path.display()))?;

    let is_false_positive = fm.is_false_positive.unwrap_or(false);
    let license_expression = fm.license_expression.filter(|e| !e.trim().is_empty());
    if license_expression.is_none() && !is_false_positive {
        bail!(
            "Rule file missing required field 'license_expression': {}",
            path.display()
        );
    }

    Ok(Rule {
        identifier,
        license_expression,
        text,
        is_license_text: fm.is_license_text.unwrap_or(false),
        is_license_notice: fm.is_license_notice.unwrap_or(false),
        is_license_reference: fm.is_license_reference.unwrap_or(false),
        is_license_tag: fm.is_license_tag.unwrap_or(false),
        is_license_intro: fm.is_license_intro.unwrap_or(false),
        is_license_clue: fm.is_license_clue.unwrap_or(false),
        is_false_positive,
        is_required_phrase: fm.is_required_phrase.unwrap_or(false),
        only_known_words: fm.only_known_words.unwrap_or(false),
        relevance: fm.relevance.unwrap_or(100),
        has_stored_relevance: fm.relevance.is_some(),
        minimum_coverage: fm.minimum_coverage,
        referenced_filenames: fm.referenced_filenames.unwrap_or_default(),
        notes: fm.notes.filter(|s| !s.trim().is_empty()),
        ..Rule::default()
    })
}

pub fn parse_license_file(path: &Path) -> Result<License> {
    let (yaml, text) = read_frontmatter_file(path)?;

    let fm: LicenseFrontmatter = serde_yaml::from_str(&yaml)
        .with_context(|| format!("Failed to parse license frontmatter in {}", path.display()))?;

    let key = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Cannot extract key from license file path: {}", path.display()))?;

    if let Some(fm_key) = &fm.key
        && fm_key != key
    {
        bail!(
            "License key mismatch: filename '{key}' vs frontmatter key '{fm_key}' in {}",
            path.display()
        );
    }

    let is_deprecated = fm.is_deprecated.unwrap_or(false);
    let is_unknown = fm.is_unknown.unwrap_or(false);
    let is_generic = fm.is_generic.unwrap_or(false);
    if text.is_empty() && !is_deprecated && !is_unknown && !is_generic {
        bail!(
            "License file has empty text and is not deprecated, unknown or generic: {}",
            path.display()
        );
    }

    let reference_urls = fm
        .text_urls
        .into_iter()
        .flatten()
        .chain(fm.other_urls.into_iter().flatten())
        .chain(fm.osi_url)
        .chain(fm.homepage_url)
        .collect();

    Ok(License {
        key: key.to_string(),
        name: fm
            .name
            .or_else(|| fm.short_name.clone())
            .unwrap_or_else(|| key.to_string()),
        short_name: fm.short_name,
        spdx_license_key: fm.spdx_license_key,
        other_spdx_license_keys: fm.other_spdx_license_keys.unwrap_or_default(),
        category: fm.category,
        text,
        reference_urls,
        notes: fm.notes.filter(|s| !s.trim().is_empty()),
        is_deprecated,
        replaced_by: fm.replaced_by.unwrap_or_default(),
        is_exception: fm.is_exception.unwrap_or(false),
        is_unknown,
        is_generic,
        minimum_coverage: fm.minimum_coverage,
    })
}

/// The full-text rule of a license, `None` for licenses without text.
pub fn license_to_rule(license: &License) -> Option<Rule> {
    if license.text.is_empty() || license.is_deprecated {
        return None;
    }
    Some(Rule {
        is_license_text: true,
        is_from_license: true,
        relevance: 100,
        has_stored_relevance: true,
        minimum_coverage: license.minimum_coverage,
        ..Rule::new(
            format!("{}.LICENSE", license.key),
            license.key.clone(),
            license.text.clone(),
        )
    })
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("Failed to read directory entry in: {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(extension) {
            paths.push(path);
        }
    }
    // Directory order is platform dependent; rule ids must not be.
    paths.sort();
    Ok(paths)
}

/// Load every `.RULE` file of `dir`.
///
/// In lenient mode an unparsable file is logged and skipped; in strict mode
/// it is an error.
pub fn load_rules_from_directory(dir: &Path, strict: bool) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for path in files_with_extension(dir, "RULE")? {
        match parse_rule_file(&path) {
            Ok(rule) => rules.push(rule),
            Err(e) if strict => return Err(e),
            Err(e) => warn!("Skipping rule file {}: {e:#}", path.display()),
        }
    }
    validate_rules(&rules);
    Ok(rules)
}

/// Load every `.LICENSE` file of `dir`.
pub fn load_licenses_from_directory(dir: &Path, strict: bool) -> Result<Vec<License>> {
    let mut licenses = Vec::new();
    for path in files_with_extension(dir, "LICENSE")? {
        match parse_license_file(&path) {
            Ok(license) => licenses.push(license),
            Err(e) if strict => return Err(e),
            Err(e) => warn!("Skipping license file {}: {e:#}", path.display()),
        }
    }
    Ok(licenses)
}

/// Load a corpus root holding `rules/` and `licenses/`.
///
/// Returns all rules, license text rules first, and all licenses.
pub fn load_corpus(root: &Path, strict: bool) -> Result<(Vec<Rule>, Vec<License>)> {
    let licenses_dir = root.join("licenses");
    let rules_dir = root.join("rules");

    let licenses = if licenses_dir.is_dir() {
        load_licenses_from_directory(&licenses_dir, strict)?
    } else {
        Vec::new()
    };
    let mut rules: Vec<Rule> = licenses.iter().filter_map(license_to_rule).collect();
    if rules_dir.is_dir() {
        rules.extend(load_rules_from_directory(&rules_dir, strict)?);
    }

    if rules.is_empty() {
        bail!("No rules found under {}", root.display());
    }
    Ok((rules, licenses))
}

/// Warn about duplicate rule texts.
fn validate_rules(rules: &[Rule]) {
    let mut seen: HashSet<&str> = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.text.as_str()) {
            warn!("Duplicate rule text in {}", rule.identifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_split_frontmatter() {
        let (yaml, text) = split_frontmatter("---\nkey: mit\n---\nSome text\n--- more").unwrap();
        assert_eq!(yaml, "key: mit\n");
        assert_eq!(text, "Some text\n--- more");
        assert!(split_frontmatter("no frontmatter").is_none());
        assert!(split_frontmatter("---\nunterminated: yes\n").is_none());
    }

    #[test]
    fn test_parse_simple_rule_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mit_1.RULE");
        fs::write(
            &path,
            "---\nlicense_expression: mit\nis_license_reference: yes\nrelevance: 90\nreferenced_filenames:\n    - MIT.txt\n---\nSee MIT.txt\n",
        )
        .unwrap();

        let rule = parse_rule_file(&path).unwrap();
        assert_eq!(rule.identifier, "mit_1.RULE");
        assert_eq!(rule.expression(), "mit");
        assert_eq!(rule.text, "See MIT.txt");
        assert!(rule.is_license_reference);
        assert_eq!(rule.relevance, 90);
        assert!(rule.has_stored_relevance);
        assert_eq!(rule.referenced_filenames, vec!["MIT.txt"]);
    }

    #[test]
    fn test_parse_rule_flags_and_alias() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.RULE");
        fs::write(
            &path,
            "---\nlicense_expression: mit\nis_license_notice: true\nis_license_tag: no\nis_continuous: yes\nminimum_coverage: 70.5\n---\nMIT License\n",
        )
        .unwrap();

        let rule = parse_rule_file(&path).unwrap();
        assert!(rule.is_license_notice);
        assert!(!rule.is_license_tag);
        assert!(rule.only_known_words);
        assert_eq!(rule.minimum_coverage, Some(70));
        assert!(!rule.has_stored_relevance);
    }

    #[test]
    fn test_false_positive_rule_without_expression() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fp.RULE");
        fs::write(&path, "---\nis_false_positive: yes\n---\nGPL header files\n").unwrap();
        let rule = parse_rule_file(&path).unwrap();
        assert!(rule.is_false_positive);
        assert_eq!(rule.license_expression, None);
    }

    #[test]
    fn test_rule_without_expression_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.RULE");
        fs::write(&path, "---\nis_license_notice: yes\n---\ntext\n").unwrap();
        assert!(parse_rule_file(&path).is_err());
    }

    #[test]
    fn test_parse_license_file_and_rule() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mit.LICENSE");
        fs::write(
            &path,
            "---\nkey: mit\nshort_name: MIT License\nname: MIT License\ncategory: Permissive\nspdx_license_key: MIT\ntext_urls:\n    - https://opensource.org/licenses/MIT\n---\nPermission is hereby granted.\n",
        )
        .unwrap();

        let license = parse_license_file(&path).unwrap();
        assert_eq!(license.key, "mit");
        assert_eq!(license.spdx_license_key.as_deref(), Some("MIT"));
        assert_eq!(license.reference_urls, vec!["https://opensource.org/licenses/MIT"]);

        let rule = license_to_rule(&license).unwrap();
        assert_eq!(rule.identifier, "mit.LICENSE");
        assert!(rule.is_license_text);
        assert!(rule.is_from_license);
    }

    #[test]
    fn test_license_key_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mit.LICENSE");
        fs::write(&path, "---\nkey: bsd-new\n---\ntext\n").unwrap();
        assert!(parse_license_file(&path).is_err());
    }

    #[test]
    fn test_load_rules_lenient_and_strict() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.RULE"), "---\nlicense_expression: mit\n---\nMIT\n").unwrap();
        fs::write(dir.path().join("bad.RULE"), "no frontmatter").unwrap();
        fs::write(dir.path().join("ignored.txt"), "---\n---\n").unwrap();

        let rules = load_rules_from_directory(dir.path(), false).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].identifier, "good.RULE");

        assert!(load_rules_from_directory(dir.path(), true).is_err());
    }

    #[test]
    fn test_load_corpus() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("rules")).unwrap();
        fs::create_dir(dir.path().join("licenses")).unwrap();
        fs::write(
            dir.path().join("licenses").join("mit.LICENSE"),
            "---\nkey: mit\n---\nPermission is hereby granted.\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("rules").join("mit_1.RULE"),
            "---\nlicense_expression: mit\n---\nLicensed under MIT\n",
        )
        .unwrap();

        let (rules, licenses) = load_corpus(dir.path(), true).unwrap();
        assert_eq!(licenses.len(), 1);
        let ids: Vec<&str> = rules.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["mit.LICENSE", "mit_1.RULE"]);
    }

    #[test]
    fn test_load_corpus_empty_is_error() {
        let dir = tempdir().unwrap();
        assert!(load_corpus(dir.path(), false).is_err());
    }
}

//! License Detection Engine
//!
//! Finds license text in arbitrary input by matching it against a corpus of
//! license rules, then combines the matches into detections.
//!
//! The pipeline for one text:
//! 1. Tokenize the text into a [`Query`]
//! 2. Run the matchers in order: hash, automaton, sequence alignment
//! 3. Refine the raw matches: merge, filter contained, overlapping and weak matches
//! 4. Optionally match unknown license-like text and refine again
//! 5. Group matches by region and classify each group as a detection
//! 6. Promote clues confirmed by other detections of the same text

pub mod aho_match;
pub mod detection;
pub mod expression;
pub mod hash_match;
pub mod index;
pub mod license_match;
pub mod match_refine;
pub mod matched_text;
pub mod matcher;
pub mod models;
pub mod query;
pub mod records;
pub mod rules;
pub mod seq_match;
pub mod spans;
#[cfg(test)]
mod test_utils;
pub mod tokenize;
pub mod unique_detection;
pub mod unknown_match;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;

use crate::license_detection::detection::{LINES_THRESHOLD, group_matches, process_detections};
use crate::license_detection::expression::ParseError;
use crate::license_detection::index::{LicenseIndex, build_index};
use crate::license_detection::license_match::{MATCH_UNDETECTED, MatchError};
use crate::license_detection::match_refine::refine_matches;
use crate::license_detection::matcher::{MatchOptions, match_query};
use crate::license_detection::rules::load_corpus;
use crate::license_detection::spans::Span;

pub use detection::{DetectionCategory, FileRegion, LicenseDetection};
pub use license_match::LicenseMatch;
pub use matched_text::MatchedTextCache;
pub use query::Query;
pub use records::{DetectionRecord, MatchRecord, MatchView};
pub use unique_detection::UniqueDetection;

/// Options for detecting licenses in one text.
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    /// The text is a declared license: trust short matches and report text
    /// that matches nothing as undetected.
    pub package_license: bool,
    pub min_score: f64,
    pub deadline: Option<Instant>,
    pub unknown_licenses: bool,
}

impl DetectOptions {
    fn match_options(&self) -> MatchOptions {
        MatchOptions {
            min_score: self.min_score,
            deadline: self.deadline,
            unknown_licenses: self.unknown_licenses,
        }
    }
}

/// Failure while detecting licenses in one text.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("invalid license expression")]
    Expression(#[from] ParseError),
}

/// License detection engine owning a shared, read-only index.
///
/// Cloning is cheap: clones share the index.
#[derive(Debug, Clone)]
pub struct LicenseDetectionEngine {
    index: Arc<LicenseIndex>,
}

impl LicenseDetectionEngine {
    /// Load the corpus under `rules_path` and index it.
    ///
    /// # Arguments
    /// * `rules_path` - Directory holding `rules/` with `.RULE` files and
    ///   `licenses/` with `.LICENSE` files
    pub fn new(rules_path: &Path) -> Result<Self> {
        let started = Instant::now();
        let (rules, licenses) = load_corpus(rules_path, false)
            .with_context(|| format!("Failed to load license rules from {}", rules_path.display()))?;
        let index = build_index(rules, licenses).context("Failed to build license index")?;
        info!(
            "Indexed {} rules and {} licenses in {:?}",
            index.corpus_rules_count(),
            index.licenses_by_key.len(),
            started.elapsed()
        );
        Ok(Self::from_index(index))
    }

    pub fn from_index(index: LicenseIndex) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    pub fn index(&self) -> &LicenseIndex {
        &self.index
    }

    /// Tokenize `text` against the index dictionary.
    pub fn query(&self, text: &str) -> Query {
        Query::new(text, &self.index)
    }

    /// Refined matches of `query`, sorted by query position.
    pub fn match_text<'a>(
        &'a self,
        query: &'a Query,
        options: &MatchOptions,
    ) -> Result<Vec<LicenseMatch<'a>>, MatchError> {
        let raw = match_query(&self.index, query, options);
        let mut refined = refine_matches(raw, options.min_score)?;
        debug!(
            "Kept {} matches, discarded {}",
            refined.matches.len(),
            refined.discarded.len()
        );

        if options.unknown_licenses {
            let unknown = unknown_match::unknown_match(&self.index, query, &refined.matches);
            if !unknown.is_empty() {
                let mut all = refined.matches;
                all.extend(unknown);
                refined = refine_matches(all, options.min_score)?;
            }
        }
        Ok(refined.matches)
    }

    /// Detections of `query`, in the order they appear in the text.
    pub fn detect_licenses<'a>(
        &'a self,
        query: &'a Query,
        options: &DetectOptions,
    ) -> Result<Vec<LicenseDetection<'a>>, DetectionError> {
        let mut matches = self.match_text(query, &options.match_options())?;
        if matches.is_empty() && options.package_license && !query.text.trim().is_empty() {
            matches.push(self.undetected_match(query));
        }

        let cache = MatchedTextCache::new(&self.index.dictionary);
        let mut detections = group_matches(matches, LINES_THRESHOLD)
            .into_iter()
            .map(|group| LicenseDetection::from_matches(group, options.package_license, &self.index, &cache))
            .collect::<Result<Vec<_>, _>>()?;
        process_detections(&mut detections, &self.index, &cache)?;
        Ok(detections)
    }

    /// Placeholder match over the whole of a declared license that matched
    /// nothing.
    fn undetected_match<'a>(&'a self, query: &'a Query) -> LicenseMatch<'a> {
        let qspan = Span::from_range(0..query.len());
        let hispan = Span::from_iterator(qspan.iter().filter(|&pos| self.index.is_high(query.tokens[pos])));
        let mut m = LicenseMatch::new(
            self.index.undetected_rid,
            self.index.undetected_rule(),
            query,
            qspan.clone(),
            qspan,
            hispan,
            MATCH_UNDETECTED,
        );
        if m.is_empty() {
            m.start_line = 1;
            m.end_line = query.text.lines().count().max(1);
        }
        m
    }
}

//! Matching strategies and the driver running them in order.

use std::time::Instant;

use log::debug;

use crate::license_detection::aho_match::aho_match;
use crate::license_detection::hash_match::hash_match;
use crate::license_detection::index::LicenseIndex;
use crate::license_detection::license_match::{LicenseMatch, MATCH_AHO, MATCH_HASH, MATCH_SEQ};
use crate::license_detection::query::{Matchables, Query};
use crate::license_detection::seq_match::seq_match;

/// Options for matching one query.
#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    /// Matches scoring below this are dropped after refinement.
    pub min_score: f64,
    /// Soft time budget for the approximate matcher.
    pub deadline: Option<Instant>,
    /// Look for license-like text no rule matches.
    pub unknown_licenses: bool,
}

/// The matching strategies, from most to least exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Whole query equal to a whole rule.
    Hash,
    /// Whole rules found anywhere in the query.
    Automaton,
    /// Approximate alignment of candidate rules.
    Sequence,
}

impl Matcher {
    /// Every strategy, in the order they run.
    pub const ALL: [Matcher; 3] = [Matcher::Hash, Matcher::Automaton, Matcher::Sequence];

    pub fn tag(&self) -> &'static str {
        match self {
            Matcher::Hash => MATCH_HASH,
            Matcher::Automaton => MATCH_AHO,
            Matcher::Sequence => MATCH_SEQ,
        }
    }

    /// Run this strategy over the matchable positions of `query`.
    pub fn find<'a>(
        &self,
        index: &'a LicenseIndex,
        query: &'a Query,
        matchables: &Matchables,
        deadline: Option<Instant>,
    ) -> Vec<LicenseMatch<'a>> {
        let whole = query.whole_query_run();
        match self {
            Matcher::Hash => hash_match(index, query, &whole),
            Matcher::Automaton => aho_match(index, query, &whole, matchables),
            Matcher::Sequence => seq_match(index, query, matchables, deadline),
        }
    }
}

/// Raw, unrefined matches of `query` against `index`.
///
/// A hash match short-circuits the other strategies. Complete automaton
/// matches only decide whether the sequence matcher runs at all; their
/// positions stay available to it, and refinement keeps the larger match.
pub fn match_query<'a>(
    index: &'a LicenseIndex,
    query: &'a Query,
    options: &MatchOptions,
) -> Vec<LicenseMatch<'a>> {
    if query.is_empty() {
        return Vec::new();
    }

    let matchables = Matchables::new(query, index);
    let mut uncovered = matchables.clone();
    let whole = query.whole_query_run();
    let mut matches = Vec::new();

    for matcher in Matcher::ALL {
        if matcher == Matcher::Sequence && options.deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("Deadline reached before sequence matching");
            break;
        }

        let started = Instant::now();
        let found = matcher.find(index, query, &matchables, options.deadline);
        debug!(
            "Matcher {} found {} matches in {:?}",
            matcher.tag(),
            found.len(),
            started.elapsed()
        );

        match matcher {
            Matcher::Hash if !found.is_empty() => return found,
            Matcher::Automaton => {
                for m in found.iter().filter(|m| m.coverage() == 100.0) {
                    uncovered.subtract(&m.qspan);
                }
            }
            _ => {}
        }
        matches.extend(found);

        if !whole.is_matchable(query, index, &uncovered, false) {
            break;
        }
    }
    matches
}

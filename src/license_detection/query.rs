//! Query: an input text tokenized against an index.
//!
//! Only tokens known to the index dictionary get a position. Unknown tokens
//! and stopwords are counted against the known position they follow, so that
//! the gaps they leave can be measured without being matchable.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use bit_set::BitSet;

use crate::license_detection::index::LicenseIndex;
use crate::license_detection::spans::Span;
use crate::license_detection::tokenize::{is_stopword, tokenize_lines};

/// Number of consecutive lines without legalese that ends a query run.
pub const QUERY_RUN_LINE_THRESHOLD: usize = 4;

/// An input text as a sequence of known token ids with position metadata.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// The original text, kept to render matched text.
    pub text: String,

    /// Known token ids by position.
    pub tokens: Vec<u16>,

    /// 1-based line number by position.
    pub line_by_pos: Vec<usize>,

    /// Number of unknown tokens after each known position. `None` counts the
    /// unknown tokens before the first known token.
    pub unknowns_by_pos: HashMap<Option<usize>, usize>,

    /// Number of stopwords after each known position, `None` as above.
    pub stopwords_by_pos: HashMap<Option<usize>, usize>,

    /// Positions of single-character or digit-only tokens.
    pub shorts_and_digits_pos: HashSet<usize>,

    /// Runs of tokens separated by stretches of lines without legalese.
    pub query_runs: Vec<QueryRun>,
}

impl Query {
    /// Tokenize `text` against the dictionary of `index`.
    pub fn new(text: &str, index: &LicenseIndex) -> Self {
        Self::with_line_threshold(text, index, QUERY_RUN_LINE_THRESHOLD)
    }

    /// Tokenize `text`, breaking query runs after `line_threshold` lines
    /// without any legalese token.
    pub fn with_line_threshold(text: &str, index: &LicenseIndex, line_threshold: usize) -> Self {
        let mut query = Query {
            text: text.to_string(),
            ..Query::default()
        };

        let mut last_known: Option<usize> = None;
        let mut run_start = 0usize;
        let mut junk_lines = 0usize;

        for (line_num, line_tokens) in tokenize_lines(text) {
            let pos = query.tokens.len();
            if pos > run_start && junk_lines >= line_threshold {
                query.query_runs.push(QueryRun::new(run_start, pos));
                run_start = pos;
                junk_lines = 0;
            }

            let mut has_known = false;
            let mut has_high = false;
            let mut all_digits = true;

            for token in &line_tokens {
                if is_stopword(token) {
                    *query.stopwords_by_pos.entry(last_known).or_insert(0) += 1;
                    continue;
                }
                let Some(tid) = index.dictionary.get(token) else {
                    *query.unknowns_by_pos.entry(last_known).or_insert(0) += 1;
                    continue;
                };

                let pos = query.tokens.len();
                query.tokens.push(tid);
                query.line_by_pos.push(line_num);
                last_known = Some(pos);

                has_known = true;
                has_high |= index.is_high(tid);
                all_digits &= index.digit_only_tids.contains(&tid);
                if token.chars().count() == 1 || token.chars().all(|c| c.is_ascii_digit()) {
                    query.shorts_and_digits_pos.insert(pos);
                }
            }

            if !has_known || all_digits || !has_high {
                junk_lines += 1;
            } else {
                junk_lines = 0;
            }
        }

        if query.tokens.len() > run_start {
            query
                .query_runs
                .push(QueryRun::new(run_start, query.tokens.len()));
        }
        query
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens, optionally counting unknown tokens too.
    pub fn tokens_length(&self, with_unknown: bool) -> usize {
        let length = self.tokens.len();
        if with_unknown {
            length + self.unknowns_by_pos.values().sum::<usize>()
        } else {
            length
        }
    }

    /// 1-based line of the token at `pos`.
    pub fn line_for_pos(&self, pos: usize) -> Option<usize> {
        self.line_by_pos.get(pos).copied()
    }

    /// Unknown tokens right after `pos`, or before the first token for `None`.
    pub fn unknown_count_after(&self, pos: Option<usize>) -> usize {
        self.unknowns_by_pos.get(&pos).copied().unwrap_or(0)
    }

    pub fn stopword_count_after(&self, pos: Option<usize>) -> usize {
        self.stopwords_by_pos.get(&pos).copied().unwrap_or(0)
    }

    pub fn is_short_or_digit(&self, pos: usize) -> bool {
        self.shorts_and_digits_pos.contains(&pos)
    }

    /// Unknown tokens found strictly inside `qspan`, between its first and
    /// last position.
    pub fn unknowns_within(&self, qspan: &Span) -> usize {
        let Some(end) = qspan.end() else {
            return 0;
        };
        qspan
            .iter()
            .filter(|&pos| pos != end)
            .map(|pos| self.unknown_count_after(Some(pos)))
            .sum()
    }

    /// A run covering every token.
    pub fn whole_query_run(&self) -> QueryRun {
        QueryRun::new(0, self.tokens.len())
    }
}

/// A contiguous slice `start..end` of query token positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRun {
    pub start: usize,
    pub end: usize,
}

impl QueryRun {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tokens<'q>(&self, query: &'q Query) -> &'q [u16] {
        &query.tokens[self.range()]
    }

    pub fn start_line(&self, query: &Query) -> Option<usize> {
        query.line_for_pos(self.start)
    }

    pub fn end_line(&self, query: &Query) -> Option<usize> {
        self.end.checked_sub(1).and_then(|e| query.line_for_pos(e))
    }

    /// True if every token of the run is digits only.
    pub fn is_digits_only(&self, query: &Query, index: &LicenseIndex) -> bool {
        self.tokens(query)
            .iter()
            .all(|tid| index.digit_only_tids.contains(tid))
    }

    /// True if the run still has matchable positions, legalese only unless
    /// `include_low`.
    pub fn is_matchable(
        &self,
        query: &Query,
        index: &LicenseIndex,
        matchables: &Matchables,
        include_low: bool,
    ) -> bool {
        if self.is_empty() || self.is_digits_only(query, index) {
            return false;
        }
        self.range().any(|pos| {
            matchables.is_high_matchable(pos) || (include_low && matchables.is_matchable(pos))
        })
    }

    /// Token ids at positions that are still matchable.
    pub fn matchable_tokens<'q>(
        &self,
        query: &'q Query,
        matchables: &'q Matchables,
    ) -> impl Iterator<Item = u16> + 'q {
        self.range()
            .filter(move |&pos| matchables.is_matchable(pos))
            .map(move |pos| query.tokens[pos])
    }
}

/// Query positions not consumed yet by an exact match.
///
/// Matching strategies only start new matches on matchable positions. The
/// set shrinks as exact matches are found.
#[derive(Debug, Clone, Default)]
pub struct Matchables {
    high: BitSet,
    low: BitSet,
}

impl Matchables {
    pub fn new(query: &Query, index: &LicenseIndex) -> Self {
        let mut high = BitSet::with_capacity(query.len());
        let mut low = BitSet::with_capacity(query.len());
        for (pos, &tid) in query.tokens.iter().enumerate() {
            if index.is_high(tid) {
                high.insert(pos);
            } else {
                low.insert(pos);
            }
        }
        Self { high, low }
    }

    pub fn is_matchable(&self, pos: usize) -> bool {
        self.high.contains(pos) || self.low.contains(pos)
    }

    pub fn is_high_matchable(&self, pos: usize) -> bool {
        self.high.contains(pos)
    }

    /// Mark every position of `span` as matched.
    pub fn subtract(&mut self, span: &Span) {
        for pos in span.iter() {
            self.high.remove(pos);
            self.low.remove(pos);
        }
    }

    pub fn high_count(&self) -> usize {
        self.high.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::test_utils::create_test_index;

    fn test_index() -> LicenseIndex {
        create_test_index(&[
            ("mit_1.RULE", "mit", "MIT license"),
            ("gpl_1.RULE", "gpl-2.0", "GNU General Public License version 2"),
            ("digits.RULE", "mit", "license 1 2 3"),
        ])
    }

    #[test]
    fn test_query_empty_text() {
        let index = test_index();
        let query = Query::new("", &index);
        assert!(query.is_empty());
        assert!(query.query_runs.is_empty());
        assert_eq!(query.tokens_length(true), 0);
    }

    #[test]
    fn test_query_known_and_unknown_tokens() {
        let index = test_index();
        let query = Query::new("foo MIT bar baz license", &index);
        assert_eq!(query.len(), 2);
        assert_eq!(query.unknown_count_after(None), 1);
        assert_eq!(query.unknown_count_after(Some(0)), 2);
        assert_eq!(query.tokens_length(false), 2);
        assert_eq!(query.tokens_length(true), 5);
    }

    #[test]
    fn test_query_stopwords_are_counted_not_positioned() {
        let index = test_index();
        let query = Query::new("<p>MIT</p> license", &index);
        assert_eq!(query.len(), 2);
        assert_eq!(query.stopword_count_after(None), 1);
        assert_eq!(query.stopword_count_after(Some(0)), 1);
    }

    #[test]
    fn test_query_line_numbers() {
        let index = test_index();
        let query = Query::new("MIT\n\nlicense\nversion 2", &index);
        assert_eq!(query.line_by_pos, vec![1, 3, 4, 4]);
        assert_eq!(query.line_for_pos(3), Some(4));
        assert_eq!(query.line_for_pos(9), None);
    }

    #[test]
    fn test_query_shorts_and_digits() {
        let index = test_index();
        let query = Query::new("license 1 2 version", &index);
        assert!(query.is_short_or_digit(1));
        assert!(query.is_short_or_digit(2));
        assert!(!query.is_short_or_digit(0));
    }

    #[test]
    fn test_query_runs_break_on_junk_lines() {
        let index = test_index();
        let text = "MIT license\nversion\nversion\nversion\nversion\nMIT license\n";
        let query = Query::new(text, &index);
        assert_eq!(query.query_runs, vec![QueryRun::new(0, 6), QueryRun::new(6, 8)]);

        let query = Query::with_line_threshold(text, &index, 10);
        assert_eq!(query.query_runs, vec![QueryRun::new(0, 8)]);
    }

    #[test]
    fn test_unknowns_within() {
        let index = test_index();
        let query = Query::new("foo MIT bar license baz", &index);
        assert_eq!(query.unknowns_within(&Span::from_range(0..2)), 1);
        assert_eq!(query.unknowns_within(&Span::from_range(1..2)), 0);
    }

    #[test]
    fn test_matchables_subtract() {
        let index = test_index();
        let query = Query::new("MIT license version", &index);
        let mut matchables = Matchables::new(&query, &index);
        let run = query.whole_query_run();
        assert!(run.is_matchable(&query, &index, &matchables, false));

        matchables.subtract(&Span::from_range(0..2));
        assert!(!matchables.is_matchable(0));
        assert!(matchables.is_matchable(2));
        assert_eq!(run.matchable_tokens(&query, &matchables).count(), 1);
    }

    #[test]
    fn test_query_run_digits_only() {
        let index = test_index();
        let query = Query::new("1 2 3", &index);
        let run = query.whole_query_run();
        let matchables = Matchables::new(&query, &index);
        assert!(run.is_digits_only(&query, &index));
        assert!(!run.is_matchable(&query, &index, &matchables, true));
    }
}

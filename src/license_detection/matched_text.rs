//! Render the original text of a match.
//!
//! A query keeps only known token ids. To show what a match covered, the
//! query text is tokenized again keeping punctuation, and every word is given
//! back the query position it had. [`MatchedTextCache`] keeps the token stream
//! of the last rendered query so that rendering every match of one file
//! tokenizes its text once.

use std::cell::RefCell;
use std::rc::Rc;

use crate::license_detection::index::dictionary::TokenDictionary;
use crate::license_detection::license_match::LicenseMatch;
use crate::license_detection::tokenize::{Token, is_stopword, matched_text_tokenizer};

/// Rendering token stream of the last query seen.
///
/// Holds one entry: rendering a match of another query replaces it. The
/// cache is neither `Send` nor `Sync`; each worker owns its own.
pub struct MatchedTextCache<'i> {
    dictionary: &'i TokenDictionary,
    entry: RefCell<Option<(String, Rc<Vec<Token>>)>>,
}

impl<'i> MatchedTextCache<'i> {
    pub fn new(dictionary: &'i TokenDictionary) -> Self {
        Self {
            dictionary,
            entry: RefCell::new(None),
        }
    }

    /// Tokens of `text`, from the cache when `text` was the last query.
    fn tokens(&self, text: &str) -> Rc<Vec<Token>> {
        if let Some((cached_text, tokens)) = self.entry.borrow().as_ref()
            && cached_text == text
        {
            return Rc::clone(tokens);
        }
        let tokens = Rc::new(tokenize_for_rendering(text, self.dictionary));
        *self.entry.borrow_mut() = Some((text.to_string(), Rc::clone(&tokens)));
        tokens
    }

    /// True if the cache holds the tokens of `text`.
    pub fn holds(&self, text: &str) -> bool {
        self.entry
            .borrow()
            .as_ref()
            .is_some_and(|(cached_text, _)| cached_text == text)
    }

    pub fn clear(&self) {
        self.entry.borrow_mut().take();
    }
}

/// Tokenize `text` keeping punctuation, numbering known words the way
/// [`Query`](crate::license_detection::query::Query) numbers its positions.
fn tokenize_for_rendering(text: &str, dictionary: &TokenDictionary) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    for (idx, line) in text.lines().enumerate() {
        for (is_text, piece) in matched_text_tokenizer(line) {
            let mut token = Token {
                value: piece.to_string(),
                line_num: idx + 1,
                pos: None,
                is_text,
                is_known: false,
                is_matched: false,
            };
            if is_text {
                let lowered = piece.to_lowercase();
                if !is_stopword(&lowered) && dictionary.get(&lowered).is_some() {
                    token.is_known = true;
                    token.pos = Some(pos);
                    pos += 1;
                }
            }
            tokens.push(token);
        }
    }
    tokens
}

impl LicenseMatch<'_> {
    /// Original text of this match.
    ///
    /// # Arguments
    /// * `cache` - Token stream cache of the query
    /// * `whole_lines` - Render the complete lines of the match, not only the
    ///   text from the first to the last matched word
    /// * `highlight` - Wrap known words that are not part of the match in `[...]`
    pub fn matched_text(&self, cache: &MatchedTextCache<'_>, whole_lines: bool, highlight: bool) -> String {
        if self.qspan.is_empty() {
            return String::new();
        }
        let tokens = cache.tokens(&self.query.text);
        let is_matched = |t: &Token| t.pos.is_some_and(|p| self.qspan.contains_pos(p));

        let (first, last) = if whole_lines {
            let first = tokens.iter().position(|t| t.line_num >= self.start_line);
            let last = tokens.iter().rposition(|t| t.line_num <= self.end_line);
            match (first, last) {
                (Some(first), Some(last)) if first <= last => (first, last),
                _ => return String::new(),
            }
        } else {
            match (tokens.iter().position(is_matched), tokens.iter().rposition(is_matched)) {
                (Some(first), Some(last)) => (first, last),
                _ => return String::new(),
            }
        };

        let mut rendered = String::new();
        let mut line_num = tokens[first].line_num;
        for token in &tokens[first..=last] {
            while line_num < token.line_num {
                rendered.push('\n');
                line_num += 1;
            }
            if highlight && token.is_known && !is_matched(token) {
                rendered.push('[');
                rendered.push_str(&token.value);
                rendered.push(']');
            } else {
                rendered.push_str(&token.value);
            }
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::license_match::MATCH_AHO;
    use crate::license_detection::query::Query;
    use crate::license_detection::spans::Span;
    use crate::license_detection::test_utils::create_test_index;

    #[test]
    fn test_matched_text_keeps_punctuation() {
        let index = create_test_index(&[("mit.RULE", "mit", "MIT license")]);
        let query = Query::new("// Released under the MIT-License, see below.", &index);
        let cache = MatchedTextCache::new(&index.dictionary);
        let rule = index.rule(0);
        let qspan = Span::from_range(0..2);
        let m = LicenseMatch::new(0, rule, &query, qspan.clone(), qspan.clone(), index.hispan(rule, &qspan), MATCH_AHO);

        assert_eq!(m.matched_text(&cache, false, false), "MIT-License");
        assert_eq!(
            m.matched_text(&cache, true, false),
            "// Released under the MIT-License, see below."
        );
        assert!(cache.holds(&query.text));
    }

    #[test]
    fn test_matched_text_highlights_unmatched_known_words() {
        let index = create_test_index(&[("gpl.RULE", "gpl-2.0", "GPL version 2")]);
        let query = Query::new("GPL version 2", &index);
        let cache = MatchedTextCache::new(&index.dictionary);
        let rule = index.rule(0);
        let m = LicenseMatch::new(
            0,
            rule,
            &query,
            Span::from_iterator([0, 2]),
            Span::from_iterator([0, 2]),
            Span::from_iterator([0]),
            MATCH_AHO,
        );
        assert_eq!(m.matched_text(&cache, false, true), "GPL [version] 2");
        assert_eq!(m.matched_text(&cache, false, false), "GPL version 2");
    }

    #[test]
    fn test_matched_text_spans_lines() {
        let index = create_test_index(&[("mit.RULE", "mit", "MIT license")]);
        let query = Query::new("MIT\n\n  license", &index);
        let cache = MatchedTextCache::new(&index.dictionary);
        let rule = index.rule(0);
        let qspan = Span::from_range(0..2);
        let m = LicenseMatch::new(0, rule, &query, qspan.clone(), qspan.clone(), qspan, MATCH_AHO);
        assert_eq!(m.matched_text(&cache, false, false), "MIT\n\n  license");
    }

    #[test]
    fn test_cache_keeps_single_entry() {
        let index = create_test_index(&[("mit.RULE", "mit", "MIT license")]);
        let cache = MatchedTextCache::new(&index.dictionary);
        cache.tokens("first text");
        assert!(cache.holds("first text"));
        cache.tokens("second text");
        assert!(!cache.holds("first text"));
        assert!(cache.holds("second text"));
        cache.clear();
        assert!(!cache.holds("second text"));
    }
}

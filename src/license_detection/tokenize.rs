//! Text tokenization and normalization.
//!
//! Three tokenizers share one word pattern:
//! - the index tokenizer, used for rule texts, drops stopwords;
//! - the query tokenizer works line by line and keeps stopwords so the query
//!   can count them;
//! - the matched-text tokenizer keeps punctuation and whitespace so a match can
//!   be rendered back verbatim.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;

/// Words ignored for matching: markup tags, entities and comment markers.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // XML character references such as &quot;
        "amp", "apos", "gt", "lt", "nbsp", "quot",
        // HTML tags such as <a href=...>
        "a", "abbr", "alt", "blockquote", "body", "br", "class", "div", "em", "h1", "h2", "h3",
        "h4", "h5", "hr", "href", "img", "li", "ol", "p", "pre", "rel", "script", "span", "src",
        "td", "th", "tr", "ul",
        // comment line markers of batch files and autotools
        "rem", "dnl",
        // DocBook
        "para", "ulink",
        // HTML punctuation entities
        "bdquo", "bull", "bullet", "colon", "comma", "emdash", "emsp", "ensp", "ge", "hairsp",
        "ldquo", "ldquor", "le", "lpar", "lsaquo", "lsquo", "lsquor", "mdash", "ndash", "numsp",
        "period", "puncsp", "raquo", "rdquo", "rdquor", "rpar", "rsaquo", "rsquo", "rsquor",
        "sbquo", "semi", "thinsp", "tilde",
        "x3c", "x3e",
        // CSS
        "lists", "side", "nav", "height", "auto", "border", "padding", "width",
        // Perl POD
        "head1", "head2", "head3",
        "printf", "echo",
    ]
    .into_iter()
    .collect()
});

/// Keep runs of letters and digits, plus a `+` in the middle or at the end of
/// a word (as in `GPL2+`). Underscores split words.
static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^_\W]+\+?[^_\W]*").expect("valid word pattern"));

/// Words plus the `{{` and `}}` required phrase markers.
static REQUIRED_PHRASE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^_\W]+\+?[^_\W]*|\{\{|\}\}").expect("valid phrase pattern"));

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Tokenize rule text for indexing: lowercased words, stopwords removed.
///
/// # Examples
/// ```
/// # use license_detector::license_detection::tokenize::tokenize;
/// assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|token| !is_stopword(token))
        .collect()
}

/// Tokenize one line for a query, keeping stopwords.
pub fn tokenize_line(line: &str) -> Vec<String> {
    WORD_PATTERN
        .find_iter(line)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Tokenize text into `(line_number, tokens)` pairs with 1-based line numbers.
///
/// Lines without any word are still reported so that line numbering stays
/// aligned with the source text.
pub fn tokenize_lines(text: &str) -> Vec<(usize, Vec<String>)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, tokenize_line(line)))
        .collect()
}

/// Token positions of each `{{ ... }}` required phrase in a rule text.
///
/// Positions are counted the way [`tokenize`] counts them, so they line up
/// with the rule's token ids. Malformed markers (nested, empty or unbalanced)
/// invalidate all phrases of the rule and yield an empty list.
///
/// # Examples
/// ```
/// # use license_detector::license_detection::tokenize::parse_required_phrase_spans;
/// assert_eq!(parse_required_phrase_spans("This is {{enclosed}} here"), vec![2..3]);
/// ```
pub fn parse_required_phrase_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open_at: Option<usize> = None;
    let mut pos = 0usize;

    for m in REQUIRED_PHRASE_PATTERN.find_iter(text) {
        match m.as_str() {
            "{{" => {
                if open_at.is_some() {
                    log::warn!("Nested required phrase braces in rule text: {text:?}");
                    return Vec::new();
                }
                open_at = Some(pos);
            }
            "}}" => match open_at.take() {
                Some(start) if start < pos => spans.push(start..pos),
                Some(_) => {
                    log::warn!("Empty required phrase braces in rule text: {text:?}");
                    return Vec::new();
                }
                None => {
                    log::warn!("Unopened required phrase braces in rule text: {text:?}");
                    return Vec::new();
                }
            },
            word => {
                if !is_stopword(&word.to_lowercase()) {
                    pos += 1;
                }
            }
        }
    }

    if open_at.is_some() {
        log::warn!("Unclosed required phrase braces in rule text: {text:?}");
        return Vec::new();
    }

    spans
}

/// One piece of text for matched-text rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Original text, case preserved.
    pub value: String,
    /// 1-based line number.
    pub line_num: usize,
    /// Known-token position in the query, `None` for punctuation and unknown words.
    pub pos: Option<usize>,
    /// True for words, false for punctuation and whitespace.
    pub is_text: bool,
    /// True if the word is in the index dictionary.
    pub is_known: bool,
    /// Set only while rendering a match.
    pub is_matched: bool,
}

/// Split a line into alternating word and non-word pieces, `(is_text, piece)`.
///
/// Concatenating all pieces gives back the line unchanged.
pub fn matched_text_tokenizer(line: &str) -> Vec<(bool, &str)> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in WORD_PATTERN.find_iter(line) {
        if m.start() > last {
            pieces.push((false, &line[last..m.start()]));
        }
        pieces.push((true, m.as_str()));
        last = m.end();
    }
    if last < line.len() {
        pieces.push((false, &line[last..]));
    }
    pieces
}

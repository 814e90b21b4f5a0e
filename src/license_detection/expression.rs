//! License expression parsing and combination.
//!
//! Supports ScanCode license keys (`mit`, `gpl-2.0-plus`, `LicenseRef-...`),
//! the `AND`, `OR` and `WITH` operators (case-insensitive) and parentheses.
//! `WITH` binds tighter than `AND`, which binds tighter than `OR`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Error type for license expression parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    EmptyExpression,
    UnexpectedCharacter { character: char, position: usize },
    UnexpectedToken { token: String },
    MismatchedParentheses,
    /// `WITH` must join two license keys.
    InvalidWith,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyExpression => write!(f, "Empty license expression"),
            Self::UnexpectedCharacter {
                character,
                position,
            } => write!(f, "Unexpected character '{character}' at position {position}"),
            Self::UnexpectedToken { token } => write!(f, "Unexpected token '{token}'"),
            Self::MismatchedParentheses => write!(f, "Mismatched parentheses"),
            Self::InvalidWith => write!(f, "WITH must join a license key and an exception key"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Key(String),
    And,
    Or,
    With,
    LeftParen,
    RightParen,
}

/// A parsed license expression.
///
/// `And` and `Or` are n-ary and never nest a node of the same kind directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpression {
    Key(String),
    With { license: String, exception: String },
    And(Vec<LicenseExpression>),
    Or(Vec<LicenseExpression>),
}

impl LicenseExpression {
    /// All license keys in the expression, sorted and deduplicated.
    pub fn license_keys(&self) -> Vec<String> {
        let mut keys = BTreeSet::new();
        self.collect_keys(&mut keys);
        keys.into_iter().collect()
    }

    fn collect_keys(&self, keys: &mut BTreeSet<String>) {
        match self {
            Self::Key(key) => {
                keys.insert(key.clone());
            }
            Self::With { license, exception } => {
                keys.insert(license.clone());
                keys.insert(exception.clone());
            }
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_keys(keys);
                }
            }
        }
    }

    /// Build an AND of `items`, flattening nested ANDs.
    pub fn and(items: Vec<LicenseExpression>) -> Option<LicenseExpression> {
        let mut flat = Vec::new();
        for item in items {
            match item {
                Self::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Self::And(flat)),
        }
    }

    fn or(items: Vec<LicenseExpression>) -> LicenseExpression {
        let mut flat = Vec::new();
        for item in items {
            match item {
                Self::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Self::Or(flat)
        }
    }

    /// Remove repeated operands of each AND/OR, keeping the first occurrence.
    pub fn dedup(self) -> LicenseExpression {
        fn dedup_items(items: Vec<LicenseExpression>) -> Vec<LicenseExpression> {
            let mut unique: Vec<LicenseExpression> = Vec::new();
            for item in items.into_iter().map(LicenseExpression::dedup) {
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            unique
        }

        match self {
            Self::And(items) => {
                let mut items = dedup_items(items);
                if items.len() == 1 {
                    items.remove(0)
                } else {
                    Self::And(items)
                }
            }
            Self::Or(items) => {
                let mut items = dedup_items(items);
                if items.len() == 1 {
                    items.remove(0)
                } else {
                    Self::Or(items)
                }
            }
            other => other,
        }
    }

    /// Rewrite every key through `map_key`.
    pub fn map_keys(&self, map_key: &impl Fn(&str) -> String) -> LicenseExpression {
        match self {
            Self::Key(key) => Self::Key(map_key(key)),
            Self::With { license, exception } => Self::With {
                license: map_key(license),
                exception: map_key(exception),
            },
            Self::And(items) => Self::And(items.iter().map(|i| i.map_keys(map_key)).collect()),
            Self::Or(items) => Self::Or(items.iter().map(|i| i.map_keys(map_key)).collect()),
        }
    }
}

impl fmt::Display for LicenseExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::With { license, exception } => write!(f, "{license} WITH {exception}"),
            Self::And(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    if matches!(item, Self::Or(_)) {
                        write!(f, "({item})")?;
                    } else {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Or(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Parse a license expression string.
///
/// Keys are lowercased except `LicenseRef-` references, which keep their case.
///
/// # Examples
/// ```
/// use license_detector::license_detection::expression::parse_expression;
///
/// let expr = parse_expression("MIT and (Apache-2.0 OR gpl-2.0-plus)").unwrap();
/// assert_eq!(expr.to_string(), "mit AND (apache-2.0 OR gpl-2.0-plus)");
/// ```
pub fn parse_expression(expr: &str) -> Result<LicenseExpression, ParseError> {
    let tokens = lex(expr)?;
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    let (parsed, rest) = parse_or(&tokens)?;
    match rest.first() {
        None => Ok(parsed),
        Some(Token::RightParen) => Err(ParseError::MismatchedParentheses),
        Some(token) => Err(ParseError::UnexpectedToken {
            token: format!("{token:?}"),
        }),
    }
}

/// Combine expressions with AND, optionally removing duplicate operands.
///
/// Returns `None` when `expressions` is empty.
pub fn combine_expressions(
    expressions: &[&str],
    unique: bool,
) -> Result<Option<String>, ParseError> {
    let parsed = expressions
        .iter()
        .map(|e| parse_expression(e))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LicenseExpression::and(parsed).map(|combined| {
        if unique {
            combined.dedup().to_string()
        } else {
            combined.to_string()
        }
    }))
}

/// True if the keys of `container` include every key of `contained`.
pub fn licensing_contains(container: &str, contained: &str) -> bool {
    if container.trim() == contained.trim() {
        return true;
    }
    match (parse_expression(container), parse_expression(contained)) {
        (Ok(outer), Ok(inner)) => {
            let outer_keys = outer.license_keys();
            inner.license_keys().iter().all(|k| outer_keys.contains(k))
        }
        _ => false,
    }
}

/// Render a ScanCode expression with SPDX identifiers.
///
/// Keys missing from `spdx_keys` become `LicenseRef-scancode-<key>`.
pub fn render_spdx(expr: &str, spdx_keys: &HashMap<String, String>) -> Result<String, ParseError> {
    let parsed = parse_expression(expr)?;
    let mapped = parsed.map_keys(&|key| {
        spdx_keys
            .get(key)
            .cloned()
            .unwrap_or_else(|| format!("LicenseRef-scancode-{key}"))
    });
    Ok(mapped.to_string())
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '+' | ':')
}

fn lex(expr: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '(' {
            tokens.push(Token::LeftParen);
            chars.next();
        } else if c == ')' {
            tokens.push(Token::RightParen);
            chars.next();
        } else if is_key_char(c) {
            let mut word = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !is_key_char(c) {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(match word.to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "WITH" => Token::With,
                _ if word.to_ascii_lowercase().starts_with("licenseref-") => Token::Key(word),
                _ => Token::Key(word.to_lowercase()),
            });
        } else {
            return Err(ParseError::UnexpectedCharacter {
                character: c,
                position,
            });
        }
    }

    Ok(tokens)
}

fn parse_or(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    let (first, mut rest) = parse_and(tokens)?;
    let mut items = vec![first];
    while let Some(Token::Or) = rest.first() {
        let (next, remaining) = parse_and(&rest[1..])?;
        items.push(next);
        rest = remaining;
    }
    Ok((LicenseExpression::or(items), rest))
}

fn parse_and(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    let (first, mut rest) = parse_with(tokens)?;
    let mut items = vec![first];
    while let Some(Token::And) = rest.first() {
        let (next, remaining) = parse_with(&rest[1..])?;
        items.push(next);
        rest = remaining;
    }
    let combined = LicenseExpression::and(items).ok_or(ParseError::EmptyExpression)?;
    Ok((combined, rest))
}

fn parse_with(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    let (left, rest) = parse_primary(tokens)?;
    if let Some(Token::With) = rest.first() {
        let (right, remaining) = parse_primary(&rest[1..])?;
        return match (left, right) {
            (LicenseExpression::Key(license), LicenseExpression::Key(exception)) => {
                Ok((LicenseExpression::With { license, exception }, remaining))
            }
            _ => Err(ParseError::InvalidWith),
        };
    }
    Ok((left, rest))
}

fn parse_primary(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    match tokens.first() {
        None => Err(ParseError::EmptyExpression),
        Some(Token::Key(key)) => Ok((LicenseExpression::Key(key.clone()), &tokens[1..])),
        Some(Token::LeftParen) => {
            let (inner, rest) = parse_or(&tokens[1..])?;
            match rest.first() {
                Some(Token::RightParen) => Ok((inner, &rest[1..])),
                _ => Err(ParseError::MismatchedParentheses),
            }
        }
        Some(Token::RightParen) => Err(ParseError::MismatchedParentheses),
        Some(op) => Err(ParseError::UnexpectedToken {
            token: format!("{op:?}"),
        }),
    }
}

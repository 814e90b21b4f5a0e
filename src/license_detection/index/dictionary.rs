//! Token string to integer id mapping.

use std::collections::HashMap;

/// Maps token strings to `u16` ids.
///
/// Ids `0..len_legalese` are reserved for legalese words ("high" tokens).
/// Every other token gets the next free id as rules are indexed ("low" tokens).
#[derive(Debug, Clone)]
pub struct TokenDictionary {
    tokens_to_ids: HashMap<String, u16>,
    len_legalese: usize,
    next_id: usize,
}

impl TokenDictionary {
    /// Create a dictionary seeded with legalese words.
    ///
    /// # Arguments
    /// * `legalese` - `(word, id)` pairs, ids below `len_legalese`
    /// * `len_legalese` - Number of reserved legalese ids
    pub fn new_with_legalese(legalese: &[(&str, u16)], len_legalese: usize) -> Self {
        let tokens_to_ids = legalese
            .iter()
            .map(|(word, id)| ((*word).to_string(), *id))
            .collect();
        Self {
            tokens_to_ids,
            len_legalese,
            next_id: len_legalese,
        }
    }

    /// Return the id of `token`, assigning a new low id if it is unseen.
    ///
    /// `None` once every `u16` id is taken.
    pub fn get_or_assign(&mut self, token: &str) -> Option<u16> {
        if let Some(&id) = self.tokens_to_ids.get(token) {
            return Some(id);
        }
        let id = u16::try_from(self.next_id).ok()?;
        self.next_id += 1;
        self.tokens_to_ids.insert(token.to_string(), id);
        Some(id)
    }

    pub fn get(&self, token: &str) -> Option<u16> {
        self.tokens_to_ids.get(token).copied()
    }

    /// True if `token_id` is a legalese (high) token.
    #[inline]
    pub const fn is_legalese(&self, token_id: u16) -> bool {
        (token_id as usize) < self.len_legalese
    }

    pub const fn len_legalese(&self) -> usize {
        self.len_legalese
    }

    /// Number of distinct ids handed out, legalese included.
    pub fn len(&self) -> usize {
        self.next_id
    }

    pub fn is_empty(&self) -> bool {
        self.next_id == 0
    }
}

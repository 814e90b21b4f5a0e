//! Token sets and multisets used to rank sequence-matching candidates.

use std::collections::{HashMap, HashSet};

/// The distinct tokens of a token sequence and how often each occurs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBag {
    pub set: HashSet<u16>,
    pub mset: HashMap<u16, usize>,
}

impl TokenBag {
    pub fn from_tokens(tokens: impl IntoIterator<Item = u16>) -> Self {
        let mut mset: HashMap<u16, usize> = HashMap::new();
        for tid in tokens {
            *mset.entry(tid).or_insert(0) += 1;
        }
        let set = mset.keys().copied().collect();
        Self { set, mset }
    }

    /// Number of distinct tokens.
    pub fn len_unique(&self) -> usize {
        self.set.len()
    }

    /// Total token occurrences.
    pub fn len(&self) -> usize {
        self.mset.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Distinct tokens below `len_legalese`.
    pub fn high_len_unique(&self, len_legalese: usize) -> usize {
        self.set.iter().filter(|&&tid| (tid as usize) < len_legalese).count()
    }

    /// Occurrences of tokens below `len_legalese`.
    pub fn high_len(&self, len_legalese: usize) -> usize {
        self.mset
            .iter()
            .filter(|&(&tid, _)| (tid as usize) < len_legalese)
            .map(|(_, count)| count)
            .sum()
    }

    /// Distinct tokens shared with `other`, split into `(all, high)`.
    pub fn set_intersection(&self, other: &TokenBag, len_legalese: usize) -> (usize, usize) {
        let (small, large) = if self.set.len() <= other.set.len() {
            (&self.set, &other.set)
        } else {
            (&other.set, &self.set)
        };
        small
            .iter()
            .filter(|tid| large.contains(tid))
            .fold((0, 0), |(all, high), &tid| {
                (all + 1, high + usize::from((tid as usize) < len_legalese))
            })
    }

    /// Shared occurrences (minimum of both counts per token), split into `(all, high)`.
    pub fn mset_intersection(&self, other: &TokenBag, len_legalese: usize) -> (usize, usize) {
        self.mset
            .iter()
            .filter_map(|(tid, &count)| other.mset.get(tid).map(|&o| (*tid, count.min(o))))
            .fold((0, 0), |(all, high), (tid, shared)| {
                let high_shared = if (tid as usize) < len_legalese { shared } else { 0 };
                (all + shared, high + high_shared)
            })
    }
}

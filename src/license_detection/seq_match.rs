//! Approximate sequence matching.
//!
//! Candidate rules are ranked by how many tokens they share with a query run,
//! first on token sets then on token multisets. Each candidate is then
//! aligned with the run, anchoring matching blocks on legalese tokens and
//! extending them over any equal tokens on both ends.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use crate::license_detection::index::LicenseIndex;
use crate::license_detection::index::token_sets::TokenBag;
use crate::license_detection::license_match::{LicenseMatch, MATCH_SEQ};
use crate::license_detection::models::Rule;
use crate::license_detection::query::{Matchables, Query, QueryRun};
use crate::license_detection::spans::Span;

/// Candidates kept when looking for a near-duplicate of the whole query.
pub const MAX_NEAR_DUPE_CANDIDATES: usize = 10;

/// Candidates kept per query run.
pub const MAX_CANDIDATES: usize = 70;

/// Resemblance at or above which a rule is a near-duplicate of the query.
pub const HIGH_RESEMBLANCE_THRESHOLD: f64 = 0.8;

/// Set similarity of a query run and a rule, compared field by field.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoresVector {
    is_highly_resemblant: bool,
    containment: f64,
    resemblance: f64,
    matched_length: f64,
}

impl ScoresVector {
    fn compare(&self, other: &Self) -> Ordering {
        self.is_highly_resemblant
            .cmp(&other.is_highly_resemblant)
            .then_with(|| self.containment.total_cmp(&other.containment))
            .then_with(|| self.resemblance.total_cmp(&other.resemblance))
            .then_with(|| self.matched_length.total_cmp(&other.matched_length))
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    rid: usize,
    /// Coarse scores used to group near-identical candidates.
    rounded: ScoresVector,
    full: ScoresVector,
}

impl Candidate {
    /// Best candidates first, lower rule id first on ties.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .rounded
            .compare(&self.rounded)
            .then_with(|| other.full.compare(&self.full))
            .then_with(|| self.rid.cmp(&other.rid))
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compare query and rule bags, `None` if the rule cannot match.
///
/// With `unique` the comparison is on distinct tokens, otherwise on token
/// occurrences. A rule is rejected when the shared tokens stay below its
/// minimum lengths or minimum coverage.
fn compare_token_bags(
    qbag: &TokenBag,
    ibag: &TokenBag,
    rule: &Rule,
    len_legalese: usize,
    unique: bool,
) -> Option<(ScoresVector, ScoresVector)> {
    let (matched_length, high_matched_length) = if unique {
        qbag.set_intersection(ibag, len_legalese)
    } else {
        qbag.mset_intersection(ibag, len_legalese)
    };
    if matched_length == 0 || high_matched_length == 0 {
        return None;
    }

    let (min_high, min_length, ilen, qlen) = if unique {
        (
            rule.min_high_matched_length_unique,
            rule.min_matched_length_unique,
            rule.length_unique,
            qbag.len_unique(),
        )
    } else {
        (
            rule.min_high_matched_length,
            rule.min_matched_length,
            rule.length,
            qbag.len(),
        )
    };
    if high_matched_length < min_high || matched_length < min_length || ilen == 0 {
        return None;
    }

    let union_length = qlen + ilen - matched_length;
    let resemblance = matched_length as f64 / union_length as f64;
    let containment = matched_length as f64 / ilen as f64;
    if let Some(minimum_coverage) = rule.minimum_coverage.filter(|&c| c > 0)
        && containment < f64::from(minimum_coverage) / 100.0
    {
        return None;
    }
    let amplified_resemblance = resemblance * resemblance;

    let rounded = ScoresVector {
        is_highly_resemblant: round1(resemblance) >= HIGH_RESEMBLANCE_THRESHOLD,
        containment: round1(containment),
        resemblance: round1(amplified_resemblance),
        matched_length: round1(matched_length as f64 / 20.0),
    };
    let full = ScoresVector {
        is_highly_resemblant: resemblance >= HIGH_RESEMBLANCE_THRESHOLD,
        containment,
        resemblance: amplified_resemblance,
        matched_length: matched_length as f64,
    };
    Some((rounded, full))
}

/// Keep the best of candidates that look alike: same expression, same rule
/// length and same rounded scores.
fn filter_dupes(index: &LicenseIndex, candidates: Vec<Candidate>) -> Vec<Candidate> {
    type DupeKey<'r> = (&'r str, bool, u64, u64, u64, usize);
    let mut best: HashMap<DupeKey<'_>, Candidate> = HashMap::new();
    for candidate in candidates {
        let rule = index.rule(candidate.rid);
        let key = (
            rule.expression(),
            candidate.rounded.is_highly_resemblant,
            candidate.rounded.containment.to_bits(),
            candidate.rounded.resemblance.to_bits(),
            candidate.rounded.matched_length.to_bits(),
            rule.length,
        );
        match best.get(&key) {
            Some(kept) if kept.rank(&candidate) != Ordering::Greater => {}
            _ => {
                best.insert(key, candidate);
            }
        }
    }
    best.into_values().collect()
}

/// Rank the approx-matchable rules against the matchable tokens of a run.
///
/// # Arguments
/// * `top` - Number of candidates to return
/// * `high_resemblance` - Only keep near-duplicates of the run
fn compute_candidates(
    index: &LicenseIndex,
    query: &Query,
    query_run: &QueryRun,
    matchables: &Matchables,
    top: usize,
    high_resemblance: bool,
) -> Vec<Candidate> {
    let qbag = TokenBag::from_tokens(query_run.matchable_tokens(query, matchables));
    if qbag.is_empty() {
        return Vec::new();
    }
    let len_legalese = index.len_legalese;
    let keep = |rounded: &ScoresVector, full: &ScoresVector| {
        !high_resemblance || (rounded.is_highly_resemblant && full.is_highly_resemblant)
    };

    let mut candidates: Vec<Candidate> = index
        .approx_matchable_rids
        .iter()
        .filter_map(|&rid| {
            let ibag = index.bags_by_rid.get(&rid)?;
            let (rounded, full) = compare_token_bags(&qbag, ibag, index.rule(rid), len_legalese, true)?;
            keep(&rounded, &full).then_some(Candidate { rid, rounded, full })
        })
        .collect();
    if candidates.is_empty() {
        return candidates;
    }
    candidates.sort_by(Candidate::rank);
    candidates.truncate(top * 10);

    let refined: Vec<Candidate> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let ibag = index.bags_by_rid.get(&candidate.rid)?;
            let rule = index.rule(candidate.rid);
            let (rounded, full) = compare_token_bags(&qbag, ibag, rule, len_legalese, false)?;
            keep(&rounded, &full).then_some(Candidate {
                rid: candidate.rid,
                rounded,
                full,
            })
        })
        .collect();

    let mut refined = filter_dupes(index, refined);
    refined.sort_by(Candidate::rank);
    refined.truncate(top);
    refined
}

/// A matching block: `len` equal tokens at `qpos` in the query and `ipos` in the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Block {
    qpos: usize,
    ipos: usize,
    len: usize,
}

struct Aligner<'s> {
    qtokens: &'s [u16],
    itokens: &'s [u16],
    high_postings: &'s HashMap<u16, Vec<usize>>,
    len_legalese: usize,
    matchables: &'s Matchables,
}

impl Aligner<'_> {
    /// Longest block in `qlo..qhi` x `ilo..ihi` starting from legalese tokens,
    /// then extended on both ends with any equal matchable token.
    fn find_longest_match(&self, qlo: usize, qhi: usize, ilo: usize, ihi: usize) -> Block {
        let mut best = Block {
            qpos: qlo,
            ipos: ilo,
            len: 0,
        };
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in qlo..qhi {
            let mut new_j2len = HashMap::new();
            let tid = self.qtokens[i];
            if (tid as usize) < self.len_legalese && self.matchables.is_matchable(i) {
                for &j in self.high_postings.get(&tid).map(Vec::as_slice).unwrap_or(&[]) {
                    if j < ilo {
                        continue;
                    }
                    if j >= ihi {
                        break;
                    }
                    let previous = if j > 0 { j2len.get(&(j - 1)).copied().unwrap_or(0) } else { 0 };
                    let k = previous + 1;
                    new_j2len.insert(j, k);
                    if k > best.len {
                        best = Block {
                            qpos: i + 1 - k,
                            ipos: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }
            j2len = new_j2len;
        }

        if best.len > 0 {
            while best.qpos > qlo
                && best.ipos > ilo
                && self.qtokens[best.qpos - 1] == self.itokens[best.ipos - 1]
                && self.matchables.is_matchable(best.qpos - 1)
            {
                best.qpos -= 1;
                best.ipos -= 1;
                best.len += 1;
            }
            while best.qpos + best.len < qhi
                && best.ipos + best.len < ihi
                && self.qtokens[best.qpos + best.len] == self.itokens[best.ipos + best.len]
                && self.matchables.is_matchable(best.qpos + best.len)
            {
                best.len += 1;
            }
        }
        best
    }

    /// All non-adjacent matching blocks between `qlo..qhi` and the rule.
    fn match_blocks(&self, qlo: usize, qhi: usize) -> Vec<Block> {
        let mut queue = vec![(qlo, qhi, 0, self.itokens.len())];
        let mut blocks = Vec::new();
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let block = self.find_longest_match(alo, ahi, blo, bhi);
            if block.len == 0 {
                continue;
            }
            blocks.push(block);
            if alo < block.qpos && blo < block.ipos {
                queue.push((alo, block.qpos, blo, block.ipos));
            }
            if block.qpos + block.len < ahi && block.ipos + block.len < bhi {
                queue.push((block.qpos + block.len, ahi, block.ipos + block.len, bhi));
            }
        }
        blocks.sort_unstable();

        let mut collapsed: Vec<Block> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match collapsed.last_mut() {
                Some(last) if last.qpos + last.len == block.qpos && last.ipos + last.len == block.ipos => {
                    last.len += block.len;
                }
                _ => collapsed.push(block),
            }
        }
        collapsed
    }
}

/// Align one rule with the run from `qstart`, one match per block.
///
/// Single-token blocks are kept only for legalese tokens.
fn match_sequence<'a>(
    index: &'a LicenseIndex,
    rid: usize,
    query: &'a Query,
    qstart: usize,
    qend: usize,
    matchables: &Matchables,
) -> Vec<LicenseMatch<'a>> {
    let Some(high_postings) = index.high_postings_by_rid.get(&rid) else {
        return Vec::new();
    };
    let rule = index.rule(rid);
    let aligner = Aligner {
        qtokens: &query.tokens,
        itokens: &rule.tokens,
        high_postings,
        len_legalese: index.len_legalese,
        matchables,
    };

    aligner
        .match_blocks(qstart, qend)
        .into_iter()
        .filter(|b| b.len > 1 || index.is_high(query.tokens[b.qpos]))
        .map(|b| {
            let ispan = Span::from_range(b.ipos..b.ipos + b.len);
            let hispan = index.hispan(rule, &ispan);
            LicenseMatch::new(
                rid,
                rule,
                query,
                Span::from_range(b.qpos..b.qpos + b.len),
                ispan,
                hispan,
                MATCH_SEQ,
            )
        })
        .collect()
}

fn past_deadline(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Match each candidate over the run, repeatedly, to catch several
/// occurrences of the same rule.
fn match_candidates<'a>(
    index: &'a LicenseIndex,
    query: &'a Query,
    query_run: &QueryRun,
    candidates: &[Candidate],
    matchables: &Matchables,
    deadline: Option<Instant>,
) -> Vec<LicenseMatch<'a>> {
    let mut matches = Vec::new();
    for candidate in candidates {
        let mut qstart = query_run.start;
        while qstart < query_run.end {
            if past_deadline(deadline) {
                return matches;
            }
            let found = match_sequence(index, candidate.rid, query, qstart, query_run.end, matchables);
            let Some(last_end) = found.iter().map(|m| m.qend()).max() else {
                break;
            };
            matches.extend(found);
            qstart = last_end + 1;
        }
    }
    matches
}

/// Approximate matches of `query` against the approx-matchable rules.
///
/// Near-duplicates of the whole query are matched first and their regions
/// taken out before each query run is matched on its own.
pub fn seq_match<'a>(
    index: &'a LicenseIndex,
    query: &'a Query,
    matchables: &Matchables,
    deadline: Option<Instant>,
) -> Vec<LicenseMatch<'a>> {
    let mut matchables = matchables.clone();
    let mut matches = Vec::new();

    let whole = query.whole_query_run();
    if !whole.is_matchable(query, index, &matchables, false) {
        return matches;
    }

    let near_dupes = compute_candidates(index, query, &whole, &matchables, MAX_NEAR_DUPE_CANDIDATES, true);
    if !near_dupes.is_empty() {
        let found = match_candidates(index, query, &whole, &near_dupes, &matchables, deadline);
        for m in &found {
            matchables.subtract(&m.qspan);
        }
        matches.extend(found);
    }

    for query_run in &query.query_runs {
        if past_deadline(deadline) {
            log::debug!("Sequence matching stopped at deadline");
            break;
        }
        if !query_run.is_matchable(query, index, &matchables, false) {
            continue;
        }
        let candidates = compute_candidates(index, query, query_run, &matchables, MAX_CANDIDATES, false);
        matches.extend(match_candidates(
            index,
            query,
            query_run,
            &candidates,
            &matchables,
            deadline,
        ));
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::test_utils::{MIT_GRANT, create_test_index};

    #[test]
    fn test_seq_match_finds_modified_text() {
        let index = create_test_index(&[("mit_1.RULE", "mit", MIT_GRANT)]);
        let modified = MIT_GRANT.replace("free of charge", "at no cost whatsoever");
        let query = Query::new(&modified, &index);
        let matchables = Matchables::new(&query, &index);

        let matches = seq_match(&index, &query, &matchables, None);
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| m.rule.identifier == "mit_1.RULE"));
        assert!(matches.iter().all(|m| m.matcher == MATCH_SEQ));
        assert!(matches.iter().all(|m| m.qspan.len() == m.ispan.len()));
        let covered: usize = matches.iter().map(|m| m.len()).sum();
        assert!(covered > index.rule(0).length / 2);
    }

    #[test]
    fn test_seq_match_nothing_for_unrelated_text() {
        let index = create_test_index(&[("mit_1.RULE", "mit", MIT_GRANT)]);
        let query = Query::new("fn main() { println!(\"hello\"); }", &index);
        let matchables = Matchables::new(&query, &index);
        assert!(seq_match(&index, &query, &matchables, None).is_empty());
    }

    #[test]
    fn test_seq_match_respects_elapsed_deadline() {
        let index = create_test_index(&[("mit_1.RULE", "mit", MIT_GRANT)]);
        let query = Query::new(MIT_GRANT, &index);
        let matchables = Matchables::new(&query, &index);
        assert!(seq_match(&index, &query, &matchables, Some(Instant::now())).is_empty());
    }

    #[test]
    fn test_match_blocks_collapses_adjacent_blocks() {
        let postings: HashMap<u16, Vec<usize>> = [(0, vec![0]), (1, vec![2])].into_iter().collect();
        let qtokens = [0, 9, 1, 7];
        let itokens = [0, 9, 1];
        let query = Query {
            tokens: qtokens.to_vec(),
            ..Query::default()
        };
        let index = create_test_index(&[("r.RULE", "mit", "MIT license")]);
        let all = Matchables::new(&query, &index);
        let aligner = Aligner {
            qtokens: &qtokens,
            itokens: &itokens,
            high_postings: &postings,
            len_legalese: 5,
            matchables: &all,
        };
        assert_eq!(
            aligner.match_blocks(0, 4),
            vec![Block {
                qpos: 0,
                ipos: 0,
                len: 3
            }]
        );
    }

    #[test]
    fn test_candidates_rank_containment_first() {
        let a = Candidate {
            rid: 1,
            rounded: ScoresVector {
                is_highly_resemblant: false,
                containment: 0.9,
                resemblance: 0.1,
                matched_length: 1.0,
            },
            full: ScoresVector {
                is_highly_resemblant: false,
                containment: 0.9,
                resemblance: 0.1,
                matched_length: 20.0,
            },
        };
        let mut b = a.clone();
        b.rid = 0;
        b.rounded.containment = 0.5;
        b.full.containment = 0.5;
        let mut ranked = vec![b, a];
        ranked.sort_by(Candidate::rank);
        assert_eq!(ranked[0].rid, 1);
    }
}

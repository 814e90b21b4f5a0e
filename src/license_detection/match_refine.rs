//! Match refinement: merge, filter and finalize raw license matches.
//!
//! Raw matches from all strategies overlap and contradict each other. The
//! refinement pipeline merges matches to the same rule, drops weak
//! approximate matches, resolves containment and overlap between rules and
//! finally removes false positives. Every filter returns the matches it kept
//! and the matches it discarded, with the reason why.
//!
//! Pairwise filters hold matches in an [`Arena`] and tombstone the losers
//! instead of removing them while iterating.

use log::debug;
use strum::{AsRefStr, EnumIter};

use crate::license_detection::expression::licensing_contains;
use crate::license_detection::license_match::{LicenseMatch, MatchError};
use crate::license_detection::spans::Span;

/// Largest gap, in tokens, across which two matches to one rule merge.
pub const MAX_DIST: usize = 50;

/// Overlap ratio tiers used to resolve overlapping matches.
pub const OVERLAP_SMALL: f64 = 0.10;
pub const OVERLAP_MEDIUM: f64 = 0.40;
pub const OVERLAP_LARGE: f64 = 0.70;
pub const OVERLAP_EXTRA_LARGE: f64 = 0.90;

/// Unknown, short or digit tokens on each side that make a lone
/// approximate token spurious.
pub const SPURIOUS_SINGLE_TOKEN_UNKNOWN_COUNT: usize = 5;

/// Coverage below which a match to a small rule is too short.
pub const SMALL_RULE_MIN_COVERAGE: f64 = 80.0;

/// Minimum density required from an approximate match, by length bands.
///
/// Each band is `(max length, max high length, minimum density)`, checked in
/// order. The last band applies to every longer match.
pub const SPURIOUS_DENSITY_BANDS: &[(usize, usize, f64)] = &[
    (10, usize::MAX, 0.1),
    (15, usize::MAX, 0.2),
    (20, 5, 0.3),
    (30, 8, 0.4),
];
pub const SPURIOUS_DENSITY_DEFAULT: f64 = 0.5;

/// Why a refinement stage dropped a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum DiscardReason {
    Merged,
    UnknownWords,
    MissingRequiredPhrase,
    BelowMinimumCoverage,
    SpuriousSingleToken,
    TooShort,
    Spurious,
    Contained,
    Overlapping,
    FalsePositive,
    LowScore,
}

/// A match dropped during refinement.
#[derive(Debug, Clone)]
pub struct Discarded<'a> {
    pub license_match: LicenseMatch<'a>,
    pub reason: DiscardReason,
}

/// Kept and discarded matches of a stage.
pub type Filtered<'a> = (Vec<LicenseMatch<'a>>, Vec<Discarded<'a>>);

/// Result of the whole refinement pipeline.
#[derive(Debug, Clone, Default)]
pub struct Refined<'a> {
    /// Kept matches, sorted by query start.
    pub matches: Vec<LicenseMatch<'a>>,
    pub discarded: Vec<Discarded<'a>>,
}

/// Matches addressed by index, dropped by tombstoning.
struct Arena<'a> {
    slots: Vec<LicenseMatch<'a>>,
    tombstones: Vec<Option<DiscardReason>>,
}

impl<'a> Arena<'a> {
    fn new(matches: Vec<LicenseMatch<'a>>) -> Self {
        let tombstones = vec![None; matches.len()];
        Self {
            slots: matches,
            tombstones,
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn is_live(&self, i: usize) -> bool {
        self.tombstones[i].is_none()
    }

    /// First live slot at or after `from`.
    fn next_live(&self, from: usize) -> Option<usize> {
        (from..self.len()).find(|&i| self.is_live(i))
    }

    fn discard(&mut self, i: usize, reason: DiscardReason) {
        self.tombstones[i] = Some(reason);
    }

    fn into_filtered(self) -> Filtered<'a> {
        let mut kept = Vec::new();
        let mut discarded = Vec::new();
        for (m, tombstone) in self.slots.into_iter().zip(self.tombstones) {
            match tombstone {
                None => kept.push(m),
                Some(reason) => discarded.push(Discarded {
                    license_match: m,
                    reason,
                }),
            }
        }
        (kept, discarded)
    }
}

/// Sort key putting the best match first among those starting together.
fn sort_by_start(matches: &mut [LicenseMatch<'_>]) {
    matches.sort_by(|a, b| {
        a.qstart()
            .cmp(&b.qstart())
            .then_with(|| b.hilen().cmp(&a.hilen()))
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.matcher_order().cmp(&b.matcher_order()))
            .then_with(|| a.rid.cmp(&b.rid))
    });
}

enum MergeStep<'a> {
    Stop,
    Skip,
    DropNext,
    DropCurrent,
    ReplaceCurrent(LicenseMatch<'a>),
    ReplaceNext(LicenseMatch<'a>),
}

fn merge_step<'a>(
    current: &LicenseMatch<'a>,
    next: &LicenseMatch<'a>,
    max_rule_side_dist: usize,
) -> Result<MergeStep<'a>, MatchError> {
    if current.qdistance_to(next) > max_rule_side_dist || current.idistance_to(next) > max_rule_side_dist {
        return Ok(MergeStep::Stop);
    }
    if current.qspan == next.qspan && current.ispan == next.ispan {
        return Ok(MergeStep::DropNext);
    }
    if current.ispan == next.ispan && current.overlap(next) > 0 {
        return Ok(if current.qspan.magnitude() <= next.qspan.magnitude() {
            MergeStep::DropNext
        } else {
            MergeStep::DropCurrent
        });
    }
    if current.qcontains(next) {
        return Ok(MergeStep::DropNext);
    }
    if next.qcontains(current) {
        return Ok(MergeStep::DropCurrent);
    }
    if current.surround(next) {
        let combined = current.combine(next)?;
        return Ok(if combined.qspan.len() == combined.ispan.len() {
            MergeStep::ReplaceCurrent(combined)
        } else {
            MergeStep::Skip
        });
    }
    if next.surround(current) {
        let combined = current.combine(next)?;
        return Ok(if combined.qspan.len() == combined.ispan.len() {
            MergeStep::ReplaceNext(combined)
        } else {
            MergeStep::Skip
        });
    }
    if next.is_after(current) {
        return Ok(MergeStep::ReplaceCurrent(current.combine(next)?));
    }

    // Next starts inside current and ends after it, on both sides.
    let (cq, nq) = ((current.qstart(), current.qend()), (next.qstart(), next.qend()));
    let (ci, ni) = ((current.istart(), current.iend()), (next.istart(), next.iend()));
    if cq.0 <= nq.0 && nq.0 <= cq.1 && ci.0 <= ni.0 && ni.0 <= ci.1 && nq.1 > cq.1 && ni.1 > ci.1 {
        let qoverlap = current.qspan.overlap(&next.qspan);
        if qoverlap > 0 && qoverlap == current.ispan.overlap(&next.ispan) {
            return Ok(MergeStep::ReplaceCurrent(current.combine(next)?));
        }
    }
    Ok(MergeStep::Skip)
}

/// Merge matches to the same rule that are equal, nested, in sequence or
/// overlapping consistently, within `max_dist` tokens of each other.
///
/// # Errors
/// Returns `MatchError::RuleMismatch` if two matches of different rules are
/// ever combined.
pub fn merge_matches<'a>(
    mut matches: Vec<LicenseMatch<'a>>,
    max_dist: usize,
) -> Result<Vec<LicenseMatch<'a>>, MatchError> {
    if matches.len() < 2 {
        return Ok(matches);
    }
    matches.sort_by(|a, b| {
        a.rid
            .cmp(&b.rid)
            .then_with(|| a.qstart().cmp(&b.qstart()))
            .then_with(|| b.hilen().cmp(&a.hilen()))
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.matcher_order().cmp(&b.matcher_order()))
    });

    let mut merged = Vec::with_capacity(matches.len());
    let mut rest = matches.into_iter().peekable();
    while let Some(first) = rest.next() {
        let rid = first.rid;
        let mut group = vec![first];
        while let Some(m) = rest.next_if(|m| m.rid == rid) {
            group.push(m);
        }
        if group.len() == 1 {
            merged.extend(group);
            continue;
        }

        let rule_length = group[0].rule_length();
        let max_rule_side_dist = (rule_length / 2).clamp(1, max_dist.max(1));
        let mut arena = Arena::new(group);

        let mut i = 0;
        while let Some(ci) = arena.next_live(i) {
            let mut j = ci + 1;
            while let Some(nj) = arena.next_live(j) {
                match merge_step(&arena.slots[ci], &arena.slots[nj], max_rule_side_dist)? {
                    MergeStep::Stop => break,
                    MergeStep::Skip => j = nj + 1,
                    MergeStep::DropNext => {
                        arena.discard(nj, DiscardReason::Merged);
                        j = nj + 1;
                    }
                    MergeStep::ReplaceCurrent(combined) => {
                        arena.slots[ci] = combined;
                        arena.discard(nj, DiscardReason::Merged);
                        j = nj + 1;
                    }
                    MergeStep::DropCurrent => {
                        arena.discard(ci, DiscardReason::Merged);
                        break;
                    }
                    MergeStep::ReplaceNext(combined) => {
                        arena.slots[nj] = combined;
                        arena.discard(ci, DiscardReason::Merged);
                        break;
                    }
                }
            }
            i = ci + 1;
        }
        merged.extend(arena.into_filtered().0);
    }
    Ok(merged)
}

/// Partition matches with a per-match predicate returning a discard reason.
fn partition_by<'a>(
    matches: Vec<LicenseMatch<'a>>,
    reason_to_discard: impl Fn(&LicenseMatch<'a>) -> Option<DiscardReason>,
) -> Filtered<'a> {
    let mut kept = Vec::with_capacity(matches.len());
    let mut discarded = Vec::new();
    for m in matches {
        match reason_to_discard(&m) {
            Some(reason) => discarded.push(Discarded {
                license_match: m,
                reason,
            }),
            None => kept.push(m),
        }
    }
    (kept, discarded)
}

/// Drop matches to rules that only match known words when unknown tokens
/// appear inside the matched region.
pub fn filter_if_only_known_words_rule<'a>(matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    partition_by(matches, |m| {
        (m.rule.only_known_words && m.query.unknowns_within(&m.qspan) > 0).then_some(DiscardReason::UnknownWords)
    })
}

/// True if every required phrase of the rule is matched in full, as a
/// contiguous query region without unknown tokens.
fn has_required_phrases(m: &LicenseMatch<'_>) -> bool {
    let qpositions: Vec<usize> = m.qspan.iter().collect();
    let ipositions: Vec<usize> = m.ispan.iter().collect();
    m.rule.required_phrase_spans.iter().all(|phrase| {
        let required = Span::from_range(phrase.clone());
        if !m.ispan.contains(&required) {
            return false;
        }
        let aligned: Vec<usize> = ipositions
            .iter()
            .zip(&qpositions)
            .filter(|&(ipos, _)| phrase.contains(ipos))
            .map(|(_, &qpos)| qpos)
            .collect();
        match (aligned.first(), aligned.last()) {
            (Some(&first), Some(&last)) => {
                last - first + 1 == aligned.len()
                    && m.query.unknowns_within(&Span::from_inclusive(first, last)) == 0
            }
            _ => false,
        }
    })
}

/// Drop matches missing a required phrase of their rule.
pub fn filter_matches_missing_required_phrases<'a>(matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    partition_by(matches, |m| {
        (!m.rule.required_phrase_spans.is_empty() && !has_required_phrases(m))
            .then_some(DiscardReason::MissingRequiredPhrase)
    })
}

/// Drop approximate matches below the minimum coverage of their rule.
pub fn filter_rule_min_coverage<'a>(matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    partition_by(matches, |m| {
        let minimum = m.rule.minimum_coverage.filter(|&c| c > 0)?;
        (m.is_approximate() && m.coverage() < f64::from(minimum)).then_some(DiscardReason::BelowMinimumCoverage)
    })
}

/// Drop single-token approximate matches surrounded on both sides by
/// unknown, short or digit tokens.
pub fn filter_spurious_single_token<'a>(matches: Vec<LicenseMatch<'a>>, unknown_count: usize) -> Filtered<'a> {
    partition_by(matches, |m| {
        if m.len() != 1 || !m.is_approximate() {
            return None;
        }
        let query = m.query;
        let qstart = m.qstart();
        let qend = m.qend();

        let before = query.unknown_count_after(qstart.checked_sub(1))
            + (qstart.saturating_sub(unknown_count)..qstart)
                .filter(|&p| query.is_short_or_digit(p))
                .count();
        if before < unknown_count {
            return None;
        }
        let after = query.unknown_count_after(Some(qend))
            + (qend + 1..qend + 1 + unknown_count)
                .filter(|&p| query.is_short_or_digit(p))
                .count();
        (after >= unknown_count).then_some(DiscardReason::SpuriousSingleToken)
    })
}

/// True if an approximate match is too short for its rule.
fn is_short(m: &LicenseMatch<'_>) -> bool {
    let rule = m.rule;
    m.len() < rule.min_matched_length
        || m.hilen() < rule.min_high_matched_length
        || (rule.is_small && m.coverage() < SMALL_RULE_MIN_COVERAGE)
}

/// Drop approximate matches below the minimum lengths of their rule.
pub fn filter_short_matches<'a>(matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    partition_by(matches, |m| (m.is_approximate() && is_short(m)).then_some(DiscardReason::TooShort))
}

/// Minimum density for an approximate match of this length.
fn min_density(len: usize, hilen: usize) -> f64 {
    SPURIOUS_DENSITY_BANDS
        .iter()
        .find(|&&(max_len, max_hilen, _)| len < max_len && hilen < max_hilen)
        .map_or(SPURIOUS_DENSITY_DEFAULT, |&(_, _, density)| density)
}

/// Drop sparse approximate matches, the shorter the denser they must be.
pub fn filter_spurious_matches<'a>(matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    partition_by(matches, |m| {
        if !m.is_approximate() {
            return None;
        }
        let threshold = min_density(m.len(), m.hilen());
        (m.qdensity() < threshold || m.idensity() < threshold).then_some(DiscardReason::Spurious)
    })
}

/// Drop matches whose query region is contained in another match.
///
/// Of two matches with the same region the one with the best coverage wins.
pub fn filter_contained_matches<'a>(mut matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    sort_by_start(&mut matches);
    let mut arena = Arena::new(matches);

    let mut i = 0;
    while let Some(ci) = arena.next_live(i) {
        let mut j = ci + 1;
        while let Some(nj) = arena.next_live(j) {
            let (current, next) = (&arena.slots[ci], &arena.slots[nj]);
            if next.qend() > current.qend() {
                break;
            }
            if current.qspan == next.qspan {
                if current.coverage() >= next.coverage() {
                    arena.discard(nj, DiscardReason::Contained);
                    j = nj + 1;
                    continue;
                }
                arena.discard(ci, DiscardReason::Contained);
                break;
            }
            if current.qcontains(next) {
                arena.discard(nj, DiscardReason::Contained);
                j = nj + 1;
                continue;
            }
            if next.qcontains(current) {
                arena.discard(ci, DiscardReason::Contained);
                break;
            }
            j = nj + 1;
        }
        i = ci + 1;
    }
    arena.into_filtered()
}

enum OverlapOutcome {
    Keep,
    DropNext,
    DropCurrent,
}

/// Decide between two partially overlapping matches by overlap tier.
fn resolve_overlap(current: &LicenseMatch<'_>, next: &LicenseMatch<'_>, overlap: usize) -> OverlapOutcome {
    let (current_len, next_len) = (current.len(), next.len());
    let (current_hilen, next_hilen) = (current.hilen(), next.hilen());
    let ratio_to_next = overlap as f64 / next_len as f64;
    let ratio_to_current = overlap as f64 / current_len as f64;

    let current_wins = current_len >= next_len && current_hilen >= next_hilen;
    let next_wins = current_len <= next_len && current_hilen <= next_hilen;
    let current_licensing_wins = || licensing_contains(current.license_expression(), next.license_expression());
    let next_licensing_wins = || licensing_contains(next.license_expression(), current.license_expression());

    if ratio_to_next >= OVERLAP_EXTRA_LARGE && current_len >= next_len {
        return OverlapOutcome::DropNext;
    }
    if ratio_to_current >= OVERLAP_EXTRA_LARGE && current_len <= next_len {
        return OverlapOutcome::DropCurrent;
    }
    if ratio_to_next >= OVERLAP_LARGE && current_wins {
        return OverlapOutcome::DropNext;
    }
    if ratio_to_current >= OVERLAP_LARGE && next_wins {
        return OverlapOutcome::DropCurrent;
    }
    if ratio_to_next >= OVERLAP_MEDIUM || ratio_to_current >= OVERLAP_MEDIUM {
        if current_wins && current_licensing_wins() {
            return OverlapOutcome::DropNext;
        }
        if next_wins && next_licensing_wins() {
            return OverlapOutcome::DropCurrent;
        }
    }
    if ratio_to_next >= OVERLAP_SMALL
        && current.qspan.surround(&next.qspan)
        && current_wins
        && current_licensing_wins()
    {
        return OverlapOutcome::DropNext;
    }
    if ratio_to_current >= OVERLAP_SMALL
        && next.qspan.surround(&current.qspan)
        && next_wins
        && next_licensing_wins()
    {
        return OverlapOutcome::DropCurrent;
    }
    OverlapOutcome::Keep
}

/// Drop matches that partially overlap a better match.
///
/// Ties are broken by checking whether the current match is mostly covered
/// by its previous and next neighbors taken together.
pub fn filter_overlapping_matches<'a>(mut matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    sort_by_start(&mut matches);
    let mut arena = Arena::new(matches);

    let mut previous: Option<usize> = None;
    let mut i = 0;
    while let Some(ci) = arena.next_live(i) {
        let mut j = ci + 1;
        let mut current_dropped = false;
        while let Some(nj) = arena.next_live(j) {
            let (current, next) = (&arena.slots[ci], &arena.slots[nj]);
            if next.qstart() > current.qend() {
                break;
            }
            let overlap = current.overlap(next);
            if overlap == 0 {
                j = nj + 1;
                continue;
            }
            match resolve_overlap(current, next, overlap) {
                OverlapOutcome::DropNext => {
                    arena.discard(nj, DiscardReason::Overlapping);
                    j = nj + 1;
                    continue;
                }
                OverlapOutcome::DropCurrent => {
                    arena.discard(ci, DiscardReason::Overlapping);
                    current_dropped = true;
                    break;
                }
                OverlapOutcome::Keep => {}
            }

            if let Some(pi) = previous.filter(|&pi| arena.is_live(pi)) {
                let prev = &arena.slots[pi];
                if !prev.qspan.intersects(&next.qspan) {
                    let with_previous = current.overlap(prev);
                    let with_next = current.overlap(next);
                    if with_previous > 0
                        && with_next > 0
                        && (with_previous + with_next) as f64 >= current.len() as f64 * OVERLAP_EXTRA_LARGE
                    {
                        arena.discard(ci, DiscardReason::Overlapping);
                        current_dropped = true;
                        break;
                    }
                }
            }
            j = nj + 1;
        }
        if !current_dropped {
            previous = Some(ci);
        }
        i = ci + 1;
    }
    arena.into_filtered()
}

/// Bring back discarded matches that do not intersect any kept match.
///
/// The discarded matches are merged first. Those still discarded keep the
/// reason of the first discarded match.
///
/// # Returns
/// The restored matches and those still discarded.
pub fn restore_non_overlapping<'a>(
    kept: &[LicenseMatch<'a>],
    discarded: Vec<Discarded<'a>>,
) -> Result<Filtered<'a>, MatchError> {
    let mut kept_qspan = Span::new();
    for m in kept {
        kept_qspan.union_with(&m.qspan);
    }
    let Some(reason) = discarded.first().map(|d| d.reason) else {
        return Ok((Vec::new(), Vec::new()));
    };
    let candidates = merge_matches(discarded.into_iter().map(|d| d.license_match).collect(), MAX_DIST)?;

    Ok(partition_by(candidates, |m| {
        m.qspan.intersects(&kept_qspan).then_some(reason)
    }))
}

/// Drop matches to false positive rules.
pub fn filter_false_positive_matches<'a>(matches: Vec<LicenseMatch<'a>>) -> Filtered<'a> {
    partition_by(matches, |m| m.rule.is_false_positive.then_some(DiscardReason::FalsePositive))
}

/// Drop matches scoring below `min_score`. A zero `min_score` keeps all.
pub fn filter_low_score<'a>(matches: Vec<LicenseMatch<'a>>, min_score: f64) -> Filtered<'a> {
    if min_score <= 0.0 {
        return (matches, Vec::new());
    }
    partition_by(matches, |m| (m.score() < min_score).then_some(DiscardReason::LowScore))
}

fn log_stage(stage: &str, kept: usize, discarded: usize) {
    if discarded > 0 {
        debug!("refine {stage}: kept {kept}, discarded {discarded}");
    }
}

/// Run the full refinement pipeline over raw matches.
///
/// # Arguments
/// * `matches` - Raw matches from all strategies
/// * `min_score` - Minimum score of kept matches, `0` keeps all
///
/// # Errors
/// Returns `MatchError::RuleMismatch` if merging ever pairs different rules.
pub fn refine_matches<'a>(matches: Vec<LicenseMatch<'a>>, min_score: f64) -> Result<Refined<'a>, MatchError> {
    if matches.is_empty() {
        return Ok(Refined::default());
    }
    let mut all_discarded: Vec<Discarded<'a>> = Vec::new();
    let run = |stage: &str, (kept, discarded): Filtered<'a>, trail: &mut Vec<Discarded<'a>>| {
        log_stage(stage, kept.len(), discarded.len());
        trail.extend(discarded);
        kept
    };

    let matches = merge_matches(matches, MAX_DIST)?;

    let matches = run("only-known-words", filter_if_only_known_words_rule(matches), &mut all_discarded);
    let matches = run(
        "required-phrases",
        filter_matches_missing_required_phrases(matches),
        &mut all_discarded,
    );
    let matches = run("min-coverage", filter_rule_min_coverage(matches), &mut all_discarded);
    let matches = run(
        "spurious-single-token",
        filter_spurious_single_token(matches, SPURIOUS_SINGLE_TOKEN_UNKNOWN_COUNT),
        &mut all_discarded,
    );
    let matches = run("short", filter_short_matches(matches), &mut all_discarded);
    let matches = run("spurious", filter_spurious_matches(matches), &mut all_discarded);

    let matches = merge_matches(matches, MAX_DIST)?;

    let (matches, contained) = filter_contained_matches(matches);
    let (mut matches, overlapping) = filter_overlapping_matches(matches);
    log_stage("contained", matches.len(), contained.len());
    log_stage("overlapping", matches.len(), overlapping.len());

    for pending in [contained, overlapping] {
        let (restored, still_discarded) = restore_non_overlapping(&matches, pending)?;
        log_stage("restore", restored.len(), still_discarded.len());
        matches.extend(restored);
        all_discarded.extend(still_discarded);
    }

    let matches = run("contained", filter_contained_matches(matches), &mut all_discarded);
    let matches = run("false-positive", filter_false_positive_matches(matches), &mut all_discarded);
    let matches = run("low-score", filter_low_score(matches, min_score), &mut all_discarded);

    let mut matches = merge_matches(matches, MAX_DIST)?;
    sort_by_start(&mut matches);
    Ok(Refined {
        matches,
        discarded: all_discarded,
    })
}

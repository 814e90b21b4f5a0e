//! Span - efficient integer position sets.
//!
//! Spans track matched token positions on the query side and on the rule side.

use std::fmt;
use std::ops::Range;

/// An ordered, deduplicated set of token positions.
///
/// Positions are stored as sorted, disjoint and non-adjacent half-open ranges,
/// so two spans holding the same positions always compare equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Span {
    ranges: Vec<Range<usize>>,
}

impl Span {
    /// Create a new empty span.
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Create a span from a single half-open range.
    pub fn from_range(range: Range<usize>) -> Self {
        if range.start >= range.end {
            return Self::new();
        }
        Self {
            ranges: vec![range],
        }
    }

    /// Create a span covering `start..=end`.
    pub fn from_inclusive(start: usize, end: usize) -> Self {
        Self::from_range(start..end + 1)
    }

    /// Create a span from an iterator of positions.
    ///
    /// This converts individual positions into contiguous ranges.
    ///
    /// # Arguments
    /// * `positions` - Iterator over positions to include in the span
    pub fn from_iterator(positions: impl IntoIterator<Item = usize>) -> Self {
        let mut sorted: Vec<usize> = positions.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<Range<usize>> = Vec::new();
        for pos in sorted {
            match ranges.last_mut() {
                Some(last) if last.end == pos => last.end += 1,
                _ => ranges.push(pos..pos + 1),
            }
        }

        Self { ranges }
    }

    /// The canonical ranges backing this span.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of positions in this span.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.end - r.start).sum()
    }

    /// Smallest position, if any.
    pub fn start(&self) -> Option<usize> {
        self.ranges.first().map(|r| r.start)
    }

    /// Largest position (inclusive), if any.
    pub fn end(&self) -> Option<usize> {
        self.ranges.last().map(|r| r.end - 1)
    }

    /// Iterate over every position in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }

    pub fn contains_pos(&self, pos: usize) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if r.end <= pos {
                    std::cmp::Ordering::Less
                } else if r.start > pos {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Add a range to this span, merging with existing ranges if needed.
    pub fn add(&mut self, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        *self = self.union(&Span::from_range(range));
    }

    /// Return the union of this span and `other`.
    pub fn union(&self, other: &Span) -> Span {
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(self.ranges.len() + other.ranges.len());
        let mut left = self.ranges.iter().peekable();
        let mut right = other.ranges.iter().peekable();

        loop {
            let next = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => {
                    if l.start <= r.start {
                        left.next()
                    } else {
                        right.next()
                    }
                }
                (Some(_), None) => left.next(),
                (None, Some(_)) => right.next(),
                (None, None) => break,
            };
            let Some(range) = next else { break };

            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range.clone()),
            }
        }

        Span { ranges: merged }
    }

    /// Union `other` into this span in place.
    pub fn union_with(&mut self, other: &Span) {
        if other.is_empty() {
            return;
        }
        *self = self.union(other);
    }

    /// Return the positions present in both spans.
    pub fn intersection(&self, other: &Span) -> Span {
        let mut ranges = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < self.ranges.len() && j < other.ranges.len() {
            let a = &self.ranges[i];
            let b = &other.ranges[j];
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start < end {
                ranges.push(start..end);
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }

        Span { ranges }
    }

    /// Return the positions of this span that are not in `other`.
    pub fn difference(&self, other: &Span) -> Span {
        if other.is_empty() {
            return self.clone();
        }
        Span::from_iterator(self.iter().filter(|&p| !other.contains_pos(p)))
    }

    /// Count of positions shared with `other`.
    pub fn overlap(&self, other: &Span) -> usize {
        let mut count = 0;
        let (mut i, mut j) = (0, 0);

        while i < self.ranges.len() && j < other.ranges.len() {
            let a = &self.ranges[i];
            let b = &other.ranges[j];
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start < end {
                count += end - start;
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }

        count
    }

    pub fn intersects(&self, other: &Span) -> bool {
        self.overlap(other) > 0
    }

    /// True if every position of `other` is also in this span.
    pub fn contains(&self, other: &Span) -> bool {
        if other.is_empty() {
            return true;
        }
        let mut i = 0;
        for b in &other.ranges {
            while i < self.ranges.len() && self.ranges[i].end < b.end {
                i += 1;
            }
            match self.ranges.get(i) {
                Some(a) if a.start <= b.start && b.end <= a.end => {}
                _ => return false,
            }
        }
        true
    }

    /// True if this span's bounds enclose `other`'s bounds (gaps allowed).
    pub fn surround(&self, other: &Span) -> bool {
        match (self.start(), self.end(), other.start(), other.end()) {
            (Some(s), Some(e), Some(os), Some(oe)) => s <= os && e >= oe,
            _ => false,
        }
    }

    /// True if this span ends strictly before `other` starts.
    pub fn is_before(&self, other: &Span) -> bool {
        match (self.end(), other.start()) {
            (Some(end), Some(other_start)) => end < other_start,
            _ => false,
        }
    }

    /// True if this span starts strictly after `other` ends.
    pub fn is_after(&self, other: &Span) -> bool {
        other.is_before(self)
    }

    /// True if the two spans are immediately adjacent without overlapping.
    pub fn touch(&self, other: &Span) -> bool {
        match (self.start(), self.end(), other.start(), other.end()) {
            (Some(s), Some(e), Some(os), Some(oe)) => e + 1 == os || oe + 1 == s,
            _ => false,
        }
    }

    /// Positional distance to `other`: 0 when overlapping, 1 when touching.
    pub fn distance_to(&self, other: &Span) -> usize {
        if self.intersects(other) {
            return 0;
        }
        if self.touch(other) {
            return 1;
        }
        match (self.start(), self.end(), other.start(), other.end()) {
            (Some(s), Some(e), Some(os), Some(oe)) => {
                if self.is_before(other) {
                    os - e
                } else {
                    s.saturating_sub(oe)
                }
            }
            _ => 0,
        }
    }

    /// Length of the region from start to end, gaps included.
    pub fn magnitude(&self) -> usize {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end - start + 1,
            _ => 0,
        }
    }

    /// Ratio of length to magnitude; 1.0 for a contiguous span, 0.0 when empty.
    pub fn density(&self) -> f64 {
        let magnitude = self.magnitude();
        if magnitude == 0 {
            return 0.0;
        }
        self.len() as f64 / magnitude as f64
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span(")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if r.end - r.start == 1 {
                write!(f, "{}", r.start)?;
            } else {
                write!(f, "{}-{}", r.start, r.end - 1)?;
            }
        }
        write!(f, ")")
    }
}

impl FromIterator<usize> for Span {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Span::from_iterator(iter)
    }
}

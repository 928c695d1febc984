//! Span-keyed lookup for "what encloses X" and "what does X enclose".

use std::ops::Range;

use crate::span::Span;

/// An immutable collection of `(span, key)` entries sorted on
/// `(start, -end, key)`.
///
/// Both queries first cut the search space with a binary search on `start`:
///
/// * [`containing`](SpanIndex::containing) only looks at entries starting at
///   or before the query start, and walks a max-end tree over them so
///   subtrees whose spans all end too early are never visited;
/// * [`contained_by`](SpanIndex::contained_by) only looks at entries starting
///   inside the query span.
///
/// `containing` costs O((k + 1) log n) for k results.
///
/// Results come back in index order, so they are deterministic for a given
/// input set regardless of insertion order.
#[derive(Debug, Clone)]
pub struct SpanIndex<K> {
    entries: Vec<(Span, K)>,
    /// Implicit binary tree over `entries`: node 1 is the root, leaves start
    /// at `width`, every node holds the largest end below it.
    max_end: Vec<usize>,
    width: usize,
}

impl<K: Ord + Clone> SpanIndex<K> {
    pub fn new(items: impl IntoIterator<Item = (Span, K)>) -> Self {
        let mut entries: Vec<(Span, K)> = items.into_iter().collect();
        entries.sort_by(|(a, ka), (b, kb)| {
            a.first_widest_key()
                .cmp(&b.first_widest_key())
                .then_with(|| ka.cmp(kb))
        });
        let width = entries.len().next_power_of_two();
        let mut max_end = vec![0; 2 * width];
        for (i, (s, _)) in entries.iter().enumerate() {
            max_end[width + i] = s.end();
        }
        for node in (1..width).rev() {
            max_end[node] = max_end[2 * node].max(max_end[2 * node + 1]);
        }
        Self {
            entries,
            max_end,
            width,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys whose span encloses `span` (including equal spans).
    pub fn containing(&self, span: &Span) -> Vec<K> {
        let upper = self.entries.partition_point(|(s, _)| s.start() <= span.start());
        let mut hits = Vec::new();
        self.reaching(1, 0..self.width, upper, span.end(), &mut hits);
        hits.into_iter().map(|i| self.entries[i].1.clone()).collect()
    }

    /// All keys whose span is enclosed by `span` (including equal spans).
    pub fn contained_by(&self, span: &Span) -> Vec<K> {
        let lower = self.entries.partition_point(|(s, _)| s.start() < span.start());
        self.entries[lower..]
            .iter()
            .take_while(|(s, _)| s.start() <= span.end())
            .filter(|(s, _)| s.end() <= span.end())
            .map(|(_, k)| k.clone())
            .collect()
    }

    // Entries outside this range cannot enclose `span`.
    fn enclosing_window(&self, span: &Span) -> Range<usize> {
        let upper = self.entries.partition_point(|(s, _)| s.start() <= span.start());
        let lower = self.reach[..upper].partition_point(|&end| end < span.end());
        lower..upper
    }

    // Positions below `upper` whose span ends at or after `end`, in order.
    fn reaching(&self, node: usize, range: Range<usize>, upper: usize, end: usize, out: &mut Vec<usize>) {
        if range.start >= upper || self.max_end[node] < end {
            return;
        }
        if range.len() == 1 {
            out.push(range.start);
            return;
        }
        let mid = range.start + range.len() / 2;
        self.reaching(2 * node, range.start..mid, upper, end, out);
        self.reaching(2 * node + 1, mid..range.end, upper, end, out);
    }

    /// Iterate over every entry in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&Span, &K)> {
        self.entries.iter().map(|(s, k)| (s, k))
    }
}

// --- tests -------------------------------------------------------------------

//! Enclosure forest: containment inferred from span geometry alone.
//!
//! Stand-off annotations carry no parent pointers. The forest recovers them
//! by processing ranked annotation types from the outermost rank inward and
//! giving each annotation the tightest already-placed annotation that
//! encloses it as its parent.
//!
//! ```text
//! Dialogue [0,50)
//! └── Turn [0,20)
//!     └── Segment [0,10)
//!         └── token [0,3)
//! ```
//!
//! Ties between equally tight candidates of the same rank are resolved in
//! favour of the smallest id and reported as
//! [`AmbiguousEnclosure`](crate::report::IssueCode::AmbiguousEnclosure).

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::index::SpanIndex;
use crate::report::{Fault, ValidationReport};
use crate::span::Span;
use crate::types::{Annotation, AnnotationIx};

/// Single-parent forest over the ranked annotations of one document.
///
/// Indices are shared with the annotation arena it was built from.
/// Unranked annotations (rank 0) are present in the arena but have no parent,
/// no children and are not roots.
#[derive(Debug, Clone, Serialize)]
pub struct EnclosureForest {
    ids: Vec<String>,
    ranks: Vec<i32>,
    #[serde(skip)]
    spans: Vec<Span>,
    parent: Vec<Option<AnnotationIx>>,
    #[serde(skip)]
    children: Vec<Vec<AnnotationIx>>,
    roots: Vec<AnnotationIx>,
}

impl EnclosureForest {
    /// Build the forest. Ambiguous parent choices are raised on `report`.
    pub fn build(annotations: &[Annotation], report: &mut ValidationReport) -> Self {
        let n = annotations.len();
        let mut buckets: BTreeMap<i32, Vec<AnnotationIx>> = BTreeMap::new();
        for (i, a) in annotations.iter().enumerate() {
            if a.rank != 0 {
                buckets.entry(a.rank).or_default().push(AnnotationIx(i));
            }
        }

        let mut parent: Vec<Option<AnnotationIx>> = vec![None; n];
        let mut placed: Vec<(Span, AnnotationIx)> = Vec::new();

        // BTreeMap iterates most negative (outermost) rank first.
        for members in buckets.values() {
            let index = SpanIndex::new(placed.iter().copied());
            for &ix in members {
                let child = &annotations[ix.0];
                let mut candidates = index.containing(&child.span);
                if candidates.is_empty() {
                    continue;
                }
                candidates.sort_by_key(|c| tightness(&annotations[c.0]));

                let best = &annotations[candidates[0].0];
                let tied: Vec<String> = candidates
                    .iter()
                    .map(|c| &annotations[c.0])
                    .take_while(|c| c.span.len() == best.span.len() && c.rank == best.rank)
                    .map(|c| c.id.clone())
                    .collect();
                if tied.len() > 1 {
                    report.raise(Fault::AmbiguousEnclosure {
                        id: child.id.clone(),
                        chosen: best.id.clone(),
                        tied,
                    });
                }
                parent[ix.0] = Some(candidates[0]);
            }
            placed.extend(members.iter().map(|&ix| (annotations[ix.0].span, ix)));
        }

        let order = |ix: &AnnotationIx| {
            let a = &annotations[ix.0];
            (a.span.first_widest_key(), a.id.clone())
        };
        let mut children: Vec<Vec<AnnotationIx>> = vec![Vec::new(); n];
        let mut roots = Vec::new();
        for (i, p) in parent.iter().enumerate() {
            match p {
                Some(p) => children[p.0].push(AnnotationIx(i)),
                None if annotations[i].rank != 0 => roots.push(AnnotationIx(i)),
                None => {}
            }
        }
        for kids in &mut children {
            kids.sort_by_key(order);
        }
        roots.sort_by_key(order);

        tracing::debug!(
            annotations = n,
            ranks = buckets.len(),
            roots = roots.len(),
            "enclosure forest built"
        );

        Self {
            ids: annotations.iter().map(|a| a.id.clone()).collect(),
            ranks: annotations.iter().map(|a| a.rank).collect(),
            spans: annotations.iter().map(|a| a.span).collect(),
            parent,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True if the annotation takes part in the forest (non-zero rank).
    pub fn is_placed(&self, ix: AnnotationIx) -> bool {
        self.ranks[ix.0] != 0
    }

    pub fn id(&self, ix: AnnotationIx) -> &str {
        &self.ids[ix.0]
    }

    pub fn rank(&self, ix: AnnotationIx) -> i32 {
        self.ranks[ix.0]
    }

    pub fn span(&self, ix: AnnotationIx) -> Span {
        self.spans[ix.0]
    }

    pub fn parent(&self, ix: AnnotationIx) -> Option<AnnotationIx> {
        self.parent[ix.0]
    }

    /// Direct children, earliest and widest first.
    pub fn children(&self, ix: AnnotationIx) -> &[AnnotationIx] {
        &self.children[ix.0]
    }

    pub fn roots(&self) -> &[AnnotationIx] {
        &self.roots
    }

    /// Enclosing annotations, innermost first.
    pub fn ancestors(&self, ix: AnnotationIx) -> Ancestors<'_> {
        Ancestors {
            forest: self,
            next: self.parent(ix),
        }
    }

    /// True if `outer` transitively encloses `inner` in the forest.
    pub fn is_inside(&self, inner: AnnotationIx, outer: AnnotationIx) -> bool {
        self.ancestors(inner).any(|a| a == outer)
    }

    /// The nearest strict ancestor with the given rank.
    pub fn ancestor_with_rank(&self, ix: AnnotationIx, rank: i32) -> Option<AnnotationIx> {
        self.ancestors(ix).find(|a| self.rank(*a) == rank)
    }

    /// Everything below `ix`, in pre-order.
    pub fn descendants(&self, ix: AnnotationIx) -> Vec<AnnotationIx> {
        let mut out = Vec::new();
        let mut stack: Vec<AnnotationIx> = self.children(ix).iter().rev().copied().collect();
        while let Some(cur) = stack.pop() {
            out.push(cur);
            stack.extend(self.children(cur).iter().rev().copied());
        }
        out
    }

    pub fn depth(&self, ix: AnnotationIx) -> usize {
        self.ancestors(ix).count()
    }

    /// Display view with redundant wrapper levels collapsed.
    ///
    /// A node whose single child has exactly the same span is merged with
    /// that child. The result is for rendering only; structural questions
    /// must be asked of the forest itself.
    pub fn reduce(&self) -> ReducedForest {
        let mut reduced = ReducedForest::default();
        for &root in &self.roots {
            let r = self.collapse(root, &mut reduced);
            reduced.roots.push(r);
        }
        reduced
    }

    fn collapse(&self, ix: AnnotationIx, out: &mut ReducedForest) -> usize {
        let mut members = vec![ix];
        let mut cur = ix;
        while let [only] = self.children(cur) {
            if self.span(*only) != self.span(cur) {
                break;
            }
            cur = *only;
            members.push(cur);
        }
        let slot = out.nodes.len();
        out.nodes.push(ReducedNode {
            members,
            span: self.span(ix),
            children: Vec::new(),
        });
        let kids: Vec<usize> = self
            .children(cur)
            .iter()
            .map(|&c| self.collapse(c, out))
            .collect();
        out.nodes[slot].children = kids;
        slot
    }
}

/// Sort key for parent candidates: tightest span, then innermost rank,
/// then smallest id.
fn tightness(a: &Annotation) -> (usize, Reverse<i32>, String) {
    (a.span.len(), Reverse(a.rank), a.id.clone())
}

/// Iterator over the strict ancestors of an annotation, innermost first.
pub struct Ancestors<'a> {
    forest: &'a EnclosureForest,
    next: Option<AnnotationIx>,
}

impl Iterator for Ancestors<'_> {
    type Item = AnnotationIx;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = self.forest.parent(cur);
        Some(cur)
    }
}

/// A collapsed, display-only view of an [`EnclosureForest`].
#[derive(Debug, Clone, Default)]
pub struct ReducedForest {
    pub nodes: Vec<ReducedNode>,
    pub roots: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ReducedNode {
    /// Annotations folded into this node, outermost first.
    pub members: Vec<AnnotationIx>,
    pub span: Span,
    /// Indices into [`ReducedForest::nodes`].
    pub children: Vec<usize>,
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankTable;
    use crate::report::IssueCode;
    use crate::types::Features;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn ranks() -> RankTable {
        RankTable::new()
            .with("dialogue", -4)
            .with("turn", -3)
            .with("edu", -2)
            .with("token", -1)
    }

    fn anno(id: &str, type_name: &str, start: usize, end: usize) -> Annotation {
        Annotation {
            id: id.into(),
            type_name: type_name.into(),
            kind: None,
            span: Span::from_range(start, end),
            features: Features::new(),
            rank: ranks().rank(type_name),
        }
    }

    fn ix_of(annos: &[Annotation], id: &str) -> AnnotationIx {
        AnnotationIx(annos.iter().position(|a| a.id == id).unwrap())
    }

    fn parent_id<'a>(forest: &'a EnclosureForest, annos: &[Annotation], id: &str) -> Option<&'a str> {
        forest.parent(ix_of(annos, id)).map(|p| forest.id(p))
    }

    #[test]
    fn nested_chain_without_warnings() {
        let annos = vec![
            anno("tok", "token", 0, 3),
            anno("e", "edu", 0, 10),
            anno("t", "turn", 0, 20),
            anno("d", "dialogue", 0, 50),
        ];
        let mut report = ValidationReport::new();
        let forest = EnclosureForest::build(&annos, &mut report);

        assert!(report.is_clean());
        assert_eq!(parent_id(&forest, &annos, "tok"), Some("e"));
        assert_eq!(parent_id(&forest, &annos, "e"), Some("t"));
        assert_eq!(parent_id(&forest, &annos, "t"), Some("d"));
        assert_eq!(parent_id(&forest, &annos, "d"), None);
        assert_eq!(forest.roots(), &[ix_of(&annos, "d")]);
        assert!(forest.is_inside(ix_of(&annos, "tok"), ix_of(&annos, "d")));
        assert_eq!(forest.depth(ix_of(&annos, "tok")), 3);
    }

    #[test]
    fn equal_candidates_pick_smallest_id() {
        let annos = vec![
            anno("t-b", "turn", 0, 10),
            anno("t-a", "turn", 0, 10),
            anno("e", "edu", 2, 4),
        ];
        let mut report = ValidationReport::new();
        let forest = EnclosureForest::build(&annos, &mut report);

        assert_eq!(parent_id(&forest, &annos, "e"), Some("t-a"));
        let warnings = report.with_code(IssueCode::AmbiguousEnclosure);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].offending_ids, vec!["e", "t-a", "t-b"]);
        // same-rank annotations never parent each other
        assert_eq!(parent_id(&forest, &annos, "t-a"), None);
        assert_eq!(parent_id(&forest, &annos, "t-b"), None);
    }

    #[test]
    fn tightest_candidate_wins_across_ranks() {
        let annos = vec![
            anno("d", "dialogue", 0, 100),
            anno("t1", "turn", 0, 40),
            anno("t2", "turn", 40, 100),
            anno("e", "edu", 45, 50),
        ];
        let mut report = ValidationReport::new();
        let forest = EnclosureForest::build(&annos, &mut report);
        assert_eq!(parent_id(&forest, &annos, "e"), Some("t2"));
        assert!(report.is_clean());
    }

    #[test]
    fn equal_span_prefers_inner_rank() {
        // turn and dialogue cover the same text; the EDU belongs to the turn
        let annos = vec![
            anno("d", "dialogue", 0, 10),
            anno("t", "turn", 0, 10),
            anno("e", "edu", 2, 4),
        ];
        let mut report = ValidationReport::new();
        let forest = EnclosureForest::build(&annos, &mut report);
        assert_eq!(parent_id(&forest, &annos, "e"), Some("t"));
        assert!(report.is_clean());
    }

    #[test]
    fn unranked_annotations_are_left_out() {
        let annos = vec![anno("d", "dialogue", 0, 50), anno("p", "paragraph", 0, 10)];
        let mut report = ValidationReport::new();
        let forest = EnclosureForest::build(&annos, &mut report);
        let p = ix_of(&annos, "p");
        assert!(!forest.is_placed(p));
        assert_eq!(forest.parent(p), None);
        assert_eq!(forest.roots(), &[ix_of(&annos, "d")]);
        assert!(forest.children(ix_of(&annos, "d")).is_empty());
    }

    #[test]
    fn construction_is_deterministic() {
        let mut annos = vec![
            anno("d1", "dialogue", 0, 30),
            anno("d2", "dialogue", 0, 30),
            anno("t1", "turn", 0, 12),
            anno("t2", "turn", 12, 30),
            anno("t3", "turn", 12, 30),
            anno("e1", "edu", 0, 5),
            anno("e2", "edu", 5, 12),
            anno("e3", "edu", 14, 20),
            anno("k1", "token", 14, 16),
        ];
        let expected: Vec<(String, Option<String>)> = {
            let mut report = ValidationReport::new();
            let forest = EnclosureForest::build(&annos, &mut report);
            let mut pairs: Vec<_> = annos
                .iter()
                .map(|a| (a.id.clone(), parent_id(&forest, &annos, &a.id).map(String::from)))
                .collect();
            pairs.sort();
            pairs
        };

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            annos.shuffle(&mut rng);
            let mut report = ValidationReport::new();
            let forest = EnclosureForest::build(&annos, &mut report);
            let mut pairs: Vec<_> = annos
                .iter()
                .map(|a| (a.id.clone(), parent_id(&forest, &annos, &a.id).map(String::from)))
                .collect();
            pairs.sort();
            assert_eq!(pairs, expected);
            // t1, t2, t3 between the two dialogues; e3 between t2 and t3
            assert_eq!(report.with_code(IssueCode::AmbiguousEnclosure).len(), 4);
        }
    }

    #[test]
    fn descendants_in_preorder() {
        let annos = vec![
            anno("d", "dialogue", 0, 50),
            anno("t1", "turn", 0, 20),
            anno("t2", "turn", 20, 50),
            anno("e1", "edu", 0, 10),
            anno("e2", "edu", 25, 30),
        ];
        let mut report = ValidationReport::new();
        let forest = EnclosureForest::build(&annos, &mut report);
        let ids: Vec<&str> = forest
            .descendants(ix_of(&annos, "d"))
            .into_iter()
            .map(|ix| forest.id(ix))
            .collect();
        assert_eq!(ids, vec!["t1", "e1", "t2", "e2"]);
        assert_eq!(
            forest.ancestor_with_rank(ix_of(&annos, "e2"), -4),
            Some(ix_of(&annos, "d"))
        );
    }

    #[test]
    fn reduce_collapses_same_span_wrappers() {
        let annos = vec![
            anno("d", "dialogue", 0, 20),
            anno("t", "turn", 0, 20),
            anno("e1", "edu", 0, 8),
            anno("e2", "edu", 9, 20),
        ];
        let mut report = ValidationReport::new();
        let forest = EnclosureForest::build(&annos, &mut report);
        let reduced = forest.reduce();

        assert_eq!(reduced.roots.len(), 1);
        let root = &reduced.nodes[reduced.roots[0]];
        assert_eq!(root.members, vec![ix_of(&annos, "d"), ix_of(&annos, "t")]);
        assert_eq!(root.children.len(), 2);
        // the forest itself is untouched
        assert_eq!(parent_id(&forest, &annos, "t"), Some("d"));
    }
}

//! Where a node sits in the document: its turn, its dialogue and the tokens
//! it covers.

use serde::Serialize;

use crate::forest::EnclosureForest;
use crate::graph::Hypergraph;
use crate::types::{Annotation, AnnotationIx, Node, UnitKind};

/// Positional context of one [`Node`].
///
/// `turn` is the ancestor directly below the group annotation. Nodes outside
/// any group have no turn either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitContext {
    pub group: Option<AnnotationIx>,
    pub turn: Option<AnnotationIx>,
    /// Index of `turn` among the group's turns, earliest and widest first.
    pub turn_position: Option<usize>,
    /// The group's first turn.
    pub first_turn: Option<AnnotationIx>,
    /// Token annotations inside the node, in text order.
    pub tokens: Vec<AnnotationIx>,
}

impl UnitContext {
    pub fn for_node(
        node: &Node,
        annotations: &[Annotation],
        forest: &EnclosureForest,
        group_rank: Option<i32>,
    ) -> Self {
        let group = group_rank.and_then(|r| forest.ancestor_with_rank(node.annotation, r));
        let Some(group) = group else {
            return UnitContext {
                tokens: tokens(node, annotations, forest),
                ..Default::default()
            };
        };

        let turn = forest
            .ancestors(node.annotation)
            .find(|a| forest.parent(*a) == Some(group));
        let turns = forest.children(group);
        UnitContext {
            group: Some(group),
            turn,
            turn_position: turn.and_then(|t| turns.iter().position(|c| *c == t)),
            first_turn: turns.first().copied(),
            tokens: tokens(node, annotations, forest),
        }
    }

    /// True if the node lives in the first turn of its group.
    pub fn in_first_turn(&self) -> bool {
        self.turn.is_some() && self.turn == self.first_turn
    }
}

/// Context of every node of `graph`, indexed like [`Hypergraph::nodes`].
pub fn contexts(
    graph: &Hypergraph,
    annotations: &[Annotation],
    forest: &EnclosureForest,
    group_rank: Option<i32>,
) -> Vec<UnitContext> {
    graph
        .nodes()
        .iter()
        .map(|n| UnitContext::for_node(n, annotations, forest, group_rank))
        .collect()
}

fn tokens(node: &Node, annotations: &[Annotation], forest: &EnclosureForest) -> Vec<AnnotationIx> {
    forest
        .descendants(node.annotation)
        .into_iter()
        .filter(|a| annotations[a.0].kind == Some(UnitKind::Token))
        .collect()
}

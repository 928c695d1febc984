//! Core data types.
//!
//! Two families live here:
//!
//! * the **records** consumed from format readers ([`DocumentRecord`],
//!   [`AnnotationRecord`], [`RelationRecord`], [`SchemaRecord`]), which
//!   reference each other only by string id, and
//! * the **entities** the engine builds from them ([`Annotation`], [`Node`],
//!   [`Schema`], [`Relation`]), stored in flat arenas and addressed by the
//!   index newtypes ([`AnnotationIx`], [`NodeIx`], [`SchemaIx`],
//!   [`RelationIx`]).
//!
//! Unit types are a closed set ([`UnitKind`], [`SegmentKind`]) resolved
//! through an explicit lookup table; an unknown type string never becomes a
//! hypergraph unit.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::span::Span;

/// Free-form key/value features attached to any annotation, relation or
/// schema. Ordered so reports and dumps are stable.
pub type Features = BTreeMap<String, String>;

// --- unit kinds --------------------------------------------------------------

/// Error returned when a type string is not in the unit-kind table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown unit type {0:?}")]
pub struct UnknownKind(pub String);

/// The dialogue-act subtype of an elementary discourse unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    /// A segment with no dialogue act assigned yet.
    Plain,
    Offer,
    Counteroffer,
    Accept,
    Refusal,
    StrategicComment,
    Other,
}

/// Every annotation type the engine knows how to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitKind {
    Dialogue,
    Turn,
    Paragraph,
    /// An elementary discourse unit. The only kind that becomes a [`Node`].
    Segment(SegmentKind),
    Resource,
    Preference,
    SeveralResources,
    Token,
}

/// Type string → kind. The first entry for a kind is its canonical name.
const UNIT_KINDS: &[(&str, UnitKind)] = &[
    ("Dialogue", UnitKind::Dialogue),
    ("Turn", UnitKind::Turn),
    ("paragraph", UnitKind::Paragraph),
    ("Segment", UnitKind::Segment(SegmentKind::Plain)),
    ("Offer", UnitKind::Segment(SegmentKind::Offer)),
    ("Counteroffer", UnitKind::Segment(SegmentKind::Counteroffer)),
    ("Accept", UnitKind::Segment(SegmentKind::Accept)),
    ("Refusal", UnitKind::Segment(SegmentKind::Refusal)),
    ("Strategic_comment", UnitKind::Segment(SegmentKind::StrategicComment)),
    ("Other", UnitKind::Segment(SegmentKind::Other)),
    ("Resource", UnitKind::Resource),
    ("Preference", UnitKind::Preference),
    ("Several_resources", UnitKind::SeveralResources),
    ("token", UnitKind::Token),
];

impl UnitKind {
    /// Look a type string up in the kind table.
    pub fn lookup(type_name: &str) -> Option<UnitKind> {
        UNIT_KINDS
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|(_, kind)| *kind)
    }

    /// The canonical type string for this kind.
    pub fn name(&self) -> &'static str {
        UNIT_KINDS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// The segment subtype, if this is an elementary discourse unit.
    pub fn segment(&self) -> Option<SegmentKind> {
        match self {
            UnitKind::Segment(s) => Some(*s),
            _ => None,
        }
    }

    /// All type strings that resolve to a segment kind.
    pub fn segment_names() -> impl Iterator<Item = &'static str> {
        UNIT_KINDS
            .iter()
            .filter(|(_, kind)| kind.segment().is_some())
            .map(|(name, _)| *name)
    }
}

impl FromStr for UnitKind {
    type Err = UnknownKind;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitKind::lookup(s).ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(UnitKind::Segment(*self).name())
    }
}

// --- records -----------------------------------------------------------------

/// One document as produced by a format reader.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
    #[serde(default)]
    pub schemas: Vec<SchemaRecord>,
}

/// A typed stand-off span. Offsets are raw so malformed input can be
/// reported rather than rejected by the parser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub span: (i64, i64),
    #[serde(default)]
    pub features: Features,
}

/// A binary relation between two units, by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub label: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub features: Features,
}

/// A composite grouping (CDU) of units, by id. Members may name schemas
/// that appear later in the record list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub features: Features,
}

// --- arena indices -----------------------------------------------------------

macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_index!(
    /// Position of an [`Annotation`] in [`Document::annotations`](crate::Document::annotations).
    AnnotationIx
);
arena_index!(
    /// Position of a [`Node`] in the hypergraph node arena.
    NodeIx
);
arena_index!(
    /// Position of a [`Schema`] in the hypergraph schema arena.
    SchemaIx
);
arena_index!(
    /// Position of a [`Relation`] in the hypergraph relation arena.
    RelationIx
);

/// Anything a relation can point at or a schema can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitRef {
    Node(NodeIx),
    Schema(SchemaIx),
}

// --- entities ----------------------------------------------------------------

/// The capability shared by atomic and composite units.
pub trait Unit {
    fn id(&self) -> &str;
    fn span(&self) -> Span;
}

/// A validated annotation: its span is well formed and its id unique.
#[derive(Debug, Clone, Serialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip)]
    pub kind: Option<UnitKind>,
    pub span: Span,
    pub features: Features,
    /// Nesting rank from the rank table; 0 means "not placed in the forest".
    pub rank: i32,
}

/// An elementary discourse unit in the hypergraph.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    #[serde(serialize_with = "serialize_display")]
    pub kind: SegmentKind,
    pub annotation: AnnotationIx,
    pub span: Span,
    pub features: Features,
}

/// A complex discourse unit: an n-ary hyperedge over nodes and schemas.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Member ids, sorted and de-duplicated.
    pub member_ids: Vec<String>,
    #[serde(skip)]
    pub members: Vec<UnitRef>,
    /// Relations registered as internal to this schema.
    #[serde(skip)]
    pub internal_relations: Vec<RelationIx>,
    /// Minimal span enclosing every nested node.
    pub span: Span,
    pub features: Features,
}

/// A binary hyperedge between two units.
#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    pub id: String,
    #[serde(rename = "type")]
    pub label: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(skip)]
    pub source: UnitRef,
    #[serde(skip)]
    pub target: UnitRef,
    pub features: Features,
}

impl Relation {
    /// The endpoint opposite `unit`, if `unit` is an endpoint at all.
    pub fn other_end(&self, unit: UnitRef) -> Option<UnitRef> {
        if self.source == unit {
            Some(self.target)
        } else if self.target == unit {
            Some(self.source)
        } else {
            None
        }
    }
}

impl Unit for Annotation {
    fn id(&self) -> &str {
        &self.id
    }
    fn span(&self) -> Span {
        self.span
    }
}

impl Unit for Node {
    fn id(&self) -> &str {
        &self.id
    }
    fn span(&self) -> Span {
        self.span
    }
}

impl Unit for Schema {
    fn id(&self) -> &str {
        &self.id
    }
    fn span(&self) -> Span {
        self.span
    }
}

fn serialize_display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

// --- tests -------------------------------------------------------------------

//! Discourse structure reconstruction over stand-off annotations.
//!
//! Annotation tools store discourse annotation as flat records: typed spans
//! over the text, binary relations and complex units (CDUs) referencing
//! each other by id. This crate rebuilds the structure those records imply
//! and checks it for consistency. It is the library behind the `dgraph` CLI.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`span`] | Half-open character spans: [`Span`] |
//! | [`types`] | Records, entities, unit kinds: [`DocumentRecord`], [`Node`], [`Schema`], [`Relation`] |
//! | [`index`] | Span-keyed containment lookup: [`SpanIndex`] |
//! | [`forest`] | Containment inferred from spans: [`EnclosureForest`] |
//! | [`graph`] | Nodes, nested schemas and relations: [`Hypergraph`] |
//! | [`context`] | Turn / dialogue / token context of each node |
//! | [`validation`] | Puncture, cross-group, alignment, feature and connectivity checks |
//! | [`report`] | Findings: [`Issue`], [`ValidationReport`] |
//! | [`config`] | Rank table and check settings: [`Config`] |
//! | [`document`] | The build pipeline: [`Document::build`] |
//! | [`edit`] | Record edits followed by a rebuild |
//! | [`ids`] | Injected id generators |
//! | [`render`] | Plain-text rendering |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use discograph::{Config, Document, DocumentRecord};
//!
//! let record: DocumentRecord = serde_json::from_str(&json)?;
//! let built = Document::build(record, &Config::default());
//!
//! for issue in built.report.issues() {
//!     eprintln!("{issue}");
//! }
//! println!("{}", discograph::render::render_forest(&built.document));
//! ```

pub mod config;
pub mod context;
pub mod document;
pub mod edit;
pub mod forest;
pub mod graph;
pub mod ids;
pub mod index;
pub mod render;
pub mod report;
pub mod span;
pub mod types;
pub mod validation;

pub use config::{Config, ConfigError, RankTable};
pub use document::{Built, Document};
pub use edit::EditError;
pub use forest::EnclosureForest;
pub use graph::{DiscourseStructure, Hypergraph};
pub use ids::{IdGenerator, SequentialIds, StampedIds, Uuid7Ids};
pub use index::SpanIndex;
pub use report::{Issue, IssueCode, Severity, ValidationReport};
pub use span::{Span, SpanError};
pub use types::{
    Annotation, AnnotationRecord, DocumentRecord, Node, Relation, RelationRecord, Schema,
    SchemaRecord, SegmentKind, Unit, UnitKind, UnitRef,
};
pub use validation::ConsistencyChecker;

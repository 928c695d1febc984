//! The document pipeline: records in, validated structures and a report out.
//!
//! ```text
//! DocumentRecord
//!   → annotations (span checks, ranks)
//!   → EnclosureForest          positional structure
//!   → Hypergraph               referential structure
//!   → grouping, contexts
//!   → ConsistencyChecker
//!   → Document + ValidationReport
//! ```

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::Config;
use crate::context::{self, UnitContext};
use crate::edit::EditError;
use crate::forest::EnclosureForest;
use crate::graph::{AssemblyInput, DiscourseStructure, Grouping, Hypergraph};
use crate::report::{Element, Fault, ValidationReport};
use crate::span::Span;
use crate::types::{
    Annotation, AnnotationIx, DocumentRecord, Node, NodeIx, Relation, Schema, UnitKind,
};
use crate::validation::{CheckTarget, ConsistencyChecker};

/// A document together with everything found wrong with it.
#[derive(Debug, Clone)]
pub struct Built {
    pub document: Document,
    pub report: ValidationReport,
}

/// A fully assembled, read-only document.
#[derive(Debug, Clone)]
pub struct Document {
    record: DocumentRecord,
    annotations: Vec<Annotation>,
    forest: EnclosureForest,
    graph: Hypergraph,
    grouping: Grouping,
    structures: Vec<DiscourseStructure>,
    contexts: Vec<UnitContext>,
}

impl Document {
    /// Build a document from its records. Never fails: every problem ends
    /// up in the returned report and the faulty element is left out.
    pub fn build(record: DocumentRecord, config: &Config) -> Built {
        let mut report = ValidationReport::new();
        let annotations = annotations(&record, config, &mut report);
        let forest = EnclosureForest::build(&annotations, &mut report);

        let mut nodes = Vec::new();
        let mut foreign = HashMap::new();
        for (i, a) in annotations.iter().enumerate() {
            match a.kind.and_then(|k| k.segment()) {
                Some(kind) => nodes.push(Node {
                    id: a.id.clone(),
                    kind,
                    annotation: AnnotationIx(i),
                    span: a.span,
                    features: a.features.clone(),
                }),
                None => {
                    foreign.insert(a.id.clone(), a.type_name.clone());
                }
            }
        }
        let graph = Hypergraph::assemble(
            nodes,
            AssemblyInput {
                schemas: &record.schemas,
                relations: &record.relations,
                foreign: &foreign,
            },
            &mut report,
        );

        let group_rank = config.group_rank();
        let grouping = graph.group_units(|n| {
            group_rank.and_then(|r| forest.ancestor_with_rank(n.annotation, r))
        });
        let mut groups: Vec<AnnotationIx> = (0..annotations.len())
            .map(AnnotationIx)
            .filter(|ix| Some(annotations[ix.0].rank) == group_rank)
            .collect();
        groups.sort_by_key(|ix| {
            let a = &annotations[ix.0];
            (a.span.start(), Reverse(a.span.end()), a.id.clone())
        });
        let structures = graph.partition(&forest, &groups, &grouping);
        let contexts = context::contexts(&graph, &annotations, &forest, group_rank);

        let document = Document {
            record,
            annotations,
            forest,
            graph,
            grouping,
            structures,
            contexts,
        };
        document.checker(config).run(&mut report);

        tracing::debug!(
            document = %document.id(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "document built"
        );
        Built { document, report }
    }

    /// Apply an edit to a copy of the records and build the result.
    pub fn rebuild<T>(
        &self,
        config: &Config,
        edit: impl FnOnce(&mut DocumentRecord) -> Result<T, EditError>,
    ) -> Result<(Built, T), EditError> {
        let mut record = self.record.clone();
        let out = edit(&mut record)?;
        Ok((Document::build(record, config), out))
    }

    /// Checker bound to this document, for running individual predicates.
    pub fn checker<'a>(&'a self, config: &'a Config) -> ConsistencyChecker<'a> {
        ConsistencyChecker::new(
            CheckTarget {
                text: &self.record.text,
                annotations: &self.annotations,
                forest: &self.forest,
                graph: &self.graph,
                grouping: &self.grouping,
                contexts: &self.contexts,
            },
            config,
        )
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn text(&self) -> &str {
        &self.record.text
    }

    /// The records this document was built from.
    pub fn record(&self) -> &DocumentRecord {
        &self.record
    }

    pub fn to_record(&self) -> DocumentRecord {
        self.record.clone()
    }

    /// Annotations that survived span and id checks, in record order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, ix: AnnotationIx) -> &Annotation {
        &self.annotations[ix.0]
    }

    pub fn annotation_by_id(&self, id: &str) -> Option<AnnotationIx> {
        self.annotations.iter().position(|a| a.id == id).map(AnnotationIx)
    }

    pub fn forest(&self) -> &EnclosureForest {
        &self.forest
    }

    pub fn graph(&self) -> &Hypergraph {
        &self.graph
    }

    pub fn nodes(&self) -> &[Node] {
        self.graph.nodes()
    }

    pub fn schemas(&self) -> &[Schema] {
        self.graph.schemas()
    }

    pub fn relations(&self) -> &[Relation] {
        self.graph.relations()
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    /// One discourse structure per group annotation, in text order.
    pub fn structures(&self) -> &[DiscourseStructure] {
        &self.structures
    }

    pub fn context(&self, n: NodeIx) -> &UnitContext {
        &self.contexts[n.0]
    }

    /// Text covered by `span`, clamped to the document text.
    pub fn slice(&self, span: Span) -> String {
        self.record
            .text
            .chars()
            .skip(span.start())
            .take(span.len())
            .collect()
    }

    /// Serialisable view of everything that was built.
    pub fn dump(&self) -> DocumentDump<'_> {
        let graph = &self.graph;
        DocumentDump {
            id: self.id(),
            text: self.text(),
            annotations: &self.annotations,
            nodes: graph.nodes(),
            schemas: graph.schemas(),
            relations: graph.relations(),
            forest: &self.forest,
            structures: self
                .structures
                .iter()
                .map(|s| StructureDump {
                    id: &s.id,
                    span: s.span,
                    units: s.units.iter().map(|u| graph.unit_id(*u)).collect(),
                    relations: s.relations.iter().map(|r| graph.relation(*r).id.as_str()).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentDump<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub annotations: &'a [Annotation],
    pub nodes: &'a [Node],
    pub schemas: &'a [Schema],
    pub relations: &'a [Relation],
    pub forest: &'a EnclosureForest,
    pub structures: Vec<StructureDump<'a>>,
}

#[derive(Debug, Serialize)]
pub struct StructureDump<'a> {
    pub id: &'a str,
    pub span: Span,
    pub units: Vec<&'a str>,
    pub relations: Vec<&'a str>,
}

// Validate annotation records into the annotation arena.
fn annotations(record: &DocumentRecord, config: &Config, report: &mut ValidationReport) -> Vec<Annotation> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(record.annotations.len());
    for a in &record.annotations {
        let span = match Span::new(a.span.0, a.span.1) {
            Ok(span) => span,
            Err(source) => {
                report.raise(Fault::MalformedSpan {
                    id: a.id.clone(),
                    source,
                });
                continue;
            }
        };
        if !seen.insert(a.id.as_str()) {
            report.raise(Fault::DuplicateId {
                id: a.id.clone(),
                element: Element::Annotation,
            });
            continue;
        }
        if span.is_empty() {
            report.raise(Fault::DegenerateSpan {
                id: a.id.clone(),
                span,
            });
        }
        out.push(Annotation {
            id: a.id.clone(),
            type_name: a.type_name.clone(),
            kind: UnitKind::lookup(&a.type_name),
            span,
            features: a.features.clone(),
            rank: config.ranks.rank(&a.type_name),
        });
    }
    out
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit;
    use crate::ids::SequentialIds;
    use crate::report::IssueCode;
    use crate::types::{AnnotationRecord, Features, RelationRecord};

    fn ann(id: &str, type_name: &str, start: i64, end: i64) -> AnnotationRecord {
        AnnotationRecord {
            id: id.into(),
            type_name: type_name.into(),
            span: (start, end),
            features: Features::new(),
        }
    }

    fn record() -> DocumentRecord {
        DocumentRecord {
            id: "pilot01".into(),
            text: "1 : ann : hi there 2 : bob : hello you all".into(),
            annotations: vec![
                ann("d1", "Dialogue", 0, 42),
                ann("t1", "Turn", 0, 18),
                ann("t2", "Turn", 19, 42),
                ann("e1", "Segment", 10, 12),
                ann("e2", "Offer", 29, 34),
                ann("res", "Resource", 35, 42),
            ],
            relations: vec![RelationRecord {
                id: "r1".into(),
                label: "Question-answer_pair".into(),
                source_id: "e1".into(),
                target_id: "e2".into(),
                features: Features::new(),
            }],
            schemas: vec![],
        }
    }

    fn quiet() -> Config {
        let mut config = Config::default();
        config.checks.features = false;
        config
    }

    #[test]
    fn builds_all_layers() {
        let Built { document, report } = Document::build(record(), &quiet());
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(document.annotations().len(), 6);
        assert_eq!(document.nodes().len(), 2);
        assert_eq!(document.nodes()[1].kind.to_string(), "Offer");
        assert_eq!(document.relations().len(), 1);

        let e2 = document.annotation_by_id("e2").unwrap();
        let t2 = document.annotation_by_id("t2").unwrap();
        assert_eq!(document.forest().parent(e2), Some(t2));
        // resources are not ranked
        let res = document.annotation_by_id("res").unwrap();
        assert!(!document.forest().is_placed(res));

        assert_eq!(document.structures().len(), 1);
        assert_eq!(document.structures()[0].id, "d1");
        assert_eq!(document.structures()[0].units.len(), 2);
        assert_eq!(document.context(NodeIx(1)).turn, Some(t2));
        assert_eq!(document.slice(document.nodes()[0].span), "hi");
    }

    #[test]
    fn malformed_and_duplicate_annotations_are_dropped() {
        let mut rec = record();
        rec.annotations.push(ann("bad", "Segment", 10, 5));
        rec.annotations.push(ann("e1", "Segment", 13, 18));
        rec.annotations.push(ann("dot", "Segment", 18, 18));
        let Built { document, report } = Document::build(rec, &quiet());

        assert_eq!(report.with_code(IssueCode::MalformedSpan)[0].offending_ids, vec!["bad"]);
        assert_eq!(report.with_code(IssueCode::DuplicateId).len(), 1);
        assert_eq!(report.with_code(IssueCode::DegenerateSpan).len(), 1);
        assert_eq!(document.annotations().len(), 7);
        assert!(document.graph().resolve("e1").is_some());
    }

    #[test]
    fn relation_to_a_turn_dangles() {
        let mut rec = record();
        rec.relations[0].target_id = "t2".into();
        let Built { document, report } = Document::build(rec, &quiet());
        assert!(document.relations().is_empty());
        let dangling = report.with_code(IssueCode::DanglingReference);
        assert!(dangling[0].message.contains("\"Turn\" annotation"));
    }

    #[test]
    fn rebuild_applies_edits() {
        let Built { document, .. } = Document::build(record(), &quiet());
        let mut ids = SequentialIds::new("x");
        let (built, id) = document
            .rebuild(&quiet(), |rec| {
                edit::add_schema(rec, &mut ids, "Complex_discourse_unit", &["e1", "e2"])
            })
            .unwrap();
        assert_eq!(id, "x1");
        assert_eq!(built.document.schemas().len(), 1);
        // the source document is untouched
        assert!(document.schemas().is_empty());

        let err = document
            .rebuild(&quiet(), |rec| edit::remove(rec, "ghost"))
            .unwrap_err();
        assert_eq!(err, EditError::UnknownId("ghost".into()));
    }

    #[test]
    fn dump_serialises() {
        let Built { document, .. } = Document::build(record(), &quiet());
        let json = serde_json::to_value(document.dump()).unwrap();
        assert_eq!(json["nodes"][0]["kind"], "Segment");
        assert_eq!(json["relations"][0]["source_id"], "e1");
        assert_eq!(json["structures"][0]["units"], serde_json::json!(["e1", "e2"]));
        assert_eq!(json["annotations"][0]["span"], serde_json::json!([0, 42]));
    }
}

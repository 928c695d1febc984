//! Human-readable text rendering of documents, forests and reports.
//!
//! The output is stable plain text for terminals and logs. It is not a
//! canonical format; use the JSON dump for machine consumption.

use crate::document::Document;
use crate::forest::ReducedForest;
use crate::report::{Issue, ValidationReport};
use crate::types::UnitRef;

/// Render the enclosure forest of `doc` as an indented tree.
///
/// Wrapper levels sharing their only child's span are folded onto one line.
///
/// ```text
/// Dialogue d1 [0,42)
/// ├── Turn t1 [0,18)
/// │   └── Segment e1 [10,12)  "hi"
/// └── Turn t2 [19,42)
///     └── Offer e2 [29,34)  "hello"
/// ```
pub fn render_forest(doc: &Document) -> String {
    let reduced = doc.forest().reduce();
    let mut out = String::new();
    for &root in &reduced.roots {
        out.push_str(&node_line(doc, &reduced, root));
        out.push('\n');
        push_children(doc, &reduced, root, "", &mut out);
    }
    out
}

fn push_children(doc: &Document, reduced: &ReducedForest, slot: usize, prefix: &str, out: &mut String) {
    let kids = &reduced.nodes[slot].children;
    for (i, &kid) in kids.iter().enumerate() {
        let last = i + 1 == kids.len();
        let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        out.push_str(&format!("{}{}{}\n", prefix, branch, node_line(doc, reduced, kid)));
        push_children(doc, reduced, kid, &format!("{}{}", prefix, indent), out);
    }
}

fn node_line(doc: &Document, reduced: &ReducedForest, slot: usize) -> String {
    let node = &reduced.nodes[slot];
    let labels: Vec<String> = node
        .members
        .iter()
        .map(|ix| {
            let a = doc.annotation(*ix);
            format!("{} {}", a.type_name, a.id)
        })
        .collect();
    let mut line = format!("{} {}", labels.join(" = "), node.span);
    if node.children.is_empty() {
        line.push_str(&format!("  \"{}\"", truncate(&doc.slice(node.span), 40)));
    }
    line
}

/// Render a report: errors first, then warnings.
///
/// ```text
/// pilot01: 1 error, 2 warnings
///   error    Puncture: relation "r2" (e2 -> e3) punctures a schema boundary
///   warning  CohesionViolation: schema "s2" has islands: e3 not linked to another member
/// ```
pub fn render_report(doc_id: &str, report: &ValidationReport) -> String {
    let mut out = format!(
        "{}: {}, {}\n",
        doc_id,
        plural(report.errors.len(), "error"),
        plural(report.warnings.len(), "warning")
    );
    for issue in report.issues() {
        out.push_str(&issue_line(issue));
        out.push('\n');
    }
    out
}

fn issue_line(issue: &Issue) -> String {
    format!("  {:<8} {}: {}", issue.severity, issue.code, issue.message)
}

/// Render a document as a summary grouped by discourse structure.
///
/// ```text
/// Document pilot01  2 nodes, 0 schemas, 1 relation
/// ───────────────────────────────────────────────
///
/// d1 [0,42)
///   e1  Segment  "hi"
///   e2  Offer    "hello"
///   e1 -Question-answer_pair-> e2
/// ```
pub fn render_document(doc: &Document) -> String {
    let graph = doc.graph();
    let header = format!(
        "Document {}  {}, {}, {}",
        doc.id(),
        plural(graph.nodes().len(), "node"),
        plural(graph.schemas().len(), "schema"),
        plural(graph.relations().len(), "relation")
    );
    let rule = "─".repeat(header.chars().count());
    let mut out = format!("{}\n{}\n", header, rule);

    for s in doc.structures() {
        out.push('\n');
        out.push_str(&format!("{} {}\n", s.id, s.span));
        for unit in &s.units {
            match unit {
                UnitRef::Node(n) => {
                    let node = graph.node(*n);
                    out.push_str(&format!(
                        "  {}  {}  \"{}\"\n",
                        node.id,
                        node.kind,
                        truncate(&doc.slice(node.span), 60)
                    ));
                }
                UnitRef::Schema(ix) => {
                    let schema = graph.schema(*ix);
                    out.push_str(&format!(
                        "  {}  {}  {{{}}}\n",
                        schema.id,
                        schema.type_name,
                        schema.member_ids.join(", ")
                    ));
                }
            }
        }
        for r in &s.relations {
            let rel = graph.relation(*r);
            out.push_str(&format!("  {} -{}-> {}\n", rel.source_id, rel.label, rel.target_id));
        }
    }

    out
}

// --- helpers -----------------------------------------------------------------

fn plural(n: usize, word: &str) -> String {
    format!("{} {}{}", n, word, if n == 1 { "" } else { "s" })
}

fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::{Built, Document};
    use crate::report::Fault;
    use crate::types::{AnnotationRecord, DocumentRecord, Features, RelationRecord};

    fn ann(id: &str, type_name: &str, start: i64, end: i64) -> AnnotationRecord {
        AnnotationRecord {
            id: id.into(),
            type_name: type_name.into(),
            span: (start, end),
            features: Features::new(),
        }
    }

    fn built() -> Built {
        let record = DocumentRecord {
            id: "pilot01".into(),
            text: "1 : ann : hi there 2 : bob : hello you all".into(),
            annotations: vec![
                ann("d1", "Dialogue", 0, 42),
                ann("t1", "Turn", 0, 18),
                ann("t2", "Turn", 19, 42),
                ann("e1", "Segment", 10, 12),
                ann("e2", "Offer", 29, 34),
            ],
            relations: vec![RelationRecord {
                id: "r1".into(),
                label: "Question-answer_pair".into(),
                source_id: "e1".into(),
                target_id: "e2".into(),
                features: Features::new(),
            }],
            schemas: vec![],
        };
        Document::build(record, &Config::default())
    }

    #[test]
    fn forest_tree() {
        let rendered = render_forest(&built().document);
        let expected = "\
Dialogue d1 [0,42)
├── Turn t1 [0,18)
│   └── Segment e1 [10,12)  \"hi\"
└── Turn t2 [19,42)
    └── Offer e2 [29,34)  \"hello\"
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn wrappers_fold_onto_one_line() {
        let record = DocumentRecord {
            id: "solo".into(),
            text: "1 : ann : hi".into(),
            annotations: vec![
                ann("d1", "Dialogue", 0, 12),
                ann("t1", "Turn", 0, 12),
                ann("e1", "Segment", 10, 12),
            ],
            ..Default::default()
        };
        let Built { document, .. } = Document::build(record, &Config::default());
        let rendered = render_forest(&document);
        assert!(rendered.starts_with("Dialogue d1 = Turn t1 [0,12)\n"));
    }

    #[test]
    fn report_lists_errors_first() {
        let mut report = ValidationReport::new();
        report.raise(Fault::Disconnected { id: "e9".into() });
        report.raise(Fault::EmptySchema { id: "c1".into() });
        let rendered = render_report("doc", &report);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "doc: 1 error, 1 warning");
        assert!(lines[1].contains("EmptySchema"));
        assert!(lines[2].contains("Disconnected"));
    }

    #[test]
    fn document_summary() {
        let rendered = render_document(&built().document);
        assert!(rendered.starts_with("Document pilot01  2 nodes, 0 schemas, 1 relation\n"));
        assert!(rendered.contains("d1 [0,42)"));
        assert!(rendered.contains("e2  Offer  \"hello\""));
        assert!(rendered.contains("e1 -Question-answer_pair-> e2"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héll…");
        assert_eq!(truncate("  short ", 10), "short");
    }
}

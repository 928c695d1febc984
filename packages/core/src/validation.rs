//! Consistency checks over an assembled document.
//!
//! Every check is a pure predicate over the forest and hypergraph; [`run`]
//! walks the document and raises a [`Fault`] for each hit.
//!
//! | Check | Applies to | Severity |
//! |-------|------------|----------|
//! | puncture | relations | error |
//! | cross-group | relations, schemas | error |
//! | self-acknowledgement | acknowledgement relations | warning |
//! | span out of bounds | annotations | warning |
//! | maybe misaligned | nodes | warning |
//! | missing / unexpected / FIXME features | annotations, relations, schemas | warning |
//! | disconnected | nodes | warning |
//!
//! [`run`]: ConsistencyChecker::run

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;
use crate::context::UnitContext;
use crate::forest::EnclosureForest;
use crate::graph::{Grouping, Hypergraph};
use crate::report::{Element, Fault, ValidationReport};
use crate::span::Span;
use crate::types::{Annotation, Features, NodeIx, RelationIx, SchemaIx, UnitRef};

/// Rough type under which segment annotations are audited.
const EDU: &str = "EDU";
/// Rough type under which relations are audited.
const RELATION: &str = "relation";

/// Feature values still awaiting an annotator's decision.
static FIXME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^FIXME").expect("invalid FIXME regex"));

/// The parts of a built document the checks look at.
#[derive(Debug, Clone, Copy)]
pub struct CheckTarget<'a> {
    pub text: &'a str,
    pub annotations: &'a [Annotation],
    pub forest: &'a EnclosureForest,
    pub graph: &'a Hypergraph,
    pub grouping: &'a Grouping,
    /// Indexed like [`Hypergraph::nodes`].
    pub contexts: &'a [UnitContext],
}

pub struct ConsistencyChecker<'a> {
    target: CheckTarget<'a>,
    chars: Vec<char>,
    config: &'a Config,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(target: CheckTarget<'a>, config: &'a Config) -> Self {
        Self {
            chars: target.text.chars().collect(),
            target,
            config,
        }
    }

    /// Run every enabled check, raising findings on `report`.
    pub fn run(&self, report: &mut ValidationReport) {
        let before = (report.errors.len(), report.warnings.len());
        self.check_relations(report);
        self.check_schemas(report);
        self.check_spans(report);
        if self.config.checks.features {
            self.check_features(report);
        }
        if self.config.checks.connectivity {
            match self.config.turn_prefix() {
                Ok(prefix) => self.check_connectivity(&prefix, report),
                Err(e) => tracing::warn!(error = %e, "skipping connectivity check"),
            }
        }
        tracing::debug!(
            errors = report.errors.len() - before.0,
            warnings = report.warnings.len() - before.1,
            "consistency checks done"
        );
    }

    // --- predicates ----------------------------------------------------------

    /// Enclosing schemas of `unit`, outermost first.
    pub fn containing_schema_chain(&self, unit: UnitRef) -> Vec<SchemaIx> {
        self.target.graph.containing_schema_chain(unit)
    }

    /// A relation punctures a schema boundary unless both endpoints are
    /// direct members of one schema, or the container chain of one endpoint
    /// is a prefix of the other's.
    pub fn is_puncture(&self, r: RelationIx) -> bool {
        let graph = self.target.graph;
        let rel = graph.relation(r);
        let to = graph.direct_containers(rel.target);
        if graph
            .direct_containers(rel.source)
            .iter()
            .any(|s| to.contains(s))
        {
            return false;
        }
        let a = self.containing_schema_chain(rel.source);
        let b = self.containing_schema_chain(rel.target);
        let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
        !long.starts_with(short)
    }

    /// True when the endpoints sit in different groups, or either in none.
    pub fn is_cross_group(&self, r: RelationIx) -> bool {
        self.target
            .grouping
            .of_relation(self.target.graph, r)
            .is_none()
    }

    /// The speaker of a unit: the speaker feature of a node's turn, or the
    /// one speaker shared by every node nested in a schema.
    pub fn speaker(&self, unit: UnitRef) -> Option<&'a str> {
        match unit {
            UnitRef::Node(n) => self.node_speaker(n),
            UnitRef::Schema(s) => {
                let speakers: BTreeSet<Option<&str>> = self
                    .target
                    .graph
                    .terminals(s)
                    .into_iter()
                    .map(|n| self.node_speaker(n))
                    .collect();
                match speakers.len() {
                    1 => speakers.into_iter().next().flatten(),
                    _ => None,
                }
            }
        }
    }

    /// An acknowledgement whose endpoints are both by the same speaker.
    pub fn is_self_acknowledgement(&self, r: RelationIx) -> bool {
        let rel = self.target.graph.relation(r);
        if rel.label != self.config.checks.acknowledgement_label {
            return false;
        }
        match (self.speaker(rel.source), self.speaker(rel.target)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// True when the terminals of `schema` do not share a single group.
    pub fn is_cross_group_schema(&self, schema: SchemaIx) -> bool {
        self.target.grouping.of(UnitRef::Schema(schema)).is_none()
    }

    /// Smallest span covering every node nested anywhere inside `schema`.
    pub fn minimal_span(&self, schema: SchemaIx) -> Span {
        let graph = self.target.graph;
        let spans: Vec<Span> = graph
            .terminals(schema)
            .into_iter()
            .map(|n| graph.node(n).span)
            .collect();
        Span::merge_all(&spans).unwrap_or(graph.schema(schema).span)
    }

    /// True if the character just outside either end of `span` is not
    /// whitespace.
    pub fn is_maybe_misaligned(&self, span: Span) -> bool {
        let start_ok = span.start() == 0
            || self
                .chars
                .get(span.start() - 1)
                .map_or(true, |c| c.is_whitespace());
        let end_ok = span.end() >= self.chars.len() || self.chars[span.end()].is_whitespace();
        !(start_ok && end_ok)
    }

    pub fn is_out_of_bounds(&self, span: Span) -> bool {
        span.end() > self.chars.len()
    }

    /// A node is connected if it has an incoming relation, leaves through a
    /// whitelisted relation, or opens the first turn of its group.
    pub fn is_disconnected(&self, n: NodeIx, turn_prefix: &Regex) -> bool {
        let graph = self.target.graph;
        let unit = UnitRef::Node(n);
        let ctx = &self.target.contexts[n.0];
        if ctx.group.is_none() {
            return true;
        }
        if !graph.incoming(unit).is_empty() {
            return false;
        }
        let whitelist = &self.config.checks.backwards_whitelist;
        if graph
            .outgoing(unit)
            .iter()
            .any(|r| whitelist.contains(&graph.relation(*r).label))
        {
            return false;
        }
        match ctx.first_turn {
            Some(turn) => {
                let span = self.target.forest.span(turn);
                let turn_text = self.slice(span);
                let skip = turn_prefix
                    .find(&turn_text)
                    .filter(|m| m.start() == 0)
                    .map_or(0, |m| turn_text[..m.end()].chars().count());
                graph.node(n).span.start() != span.start() + skip
            }
            None => true,
        }
    }

    /// Expected features that are absent or empty. `text` is the covered
    /// text, used for the EDU whitelist.
    pub fn missing_features(&self, rough_type: &str, features: &Features, text: &str) -> Vec<String> {
        let rules = &self.config.features;
        let Some(expected) = rules.expected.get(rough_type) else {
            return Vec::new();
        };
        if rough_type == EDU {
            let text = text.trim().to_lowercase();
            if rules.text_whitelist.contains(&text) {
                return Vec::new();
            }
        }
        expected
            .iter()
            .filter(|k| features.get(*k).map_or(true, |v| v.is_empty()))
            .cloned()
            .collect()
    }

    /// Features neither expected nor ignored for this rough type.
    pub fn unexpected_features(&self, rough_type: &str, features: &Features) -> Vec<String> {
        let rules = &self.config.features;
        let Some(expected) = rules.expected.get(rough_type) else {
            return Vec::new();
        };
        features
            .keys()
            .filter(|k| !expected.contains(*k) && !rules.ignored.contains(*k))
            .cloned()
            .collect()
    }

    // --- walkers -------------------------------------------------------------

    fn check_relations(&self, report: &mut ValidationReport) {
        for (i, rel) in self.target.graph.relations().iter().enumerate() {
            let r = RelationIx(i);
            if self.is_puncture(r) {
                report.raise(Fault::Puncture {
                    relation: rel.id.clone(),
                    source_id: rel.source_id.clone(),
                    target_id: rel.target_id.clone(),
                });
            }
            if self.is_cross_group(r) {
                report.raise(Fault::CrossGroup {
                    id: rel.id.clone(),
                    element: Element::Relation,
                });
            }
            if self.config.checks.acknowledgement && self.is_self_acknowledgement(r) {
                if let Some(speaker) = self.speaker(rel.source) {
                    report.raise(Fault::SelfAcknowledgement {
                        relation: rel.id.clone(),
                        source_id: rel.source_id.clone(),
                        target_id: rel.target_id.clone(),
                        speaker: speaker.to_string(),
                    });
                }
            }
        }
    }

    fn check_schemas(&self, report: &mut ValidationReport) {
        for (i, s) in self.target.graph.schemas().iter().enumerate() {
            if self.is_cross_group_schema(SchemaIx(i)) {
                report.raise(Fault::CrossGroup {
                    id: s.id.clone(),
                    element: Element::Schema,
                });
            }
        }
    }

    fn check_spans(&self, report: &mut ValidationReport) {
        for a in self.target.annotations {
            if self.is_out_of_bounds(a.span) {
                report.raise(Fault::SpanOutOfBounds {
                    id: a.id.clone(),
                    span: a.span,
                    text_len: self.chars.len(),
                });
            }
        }
        if !self.config.checks.misalignment {
            return;
        }
        for n in self.target.graph.nodes() {
            if !self.is_out_of_bounds(n.span) && self.is_maybe_misaligned(n.span) {
                report.raise(Fault::MaybeMisaligned {
                    id: n.id.clone(),
                    span: n.span,
                });
            }
        }
    }

    fn check_features(&self, report: &mut ValidationReport) {
        for a in self.target.annotations {
            let rough = if a.kind.and_then(|k| k.segment()).is_some() {
                EDU
            } else {
                a.type_name.as_str()
            };
            let text = self.slice(a.span);
            self.audit((&a.id, Element::Annotation), rough, &a.features, &text, report);
        }
        for r in self.target.graph.relations() {
            self.audit((&r.id, Element::Relation), RELATION, &r.features, "", report);
        }
        for s in self.target.graph.schemas() {
            self.audit((&s.id, Element::Schema), &s.type_name, &s.features, "", report);
        }
    }

    fn audit(
        &self,
        (id, element): (&str, Element),
        rough_type: &str,
        features: &Features,
        text: &str,
        report: &mut ValidationReport,
    ) {
        let missing = self.missing_features(rough_type, features, text);
        if !missing.is_empty() {
            report.raise(Fault::MissingFeatures {
                id: id.to_string(),
                element,
                features: missing,
            });
        }
        let unexpected = self.unexpected_features(rough_type, features);
        if !unexpected.is_empty() {
            report.raise(Fault::UnexpectedFeatures {
                id: id.to_string(),
                element,
                features: unexpected,
            });
        }
        for (k, v) in features {
            if FIXME_RE.is_match(v) {
                report.raise(Fault::FixmeFeature {
                    id: id.to_string(),
                    element,
                    feature: k.clone(),
                });
            }
        }
    }

    fn check_connectivity(&self, turn_prefix: &Regex, report: &mut ValidationReport) {
        let disconnected: BTreeSet<&str> = (0..self.target.graph.nodes().len())
            .filter(|&i| self.is_disconnected(NodeIx(i), turn_prefix))
            .map(|i| self.target.graph.node(NodeIx(i)).id.as_str())
            .collect();
        for id in disconnected {
            report.raise(Fault::Disconnected { id: id.to_string() });
        }
    }

    // --- helpers -------------------------------------------------------------

    fn node_speaker(&self, n: NodeIx) -> Option<&'a str> {
        let annotations: &'a [Annotation] = self.target.annotations;
        let turn = self.target.contexts.get(n.0)?.turn?;
        annotations[turn.0]
            .features
            .get(&self.config.checks.speaker_feature)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    fn slice(&self, span: Span) -> String {
        let end = span.end().min(self.chars.len());
        let start = span.start().min(end);
        self.chars[start..end].iter().collect()
    }
}

// --- tests -------------------------------------------------------------------

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::forest::EnclosureForest;
use crate::report::{Element, Fault, Unresolved, ValidationReport};
use crate::span::Span;
use crate::types::{
    AnnotationIx, Node, NodeIx, Relation, RelationIx, RelationRecord, Schema, SchemaIx,
    SchemaRecord, UnitRef,
};

/// Everything the assembler consumes.
///
/// `foreign` maps the ids of annotations that exist in the document but are
/// not discourse units (turns, dialogues, resources, unknown types…) to
/// their type string, so references to them can be reported precisely.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub schemas: &'a [SchemaRecord],
    pub relations: &'a [RelationRecord],
    pub foreign: &'a HashMap<String, String>,
}

/// The referential structure of one document: nodes, recursively nested
/// schemas and the relations between them.
///
/// All entities live in flat arenas and point at each other through
/// [`UnitRef`] / [`RelationIx`] indices. Schemas are stored in build order,
/// so every schema member has a smaller index than the schema itself.
///
/// The graph is read-only once assembled; edits go through
/// [`edit`](crate::edit) and a full rebuild.
#[derive(Debug, Default, Clone)]
pub struct Hypergraph {
    nodes: Vec<Node>,
    schemas: Vec<Schema>,
    relations: Vec<Relation>,
    units: HashMap<String, UnitRef>,
    relation_ids: HashMap<String, RelationIx>,
    incidence: HashMap<UnitRef, Vec<RelationIx>>,
    memberships: HashMap<UnitRef, Vec<SchemaIx>>,
    container: HashMap<UnitRef, SchemaIx>,
    shallow: Vec<RelationIx>,
}

// Per-record bookkeeping while schemas are being resolved.
struct Slot<'a> {
    record: &'a SchemaRecord,
    member_ids: Vec<String>,
    deps: BTreeSet<usize>,
    rejected: bool,
    built: Option<SchemaIx>,
}

impl Hypergraph {
    /// Assemble nodes, schemas and relations, raising every fault on
    /// `report`. Never fails: faulty elements are left out and reported.
    pub fn assemble(
        nodes: Vec<Node>,
        input: AssemblyInput<'_>,
        report: &mut ValidationReport,
    ) -> Self {
        let mut g = Hypergraph {
            units: nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.id.clone(), UnitRef::Node(NodeIx(i))))
                .collect(),
            nodes,
            ..Self::default()
        };

        let mut taken: HashSet<&str> = g.nodes.iter().map(|n| n.id.as_str()).collect();
        taken.extend(input.foreign.keys().map(String::as_str));

        let schemas: Vec<&SchemaRecord> = input
            .schemas
            .iter()
            .filter(|s| claim(&mut taken, &s.id, Element::Schema, report))
            .collect();
        let relations: Vec<&RelationRecord> = input
            .relations
            .iter()
            .filter(|r| claim(&mut taken, &r.id, Element::Relation, report))
            .collect();
        let relation_ids: HashSet<&str> = relations.iter().map(|r| r.id.as_str()).collect();

        let discarded = g.build_schemas(&schemas, &relation_ids, input.foreign, report);
        g.attach_relations(&relations, &discarded, input.foreign, report);
        g.choose_containers(report);
        g.partition_relations();
        g.check_cohesion(report);

        tracing::debug!(
            nodes = g.nodes.len(),
            schemas = g.schemas.len(),
            relations = g.relations.len(),
            shallow = g.shallow.len(),
            "hypergraph assembled"
        );
        g
    }

    // Topological construction over the member-of DAG. Returns the ids of
    // schema records that did not make it into the arena.
    fn build_schemas(
        &mut self,
        records: &[&SchemaRecord],
        relation_ids: &HashSet<&str>,
        foreign: &HashMap<String, String>,
        report: &mut ValidationReport,
    ) -> HashSet<String> {
        let slot_of: HashMap<&str, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.as_str(), i))
            .collect();

        let mut slots: Vec<Slot<'_>> = Vec::with_capacity(records.len());
        for record in records {
            let member_ids: Vec<String> = record
                .member_ids
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let mut slot = Slot {
                record,
                member_ids,
                deps: BTreeSet::new(),
                rejected: false,
                built: None,
            };
            if slot.member_ids.is_empty() {
                report.raise(Fault::EmptySchema {
                    id: record.id.clone(),
                });
                slot.rejected = true;
            }
            for m in &slot.member_ids {
                if self.units.contains_key(m) {
                    continue;
                }
                if let Some(&j) = slot_of.get(m.as_str()) {
                    slot.deps.insert(j);
                    continue;
                }
                let reason = if relation_ids.contains(m.as_str()) {
                    Unresolved::IsRelation
                } else if let Some(type_name) = foreign.get(m) {
                    Unresolved::NotAUnit {
                        type_name: type_name.clone(),
                    }
                } else {
                    Unresolved::UnknownId
                };
                report.raise(Fault::DanglingReference {
                    id: record.id.clone(),
                    element: Element::Schema,
                    missing: m.clone(),
                    reason,
                });
                slot.rejected = true;
                break;
            }
            slots.push(slot);
        }

        let mut in_degree: Vec<usize> = slots.iter().map(|s| s.deps.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
        for (i, s) in slots.iter().enumerate() {
            for &j in &s.deps {
                dependents[j].push(i);
            }
        }

        let mut queue: BTreeSet<usize> = (0..slots.len()).filter(|&i| in_degree[i] == 0).collect();
        while let Some(i) = queue.pop_first() {
            if !slots[i].rejected {
                let failed_dep = slots[i].deps.iter().copied().find(|&j| slots[j].built.is_none());
                match failed_dep {
                    Some(j) => report.raise(Fault::DanglingReference {
                        id: slots[i].record.id.clone(),
                        element: Element::Schema,
                        missing: slots[j].record.id.clone(),
                        reason: Unresolved::Discarded,
                    }),
                    None => {
                        let members: Vec<UnitRef> = slots[i]
                            .member_ids
                            .iter()
                            .map(|m| match slot_of.get(m.as_str()) {
                                Some(&j) => slots[j].built.map(UnitRef::Schema),
                                None => self.units.get(m).copied(),
                            })
                            .collect::<Option<Vec<_>>>()
                            .unwrap_or_default();
                        let ix = self.push_schema(&slots[i], members);
                        slots[i].built = Some(ix);
                    }
                }
            }
            for &k in &dependents[i] {
                in_degree[k] -= 1;
                if in_degree[k] == 0 {
                    queue.insert(k);
                }
            }
        }

        let mut stuck: Vec<String> = (0..slots.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| slots[i].record.id.clone())
            .collect();
        if !stuck.is_empty() {
            stuck.sort();
            tracing::warn!(schemas = ?stuck, "membership cycle, discarding the schema layer");
            let mut collateral: Vec<String> = slots
                .iter()
                .filter(|s| s.built.is_some())
                .map(|s| s.record.id.clone())
                .collect();
            collateral.sort();
            report.raise(Fault::CyclicSchemaMembership {
                ids: stuck,
                collateral,
            });
            for s in self.schemas.drain(..) {
                self.units.remove(&s.id);
            }
            return records.iter().map(|r| r.id.clone()).collect();
        }

        slots
            .iter()
            .filter(|s| s.built.is_none())
            .map(|s| s.record.id.clone())
            .collect()
    }

    fn push_schema(&mut self, slot: &Slot<'_>, members: Vec<UnitRef>) -> SchemaIx {
        let ix = SchemaIx(self.schemas.len());
        let spans: Vec<Span> = members.iter().map(|m| self.span_ref(*m)).collect();
        let span = Span::merge_all(&spans).unwrap_or(Span::from_range(0, 0));
        self.schemas.push(Schema {
            id: slot.record.id.clone(),
            type_name: slot.record.type_name.clone(),
            member_ids: slot.member_ids.clone(),
            members,
            internal_relations: Vec::new(),
            span,
            features: slot.record.features.clone(),
        });
        self.units.insert(slot.record.id.clone(), UnitRef::Schema(ix));
        ix
    }

    fn attach_relations(
        &mut self,
        records: &[&RelationRecord],
        discarded: &HashSet<String>,
        foreign: &HashMap<String, String>,
        report: &mut ValidationReport,
    ) {
        let pending: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        for record in records {
            let resolve = |id: &String| -> Result<UnitRef, Unresolved> {
                if let Some(u) = self.units.get(id) {
                    Ok(*u)
                } else if discarded.contains(id) {
                    Err(Unresolved::Discarded)
                } else if pending.contains(id.as_str()) {
                    Err(Unresolved::IsRelation)
                } else if let Some(type_name) = foreign.get(id) {
                    Err(Unresolved::NotAUnit {
                        type_name: type_name.clone(),
                    })
                } else {
                    Err(Unresolved::UnknownId)
                }
            };
            let endpoints = resolve(&record.source_id)
                .map_err(|e| (record.source_id.clone(), e))
                .and_then(|s| {
                    resolve(&record.target_id)
                        .map(|t| (s, t))
                        .map_err(|e| (record.target_id.clone(), e))
                });
            let (source, target) = match endpoints {
                Ok(pair) => pair,
                Err((missing, reason)) => {
                    report.raise(Fault::DanglingReference {
                        id: record.id.clone(),
                        element: Element::Relation,
                        missing,
                        reason,
                    });
                    continue;
                }
            };

            let ix = RelationIx(self.relations.len());
            self.relations.push(Relation {
                id: record.id.clone(),
                label: record.label.clone(),
                source_id: record.source_id.clone(),
                target_id: record.target_id.clone(),
                source,
                target,
                features: record.features.clone(),
            });
            self.relation_ids.insert(record.id.clone(), ix);
            self.incidence.entry(source).or_default().push(ix);
            if target != source {
                self.incidence.entry(target).or_default().push(ix);
            }
        }
    }

    fn choose_containers(&mut self, report: &mut ValidationReport) {
        for (i, s) in self.schemas.iter().enumerate() {
            for m in &s.members {
                self.memberships.entry(*m).or_default().push(SchemaIx(i));
            }
        }
        let mut shared: Vec<(UnitRef, SchemaIx)> = Vec::new();
        for (unit, containers) in &self.memberships {
            let chosen = self.tightest(containers);
            if let Some(chosen) = chosen {
                self.container.insert(*unit, chosen);
                if containers.len() > 1 {
                    shared.push((*unit, chosen));
                }
            }
        }
        shared.sort();
        for (unit, chosen) in shared {
            let mut schemas: Vec<String> = self.memberships[&unit]
                .iter()
                .map(|s| self.schemas[s.0].id.clone())
                .collect();
            schemas.sort();
            report.raise(Fault::SharedMembership {
                member: self.unit_id(unit).to_string(),
                chosen: self.schemas[chosen.0].id.clone(),
                schemas,
            });
        }
    }

    // A relation between two direct members of a schema belongs to that
    // schema (the tightest one if several qualify); everything else is shallow.
    fn partition_relations(&mut self) {
        for i in 0..self.relations.len() {
            let r = &self.relations[i];
            let empty = Vec::new();
            let from = self.memberships.get(&r.source).unwrap_or(&empty);
            let to = self.memberships.get(&r.target).unwrap_or(&empty);
            let common: Vec<SchemaIx> = from.iter().filter(|s| to.contains(s)).copied().collect();
            match self.tightest(&common) {
                Some(s) => self.schemas[s.0].internal_relations.push(RelationIx(i)),
                None => self.shallow.push(RelationIx(i)),
            }
        }
    }

    fn check_cohesion(&self, report: &mut ValidationReport) {
        for s in &self.schemas {
            let members: HashSet<UnitRef> = s.members.iter().copied().collect();
            let islands: Vec<String> = s
                .members
                .iter()
                .filter(|m| {
                    !self.incident(**m).iter().any(|r| {
                        self.relations[r.0]
                            .other_end(**m)
                            .is_some_and(|o| members.contains(&o))
                    })
                })
                .map(|m| self.unit_id(*m).to_string())
                .collect();
            if !islands.is_empty() {
                report.raise(Fault::CohesionViolation {
                    schema: s.id.clone(),
                    islands,
                });
            }
        }
    }

    fn tightest(&self, schemas: &[SchemaIx]) -> Option<SchemaIx> {
        schemas
            .iter()
            .copied()
            .min_by(|a, b| {
                let (sa, sb) = (&self.schemas[a.0], &self.schemas[b.0]);
                sa.span.len().cmp(&sb.span.len()).then_with(|| sa.id.cmp(&sb.id))
            })
    }

    // --- queries -------------------------------------------------------------

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn node(&self, ix: NodeIx) -> &Node {
        &self.nodes[ix.0]
    }

    pub fn schema(&self, ix: SchemaIx) -> &Schema {
        &self.schemas[ix.0]
    }

    pub fn relation(&self, ix: RelationIx) -> &Relation {
        &self.relations[ix.0]
    }

    /// Look up a node or schema by id.
    pub fn resolve(&self, id: &str) -> Option<UnitRef> {
        self.units.get(id).copied()
    }

    pub fn relation_by_id(&self, id: &str) -> Option<RelationIx> {
        self.relation_ids.get(id).copied()
    }

    pub fn unit_id(&self, unit: UnitRef) -> &str {
        match unit {
            UnitRef::Node(n) => &self.nodes[n.0].id,
            UnitRef::Schema(s) => &self.schemas[s.0].id,
        }
    }

    /// The span of a node, or the minimal enclosing span of a schema.
    pub fn span_ref(&self, unit: UnitRef) -> Span {
        match unit {
            UnitRef::Node(n) => self.nodes[n.0].span,
            UnitRef::Schema(s) => self.schemas[s.0].span,
        }
    }

    /// Every relation having `unit` as an endpoint.
    pub fn incident(&self, unit: UnitRef) -> &[RelationIx] {
        self.incidence.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Relations pointing at `unit`.
    pub fn incoming(&self, unit: UnitRef) -> Vec<RelationIx> {
        self.incident(unit)
            .iter()
            .copied()
            .filter(|r| self.relations[r.0].target == unit)
            .collect()
    }

    /// Relations leaving `unit`.
    pub fn outgoing(&self, unit: UnitRef) -> Vec<RelationIx> {
        self.incident(unit)
            .iter()
            .copied()
            .filter(|r| self.relations[r.0].source == unit)
            .collect()
    }

    /// Schemas listing `unit` as a direct member.
    pub fn direct_containers(&self, unit: UnitRef) -> &[SchemaIx] {
        self.memberships.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The schema directly containing `unit`, if any.
    pub fn containing_schema(&self, unit: UnitRef) -> Option<SchemaIx> {
        self.container.get(&unit).copied()
    }

    /// Enclosing schemas of `unit`, outermost first, excluding `unit` itself.
    pub fn containing_schema_chain(&self, unit: UnitRef) -> Vec<SchemaIx> {
        let mut chain = Vec::new();
        let mut cur = unit;
        // containers always have a larger index than their members, so
        // this walk terminates
        while let Some(s) = self.containing_schema(cur) {
            chain.push(s);
            cur = UnitRef::Schema(s);
        }
        chain.reverse();
        chain
    }

    /// All nodes nested anywhere inside `schema`, sorted.
    pub fn terminals(&self, schema: SchemaIx) -> Vec<NodeIx> {
        let mut seen: HashSet<SchemaIx> = HashSet::new();
        let mut out: BTreeSet<NodeIx> = BTreeSet::new();
        let mut stack = vec![schema];
        while let Some(s) = stack.pop() {
            if !seen.insert(s) {
                continue;
            }
            for m in &self.schemas[s.0].members {
                match m {
                    UnitRef::Node(n) => {
                        out.insert(*n);
                    }
                    UnitRef::Schema(inner) => stack.push(*inner),
                }
            }
        }
        out.into_iter().collect()
    }

    /// Top-level relations, i.e. those not internal to any schema.
    pub fn shallow_relations(&self) -> &[RelationIx] {
        &self.shallow
    }

    /// Relations registered inside some schema.
    pub fn nested_relations(&self) -> Vec<RelationIx> {
        let mut out: Vec<RelationIx> = self
            .schemas
            .iter()
            .flat_map(|s| s.internal_relations.iter().copied())
            .collect();
        out.sort();
        out
    }

    /// Assign every unit to a top-level group.
    ///
    /// Nodes are keyed by `group_of`; a schema belongs to a group only when
    /// all of its members do.
    pub fn group_units(&self, group_of: impl Fn(&Node) -> Option<AnnotationIx>) -> Grouping {
        let nodes: Vec<Option<AnnotationIx>> = self.nodes.iter().map(group_of).collect();
        let mut schemas: Vec<Option<AnnotationIx>> = Vec::with_capacity(self.schemas.len());
        for s in &self.schemas {
            let group = common(s.members.iter().map(|m| match m {
                UnitRef::Node(n) => nodes[n.0],
                // built in order, so inner schemas are already grouped
                UnitRef::Schema(inner) => schemas[inner.0],
            }));
            schemas.push(group);
        }
        Grouping { nodes, schemas }
    }

    /// One [`DiscourseStructure`] per group annotation, in the given order.
    pub fn partition(
        &self,
        forest: &EnclosureForest,
        groups: &[AnnotationIx],
        grouping: &Grouping,
    ) -> Vec<DiscourseStructure> {
        groups
            .iter()
            .map(|&g| {
                let units: Vec<UnitRef> = (0..self.nodes.len())
                    .map(|i| UnitRef::Node(NodeIx(i)))
                    .chain((0..self.schemas.len()).map(|i| UnitRef::Schema(SchemaIx(i))))
                    .filter(|u| grouping.of(*u) == Some(g))
                    .collect();
                let relations: Vec<RelationIx> = self
                    .shallow
                    .iter()
                    .copied()
                    .filter(|r| grouping.of_relation(self, *r) == Some(g))
                    .collect();
                DiscourseStructure {
                    group: g,
                    id: forest.id(g).to_string(),
                    span: forest.span(g),
                    units,
                    relations,
                }
            })
            .collect()
    }
}

// Reserve an id, reporting a duplicate if it was already in use.
fn claim<'a>(
    taken: &mut HashSet<&'a str>,
    id: &'a str,
    element: Element,
    report: &mut ValidationReport,
) -> bool {
    if taken.insert(id) {
        true
    } else {
        report.raise(Fault::DuplicateId {
            id: id.to_string(),
            element,
        });
        false
    }
}

// The shared value if every item is `Some` and equal.
fn common(mut items: impl Iterator<Item = Option<AnnotationIx>>) -> Option<AnnotationIx> {
    let first = items.next()??;
    items.all(|g| g == Some(first)).then_some(first)
}

/// Top-level group membership of every unit.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    nodes: Vec<Option<AnnotationIx>>,
    schemas: Vec<Option<AnnotationIx>>,
}

impl Grouping {
    pub fn of(&self, unit: UnitRef) -> Option<AnnotationIx> {
        match unit {
            UnitRef::Node(n) => self.nodes.get(n.0).copied().flatten(),
            UnitRef::Schema(s) => self.schemas.get(s.0).copied().flatten(),
        }
    }

    /// The group both endpoints share, if any.
    pub fn of_relation(&self, graph: &Hypergraph, r: RelationIx) -> Option<AnnotationIx> {
        let rel = graph.relation(r);
        common([self.of(rel.source), self.of(rel.target)].into_iter())
    }
}

/// The discourse structure of one top-level group (one dialogue): its units
/// and the shallow relations between them.
#[derive(Debug, Clone)]
pub struct DiscourseStructure {
    pub group: AnnotationIx,
    pub id: String,
    pub span: Span,
    pub units: Vec<UnitRef>,
    pub relations: Vec<RelationIx>,
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IssueCode;
    use crate::types::{AnnotationIx, Features, SegmentKind};

    fn node(i: usize, id: &str, start: usize, end: usize) -> Node {
        Node {
            id: id.into(),
            kind: SegmentKind::Plain,
            annotation: AnnotationIx(i),
            span: Span::from_range(start, end),
            features: Features::new(),
        }
    }

    fn nodes() -> Vec<Node> {
        vec![
            node(0, "n1", 0, 5),
            node(1, "n2", 6, 10),
            node(2, "n3", 11, 15),
            node(3, "n4", 16, 20),
        ]
    }

    fn rel(id: &str, s: &str, t: &str) -> RelationRecord {
        RelationRecord {
            id: id.into(),
            label: "Elaboration".into(),
            source_id: s.into(),
            target_id: t.into(),
            features: Features::new(),
        }
    }

    fn cdu(id: &str, members: &[&str]) -> SchemaRecord {
        SchemaRecord {
            id: id.into(),
            type_name: "Complex_discourse_unit".into(),
            member_ids: members.iter().map(|m| m.to_string()).collect(),
            features: Features::new(),
        }
    }

    fn assemble(
        schemas: &[SchemaRecord],
        relations: &[RelationRecord],
    ) -> (Hypergraph, ValidationReport) {
        let foreign: HashMap<String, String> = [("t1".to_string(), "Turn".to_string())].into();
        let mut report = ValidationReport::new();
        let g = Hypergraph::assemble(
            nodes(),
            AssemblyInput {
                schemas,
                relations,
                foreign: &foreign,
            },
            &mut report,
        );
        (g, report)
    }

    fn ids(g: &Hypergraph, chain: &[SchemaIx]) -> Vec<String> {
        chain.iter().map(|s| g.schema(*s).id.clone()).collect()
    }

    #[test]
    fn forward_references_resolve() {
        // outer is listed before the schema it contains
        let schemas = [cdu("outer", &["inner", "n3"]), cdu("inner", &["n1", "n2"])];
        let relations = [rel("r1", "n1", "n2"), rel("r2", "inner", "n3")];
        let (g, report) = assemble(&schemas, &relations);

        assert!(!report.has_errors(), "{:?}", report.errors);
        assert_eq!(g.schemas().len(), 2);
        assert_eq!(g.schemas()[0].id, "inner");
        let outer = g.resolve("outer").unwrap();
        assert_eq!(g.span_ref(outer), Span::from_range(0, 15));
        let n1 = g.resolve("n1").unwrap();
        assert_eq!(ids(&g, &g.containing_schema_chain(n1)), vec!["outer", "inner"]);
    }

    #[test]
    fn internal_relations_are_not_shallow() {
        let schemas = [cdu("c1", &["n1", "n2"])];
        let relations = [rel("r1", "n1", "n2"), rel("r2", "c1", "n3")];
        let (g, _) = assemble(&schemas, &relations);

        let r1 = g.relation_by_id("r1").unwrap();
        let r2 = g.relation_by_id("r2").unwrap();
        assert_eq!(g.shallow_relations(), &[r2]);
        assert_eq!(g.nested_relations(), vec![r1]);
        assert_eq!(g.schema(SchemaIx(0)).internal_relations, vec![r1]);
    }

    #[test]
    fn island_member_breaks_cohesion() {
        let schemas = [cdu("c1", &["n1", "n2"])];
        let (_, report) = assemble(&schemas, &[]);
        let issues = report.with_code(IssueCode::CohesionViolation);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].offending_ids, vec!["c1", "n1", "n2"]);
    }

    #[test]
    fn relation_leaving_the_schema_does_not_count_for_cohesion() {
        let schemas = [cdu("c1", &["n1", "n2"])];
        let relations = [rel("r1", "n1", "n2"), rel("r2", "n2", "n3")];
        let (_, report) = assemble(&schemas, &relations);
        assert!(report.with_code(IssueCode::CohesionViolation).is_empty());

        let relations = [rel("r1", "n1", "n3"), rel("r2", "n2", "n3")];
        let (_, report) = assemble(&schemas, &relations);
        let issues = report.with_code(IssueCode::CohesionViolation);
        assert_eq!(issues[0].offending_ids, vec!["c1", "n1", "n2"]);
    }

    #[test]
    fn cycle_discards_the_schema_layer_only() {
        let schemas = [
            cdu("a", &["b", "n1"]),
            cdu("b", &["a", "n2"]),
            cdu("ok", &["n3", "n4"]),
        ];
        let relations = [rel("r1", "n1", "n2"), rel("r2", "ok", "n1")];
        let (g, report) = assemble(&schemas, &relations);

        assert!(g.schemas().is_empty());
        assert_eq!(g.nodes().len(), 4);
        let cyc = report.with_code(IssueCode::CyclicSchemaMembership);
        assert_eq!(cyc.len(), 1);
        // the acyclic schema is named too
        assert_eq!(cyc[0].offending_ids, vec!["a", "b", "ok"]);
        assert!(cyc[0].message.contains("also dropped: [ok]"));
        // r1 survives, r2 pointed at a discarded schema
        assert!(g.relation_by_id("r1").is_some());
        assert!(g.relation_by_id("r2").is_none());
        let dangling = report.with_code(IssueCode::DanglingReference);
        assert_eq!(dangling.len(), 1);
        assert!(dangling[0].message.contains("discarded"));
    }

    #[test]
    fn self_membership_is_a_cycle() {
        let (g, report) = assemble(&[cdu("a", &["a", "n1"])], &[]);
        assert!(g.schemas().is_empty());
        assert_eq!(report.with_code(IssueCode::CyclicSchemaMembership).len(), 1);
    }

    #[test]
    fn dangling_members_cascade() {
        let schemas = [
            cdu("bad", &["n1", "ghost"]),
            cdu("wraps_bad", &["bad", "n3"]),
            cdu("turny", &["t1", "n2"]),
            cdu("fine", &["n3", "n4"]),
        ];
        let relations = [rel("r1", "n1", "wraps_bad"), rel("r2", "n3", "n4")];
        let (g, report) = assemble(&schemas, &relations);

        assert_eq!(g.schemas().len(), 1);
        assert_eq!(g.schemas()[0].id, "fine");
        let dangling = report.with_code(IssueCode::DanglingReference);
        let who: Vec<&str> = dangling.iter().map(|i| i.offending_ids[0].as_str()).collect();
        assert_eq!(who, vec!["bad", "turny", "wraps_bad", "r1"]);
        assert!(dangling[1].message.contains("\"Turn\" annotation"));
    }

    #[test]
    fn relations_cannot_be_members_or_endpoints_of_unknowns() {
        let schemas = [cdu("c", &["r1", "n1"])];
        let relations = [rel("r1", "n1", "n2"), rel("r2", "n1", "nowhere")];
        let (g, report) = assemble(&schemas, &relations);
        assert!(g.schemas().is_empty());
        let dangling = report.with_code(IssueCode::DanglingReference);
        assert!(dangling[0].message.contains("it is a relation"));
        assert_eq!(dangling[1].offending_ids, vec!["r2", "nowhere"]);
    }

    #[test]
    fn relation_pointing_at_a_later_relation() {
        let relations = [
            rel("r1", "n1", "r3"),
            rel("r2", "n1", "n2"),
            rel("r3", "n2", "n3"),
        ];
        let (g, report) = assemble(&[], &relations);
        assert!(g.relation_by_id("r1").is_none());
        assert_eq!(g.relations().len(), 2);
        let dangling = report.with_code(IssueCode::DanglingReference);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].offending_ids, vec!["r1", "r3"]);
        assert!(dangling[0].message.contains("it is a relation"));
    }

    #[test]
    fn empty_and_duplicate_schemas() {
        let schemas = [cdu("c", &[]), cdu("n1", &["n2", "n3"]), cdu("d", &["n2", "n2"])];
        let (g, report) = assemble(&schemas, &[]);
        assert_eq!(report.with_code(IssueCode::EmptySchema).len(), 1);
        assert_eq!(report.with_code(IssueCode::DuplicateId).len(), 1);
        assert_eq!(g.schemas().len(), 1);
        assert_eq!(g.schemas()[0].member_ids, vec!["n2"]);
    }

    #[test]
    fn shared_member_uses_tightest_container() {
        let schemas = [cdu("wide", &["n1", "n4"]), cdu("narrow", &["n1", "n2"])];
        let relations = [rel("r1", "n1", "n2"), rel("r2", "n1", "n4")];
        let (g, report) = assemble(&schemas, &relations);
        let n1 = g.resolve("n1").unwrap();
        assert_eq!(g.direct_containers(n1).len(), 2);
        assert_eq!(ids(&g, &g.containing_schema_chain(n1)), vec!["narrow"]);
        let shared = report.with_code(IssueCode::SharedMembership);
        assert_eq!(shared[0].offending_ids, vec!["n1", "narrow", "wide"]);
    }

    #[test]
    fn terminals_flatten_nesting() {
        let schemas = [
            cdu("c1", &["n1", "n2"]),
            cdu("c2", &["c1", "n3"]),
            cdu("c3", &["c2", "n4"]),
        ];
        let (g, _) = assemble(&schemas, &[]);
        let c3 = g.resolve("c3").unwrap();
        let UnitRef::Schema(c3) = c3 else {
            panic!("c3 should be a schema");
        };
        let terminal_ids: Vec<&str> = g
            .terminals(c3)
            .into_iter()
            .map(|n| g.node(n).id.as_str())
            .collect();
        assert_eq!(terminal_ids, vec!["n1", "n2", "n3", "n4"]);
    }

    #[test]
    fn incoming_and_outgoing() {
        let relations = [rel("r1", "n1", "n2"), rel("r2", "n3", "n2"), rel("r3", "n2", "n4")];
        let (g, _) = assemble(&[], &relations);
        let n2 = g.resolve("n2").unwrap();
        assert_eq!(g.incoming(n2).len(), 2);
        assert_eq!(g.outgoing(n2).len(), 1);
        assert_eq!(g.incident(n2).len(), 3);
    }

    #[test]
    fn grouping_follows_terminals() {
        let schemas = [cdu("same", &["n1", "n2"]), cdu("mixed", &["n2", "n3"])];
        let (g, _) = assemble(&schemas, &[]);
        let grouping = g.group_units(|n| match n.id.as_str() {
            "n1" | "n2" => Some(AnnotationIx(10)),
            "n3" => Some(AnnotationIx(11)),
            _ => None,
        });
        assert_eq!(grouping.of(g.resolve("same").unwrap()), Some(AnnotationIx(10)));
        assert_eq!(grouping.of(g.resolve("mixed").unwrap()), None);
        assert_eq!(grouping.of(g.resolve("n4").unwrap()), None);
    }
}

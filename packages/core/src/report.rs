//! Structured findings and the per-document validation report.
//!
//! Every problem the engine detects is first raised as a [`Fault`], a
//! typed error carrying the ids involved. Faults are then flattened into
//! [`Issue`]s, the serialisable shape handed to external consumers, and
//! collected in a [`ValidationReport`] that keeps errors and warnings apart.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::span::{Span, SpanError};

/// How bad a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Stable machine-readable name of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IssueCode {
    MalformedSpan,
    DegenerateSpan,
    DuplicateId,
    DanglingReference,
    CyclicSchemaMembership,
    EmptySchema,
    AmbiguousEnclosure,
    SharedMembership,
    CohesionViolation,
    Puncture,
    CrossGroup,
    MaybeMisaligned,
    SpanOutOfBounds,
    MissingFeatures,
    UnexpectedFeatures,
    FixmeFeature,
    Disconnected,
    SelfAcknowledgement,
}

impl IssueCode {
    pub const ALL: [IssueCode; 18] = [
        IssueCode::MalformedSpan,
        IssueCode::DegenerateSpan,
        IssueCode::DuplicateId,
        IssueCode::DanglingReference,
        IssueCode::CyclicSchemaMembership,
        IssueCode::EmptySchema,
        IssueCode::AmbiguousEnclosure,
        IssueCode::SharedMembership,
        IssueCode::CohesionViolation,
        IssueCode::Puncture,
        IssueCode::CrossGroup,
        IssueCode::MaybeMisaligned,
        IssueCode::SpanOutOfBounds,
        IssueCode::MissingFeatures,
        IssueCode::UnexpectedFeatures,
        IssueCode::FixmeFeature,
        IssueCode::Disconnected,
        IssueCode::SelfAcknowledgement,
    ];
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::str::FromStr for IssueCode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueCode::ALL
            .into_iter()
            .find(|c| c.to_string() == s)
            .ok_or_else(|| format!("unknown issue code {:?}; expected e.g. Puncture, CrossGroup", s))
    }
}

/// Which kind of element a fault is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Annotation,
    Relation,
    Schema,
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Annotation => write!(f, "annotation"),
            Element::Relation => write!(f, "relation"),
            Element::Schema => write!(f, "schema"),
        }
    }
}

/// Why a reference failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// No element in the document has this id.
    UnknownId,
    /// The id names an annotation whose type is not a discourse unit.
    NotAUnit { type_name: String },
    /// The id names a relation; relations cannot be schema members.
    IsRelation,
    /// The id named a schema that was itself discarded.
    Discarded,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::UnknownId => write!(f, "no such id"),
            Unresolved::NotAUnit { type_name } => {
                write!(f, "it is a {type_name:?} annotation, not a discourse unit")
            }
            Unresolved::IsRelation => write!(f, "it is a relation"),
            Unresolved::Discarded => write!(f, "it was discarded"),
        }
    }
}

/// A structural finding, before it is flattened into an [`Issue`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Fault {
    #[error("annotation {id:?} dropped: {source}")]
    MalformedSpan {
        id: String,
        #[source]
        source: SpanError,
    },

    #[error("annotation {id:?} has zero-length span {span}")]
    DegenerateSpan { id: String, span: Span },

    #[error("{element} {id:?} dropped: id already in use")]
    DuplicateId { id: String, element: Element },

    #[error("{element} {id:?} dropped: reference to {missing:?} does not resolve ({reason})")]
    DanglingReference {
        id: String,
        element: Element,
        missing: String,
        reason: Unresolved,
    },

    /// `ids` are the schemas on the cycle; `collateral` the acyclic ones
    /// dropped along with them.
    #[error(
        "schema layer discarded: membership cycle through {}; also dropped: [{}]",
        .ids.join(", "),
        .collateral.join(", ")
    )]
    CyclicSchemaMembership {
        ids: Vec<String>,
        collateral: Vec<String>,
    },

    #[error("schema {id:?} dropped: it has no members")]
    EmptySchema { id: String },

    #[error(
        "annotation {id:?} has {} equally tight enclosing candidates ({}); picked {chosen:?}",
        .tied.len(),
        .tied.join(", ")
    )]
    AmbiguousEnclosure {
        id: String,
        chosen: String,
        tied: Vec<String>,
    },

    #[error(
        "unit {member:?} is a direct member of several schemas ({}); using {chosen:?}",
        .schemas.join(", ")
    )]
    SharedMembership {
        member: String,
        chosen: String,
        schemas: Vec<String>,
    },

    #[error("schema {schema:?} has islands: {} not linked to another member", .islands.join(", "))]
    CohesionViolation { schema: String, islands: Vec<String> },

    #[error("relation {relation:?} ({source_id} -> {target_id}) punctures a schema boundary")]
    Puncture {
        relation: String,
        source_id: String,
        target_id: String,
    },

    #[error("{element} {id:?} crosses group boundaries")]
    CrossGroup { id: String, element: Element },

    #[error("annotation {id:?} at {span} may be off by one: non-whitespace just outside its boundary")]
    MaybeMisaligned { id: String, span: Span },

    #[error("annotation {id:?} at {span} extends past the end of the text ({text_len} chars)")]
    SpanOutOfBounds {
        id: String,
        span: Span,
        text_len: usize,
    },

    #[error("{element} {id:?} is missing features: {}", .features.join(", "))]
    MissingFeatures {
        id: String,
        element: Element,
        features: Vec<String>,
    },

    #[error("{element} {id:?} has unexpected features: {}", .features.join(", "))]
    UnexpectedFeatures {
        id: String,
        element: Element,
        features: Vec<String>,
    },

    #[error("{element} {id:?} has a FIXME in feature {feature:?}")]
    FixmeFeature {
        id: String,
        element: Element,
        feature: String,
    },

    #[error("unit {id:?} is disconnected: no incoming relation and not at the start of its dialogue")]
    Disconnected { id: String },

    #[error("relation {relation:?} acknowledges {speaker:?}'s own unit ({source_id} -> {target_id})")]
    SelfAcknowledgement {
        relation: String,
        source_id: String,
        target_id: String,
        speaker: String,
    },
}

impl Fault {
    pub fn code(&self) -> IssueCode {
        match self {
            Fault::MalformedSpan { .. } => IssueCode::MalformedSpan,
            Fault::DegenerateSpan { .. } => IssueCode::DegenerateSpan,
            Fault::DuplicateId { .. } => IssueCode::DuplicateId,
            Fault::DanglingReference { .. } => IssueCode::DanglingReference,
            Fault::CyclicSchemaMembership { .. } => IssueCode::CyclicSchemaMembership,
            Fault::EmptySchema { .. } => IssueCode::EmptySchema,
            Fault::AmbiguousEnclosure { .. } => IssueCode::AmbiguousEnclosure,
            Fault::SharedMembership { .. } => IssueCode::SharedMembership,
            Fault::CohesionViolation { .. } => IssueCode::CohesionViolation,
            Fault::Puncture { .. } => IssueCode::Puncture,
            Fault::CrossGroup { .. } => IssueCode::CrossGroup,
            Fault::MaybeMisaligned { .. } => IssueCode::MaybeMisaligned,
            Fault::SpanOutOfBounds { .. } => IssueCode::SpanOutOfBounds,
            Fault::MissingFeatures { .. } => IssueCode::MissingFeatures,
            Fault::UnexpectedFeatures { .. } => IssueCode::UnexpectedFeatures,
            Fault::FixmeFeature { .. } => IssueCode::FixmeFeature,
            Fault::Disconnected { .. } => IssueCode::Disconnected,
            Fault::SelfAcknowledgement { .. } => IssueCode::SelfAcknowledgement,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.code() {
            IssueCode::MalformedSpan
            | IssueCode::DuplicateId
            | IssueCode::DanglingReference
            | IssueCode::CyclicSchemaMembership
            | IssueCode::EmptySchema
            | IssueCode::Puncture
            | IssueCode::CrossGroup => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Ids of every element the finding is about, primary element first.
    pub fn offending_ids(&self) -> Vec<String> {
        match self {
            Fault::MalformedSpan { id, .. }
            | Fault::DegenerateSpan { id, .. }
            | Fault::DuplicateId { id, .. }
            | Fault::EmptySchema { id }
            | Fault::CrossGroup { id, .. }
            | Fault::MaybeMisaligned { id, .. }
            | Fault::SpanOutOfBounds { id, .. }
            | Fault::MissingFeatures { id, .. }
            | Fault::UnexpectedFeatures { id, .. }
            | Fault::FixmeFeature { id, .. }
            | Fault::Disconnected { id } => vec![id.clone()],
            Fault::DanglingReference { id, missing, .. } => vec![id.clone(), missing.clone()],
            Fault::CyclicSchemaMembership { ids, collateral } => {
                ids.iter().chain(collateral.iter()).cloned().collect()
            }
            Fault::AmbiguousEnclosure { id, tied, .. } => {
                std::iter::once(id.clone()).chain(tied.iter().cloned()).collect()
            }
            Fault::SharedMembership {
                member, schemas, ..
            } => std::iter::once(member.clone())
                .chain(schemas.iter().cloned())
                .collect(),
            Fault::CohesionViolation { schema, islands } => std::iter::once(schema.clone())
                .chain(islands.iter().cloned())
                .collect(),
            Fault::Puncture {
                relation,
                source_id,
                target_id,
            }
            | Fault::SelfAcknowledgement {
                relation,
                source_id,
                target_id,
                ..
            } => vec![relation.clone(), source_id.clone(), target_id.clone()],
        }
    }
}

/// A finding as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub offending_ids: Vec<String>,
}

impl From<Fault> for Issue {
    fn from(fault: Fault) -> Self {
        Issue {
            severity: fault.severity(),
            code: fault.code(),
            message: fault.to_string(),
            offending_ids: fault.offending_ids(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.code, self.severity, self.message)
    }
}

/// Errors and warnings collected while building one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault under its own severity.
    pub fn raise(&mut self, fault: Fault) {
        self.push(Issue::from(fault));
    }

    pub fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Errors first, then warnings.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.errors.iter().chain(self.warnings.iter())
    }

    /// All issues carrying `code`.
    pub fn with_code(&self, code: IssueCode) -> Vec<&Issue> {
        self.issues().filter(|i| i.code == code).collect()
    }

    /// Drop issues the caller has decided not to care about, e.g.
    /// [`IssueCode::DegenerateSpan`].
    pub fn without(mut self, code: IssueCode) -> Self {
        self.errors.retain(|i| i.code != code);
        self.warnings.retain(|i| i.code != code);
        self
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_route_to_their_list() {
        let mut report = ValidationReport::new();
        report.raise(Fault::CohesionViolation {
            schema: "c1".into(),
            islands: vec!["e2".into()],
        });
        assert!(!report.has_errors());
        assert_eq!(report.warnings.len(), 1);

        report.raise(Fault::Puncture {
            relation: "r2".into(),
            source_id: "e2".into(),
            target_id: "e3".into(),
        });
        assert!(report.has_errors());
        assert_eq!(report.issues().next().map(|i| i.code), Some(IssueCode::Puncture));
    }

    #[test]
    fn issue_carries_ids_and_message() {
        let issue = Issue::from(Fault::DanglingReference {
            id: "r9".into(),
            element: Element::Relation,
            missing: "e42".into(),
            reason: Unresolved::UnknownId,
        });
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.offending_ids, vec!["r9", "e42"]);
        assert!(issue.message.contains("relation \"r9\""));
        assert!(issue.message.contains("no such id"));
    }

    #[test]
    fn ambiguity_names_every_candidate() {
        let fault = Fault::AmbiguousEnclosure {
            id: "t".into(),
            chosen: "a".into(),
            tied: vec!["a".into(), "b".into()],
        };
        assert_eq!(fault.severity(), Severity::Warning);
        assert_eq!(fault.offending_ids(), vec!["t", "a", "b"]);
        assert!(fault.to_string().contains("picked \"a\""));
    }

    #[test]
    fn codes_parse_from_their_names() {
        for code in IssueCode::ALL {
            assert_eq!(code.to_string().parse::<IssueCode>(), Ok(code));
        }
        assert!("puncture".parse::<IssueCode>().is_err());
    }

    #[test]
    fn filter_out_a_code() {
        let mut report = ValidationReport::new();
        report.raise(Fault::DegenerateSpan {
            id: "e1".into(),
            span: Span::from_range(3, 3),
        });
        assert!(!report.is_clean());
        assert!(report.without(IssueCode::DegenerateSpan).is_clean());
    }
}

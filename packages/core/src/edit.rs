//! Edits on a [`DocumentRecord`].
//!
//! Built documents are read-only; an edit changes the record and the caller
//! rebuilds (see [`Document::rebuild`](crate::Document::rebuild)). New ids
//! come from a caller-supplied [`IdGenerator`].

use std::collections::HashSet;

use thiserror::Error;

use crate::ids::IdGenerator;
use crate::span::{Span, SpanError};
use crate::types::{DocumentRecord, Features, RelationRecord, SchemaRecord};

/// Errors returned by the edit operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("no element with id {0:?}")]
    UnknownId(String),

    #[error("generated id {0:?} is already in use")]
    IdCollision(String),

    #[error("invalid span for {id:?}: {source}")]
    MalformedSpan {
        id: String,
        #[source]
        source: SpanError,
    },

    #[error("a schema needs at least one member")]
    NoMembers,
}

/// Move the annotation `id` to a new span.
pub fn move_span(record: &mut DocumentRecord, id: &str, span: (i64, i64)) -> Result<(), EditError> {
    Span::new(span.0, span.1).map_err(|source| EditError::MalformedSpan {
        id: id.to_string(),
        source,
    })?;
    let annotation = record
        .annotations
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| EditError::UnknownId(id.to_string()))?;
    annotation.span = span;
    Ok(())
}

/// Add a relation between two existing elements. Returns the new id.
pub fn add_relation(
    record: &mut DocumentRecord,
    ids: &mut dyn IdGenerator,
    label: &str,
    source_id: &str,
    target_id: &str,
) -> Result<String, EditError> {
    let known = known_ids(record);
    for endpoint in [source_id, target_id] {
        if !known.contains(endpoint) {
            return Err(EditError::UnknownId(endpoint.to_string()));
        }
    }
    let id = fresh_id(&known, ids)?;
    record.relations.push(RelationRecord {
        id: id.clone(),
        label: label.to_string(),
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        features: Features::new(),
    });
    Ok(id)
}

/// Group existing elements into a new schema. Returns the new id.
pub fn add_schema(
    record: &mut DocumentRecord,
    ids: &mut dyn IdGenerator,
    type_name: &str,
    member_ids: &[&str],
) -> Result<String, EditError> {
    if member_ids.is_empty() {
        return Err(EditError::NoMembers);
    }
    let known = known_ids(record);
    if let Some(m) = member_ids.iter().find(|m| !known.contains(**m)) {
        return Err(EditError::UnknownId(m.to_string()));
    }
    let id = fresh_id(&known, ids)?;
    record.schemas.push(SchemaRecord {
        id: id.clone(),
        type_name: type_name.to_string(),
        member_ids: member_ids.iter().map(|m| m.to_string()).collect(),
        features: Features::new(),
    });
    Ok(id)
}

/// Remove an element and everything that depended on it.
///
/// Relations touching a removed element are removed, removed ids disappear
/// from member lists, and schemas left without members are removed in turn.
/// Returns every removed id, starting with `id`.
pub fn remove(record: &mut DocumentRecord, id: &str) -> Result<Vec<String>, EditError> {
    if !known_ids(record).contains(id) {
        return Err(EditError::UnknownId(id.to_string()));
    }
    let mut removed = vec![id.to_string()];
    let mut pending = vec![id.to_string()];
    while let Some(gone) = pending.pop() {
        record.annotations.retain(|a| a.id != gone);
        record.relations.retain(|r| {
            let keep = r.id != gone && r.source_id != gone && r.target_id != gone;
            if !keep && r.id != gone {
                pending.push(r.id.clone());
                removed.push(r.id.clone());
            }
            keep
        });
        record.schemas.retain(|s| s.id != gone);
        for s in &mut record.schemas {
            s.member_ids.retain(|m| *m != gone);
        }
        record.schemas.retain(|s| {
            if s.member_ids.is_empty() {
                pending.push(s.id.clone());
                removed.push(s.id.clone());
                false
            } else {
                true
            }
        });
    }
    tracing::debug!(removed = ?removed, "elements removed");
    Ok(removed)
}

// --- helpers -----------------------------------------------------------------

fn known_ids(record: &DocumentRecord) -> HashSet<&str> {
    record
        .annotations
        .iter()
        .map(|a| a.id.as_str())
        .chain(record.relations.iter().map(|r| r.id.as_str()))
        .chain(record.schemas.iter().map(|s| s.id.as_str()))
        .collect()
}

fn fresh_id(known: &HashSet<&str>, ids: &mut dyn IdGenerator) -> Result<String, EditError> {
    let id = ids.next_id();
    if known.contains(id.as_str()) {
        return Err(EditError::IdCollision(id));
    }
    Ok(id)
}

// --- tests -------------------------------------------------------------------

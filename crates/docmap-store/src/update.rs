//! Update and replacement evaluation.
//!
//! Update documents consist solely of operators: `$set`, `$unset`, `$inc`,
//! and `$setOnInsert` (applied only when an upsert inserts). Field paths may
//! be dotted; `$set` creates intermediate documents as needed. `_id` can
//! never change.

use bson::{Bson, Document};

use crate::error::{StoreError, StoreResult};
use crate::filter;

const ID: &str = "_id";

/// Reject anything that is not a well-formed operator update.
pub fn validate_update(update: &Document) -> StoreResult<()> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdate("update document is empty".into()));
    }
    for (op, fields) in update {
        if !matches!(op.as_str(), "$set" | "$unset" | "$inc" | "$setOnInsert") {
            return Err(StoreError::InvalidUpdate(if op.starts_with('$') {
                format!("unknown update operator {op}")
            } else {
                format!("update documents may only contain operators, found {op}")
            }));
        }
        let Bson::Document(fields) = fields else {
            return Err(StoreError::InvalidUpdate(format!("{op} expects a document")));
        };
        for (path, value) in fields {
            if path.is_empty() || path.split('.').any(str::is_empty) {
                return Err(StoreError::InvalidUpdate(format!("invalid field path {path:?}")));
            }
            if op == "$inc" && !is_number(value) {
                return Err(StoreError::InvalidUpdate(format!(
                    "$inc on {path} needs a numeric amount"
                )));
            }
        }
    }
    Ok(())
}

/// Reject replacements that carry operators.
pub fn validate_replacement(replacement: &Document) -> StoreResult<()> {
    match replacement.keys().find(|k| k.starts_with('$')) {
        Some(op) => Err(StoreError::InvalidUpdate(format!(
            "replacement documents may not contain operators, found {op}"
        ))),
        None => Ok(()),
    }
}

/// Apply an operator update in place. Returns `true` if anything changed.
///
/// `inserting` enables `$setOnInsert`. On error the document may be
/// partially modified; callers apply updates to a copy.
pub fn apply_update(document: &mut Document, update: &Document, inserting: bool) -> StoreResult<bool> {
    validate_update(update)?;
    let before = document.clone();

    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            continue;
        };
        for (path, value) in fields {
            let parts: Vec<&str> = path.split('.').collect();
            match op.as_str() {
                "$set" => set_path(document, &parts, value.clone())?,
                "$setOnInsert" if inserting => set_path(document, &parts, value.clone())?,
                "$unset" => {
                    remove_path(document, &parts);
                }
                "$inc" => {
                    let current = filter::lookup(document, path).cloned();
                    let next = increment(path, current, value)?;
                    set_path(document, &parts, next)?;
                }
                _ => {}
            }
        }
    }

    if let Some(original) = before.get(ID) {
        match document.get(ID) {
            Some(now) if filter::values_equal(original, now) => {}
            _ => {
                return Err(StoreError::ImmutableField { field: ID.into() });
            }
        }
    }
    Ok(*document != before)
}

/// Build the document that replaces `existing`, keeping its `_id` first.
pub fn apply_replacement(existing: &Document, replacement: Document) -> StoreResult<Document> {
    validate_replacement(&replacement)?;
    let mut result = Document::new();
    if let Some(id) = existing.get(ID) {
        if let Some(new_id) = replacement.get(ID) {
            if !filter::values_equal(id, new_id) {
                return Err(StoreError::ImmutableField { field: ID.into() });
            }
        }
        result.insert(ID, id.clone());
    }
    for (key, value) in replacement {
        if key != ID {
            result.insert(key, value);
        }
    }
    Ok(result)
}

/// Seed an upserted document from the equality conditions of a filter.
pub fn upsert_seed(filter_document: &Document) -> StoreResult<Document> {
    let mut seed = Document::new();
    for (path, condition) in filter_document {
        if path.starts_with('$') {
            continue;
        }
        let value = match condition {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                match ops.get("$eq") {
                    Some(eq) => eq.clone(),
                    None => continue,
                }
            }
            other => other.clone(),
        };
        let parts: Vec<&str> = path.split('.').collect();
        set_path(&mut seed, &parts, value)?;
    }
    Ok(seed)
}

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn set_path(document: &mut Document, parts: &[&str], value: Bson) -> StoreResult<()> {
    let Some((head, rest)) = parts.split_first() else {
        return Err(StoreError::InvalidUpdate("empty field path".into()));
    };
    if rest.is_empty() {
        document.insert(*head, value);
        return Ok(());
    }
    let child = document
        .entry(head.to_string())
        .or_insert_with(|| Bson::Document(Document::new()));
    match child {
        Bson::Document(inner) => set_path(inner, rest, value),
        Bson::Array(items) => {
            let index = rest[0]
                .parse::<usize>()
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| {
                    StoreError::InvalidUpdate(format!("cannot index array {head} with {}", rest[0]))
                })?;
            match (&rest[1..], &mut items[index]) {
                ([], slot) => {
                    *slot = value;
                    Ok(())
                }
                (deeper, Bson::Document(inner)) => set_path(inner, deeper, value),
                _ => Err(StoreError::InvalidUpdate(format!(
                    "cannot traverse element {} of {head}",
                    rest[0]
                ))),
            }
        }
        other => Err(StoreError::InvalidUpdate(format!(
            "cannot create field {} inside {head}, which holds {:?}",
            rest[0],
            other.element_type()
        ))),
    }
}

fn remove_path(document: &mut Document, parts: &[&str]) -> bool {
    match parts {
        [] => false,
        [last] => document.remove(*last).is_some(),
        [head, rest @ ..] => match document.get_mut(*head) {
            Some(Bson::Document(inner)) => remove_path(inner, rest),
            _ => false,
        },
    }
}

fn increment(path: &str, current: Option<Bson>, amount: &Bson) -> StoreResult<Bson> {
    let result = match (current.unwrap_or(Bson::Int32(0)), amount) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or_else(|| Bson::Int64(i64::from(a) + i64::from(*b))),
        (Bson::Int32(a), Bson::Int64(b)) => checked_i64(path, i64::from(a), *b)?,
        (Bson::Int64(a), Bson::Int32(b)) => checked_i64(path, a, i64::from(*b))?,
        (Bson::Int64(a), Bson::Int64(b)) => checked_i64(path, a, *b)?,
        (Bson::Double(a), b) => Bson::Double(a + as_f64(b)),
        (a, Bson::Double(b)) if is_number(&a) => Bson::Double(as_f64(&a) + b),
        (other, _) => {
            return Err(StoreError::InvalidUpdate(format!(
                "cannot $inc {path}: it holds {:?}",
                other.element_type()
            )))
        }
    };
    Ok(result)
}

fn checked_i64(path: &str, a: i64, b: i64) -> StoreResult<Bson> {
    a.checked_add(b)
        .map(Bson::Int64)
        .ok_or_else(|| StoreError::InvalidUpdate(format!("$inc on {path} overflows")))
}

fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => f64::from(*n),
        Bson::Int64(n) => *n as f64,
        Bson::Double(f) => *f,
        _ => 0.0,
    }
}

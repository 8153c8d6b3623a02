//! Filter matching and value ordering.
//!
//! Supports implicit equality, dotted paths, the comparison operators
//! `$eq $ne $gt $gte $lt $lte $in $nin $exists $not`, and the logical
//! operators `$and $or $nor`. Equality follows document-database rules:
//! numbers compare across integer and double types, a scalar matches any
//! element of an array, and `null` matches a missing field.

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::error::{StoreError, StoreResult};

/// Resolve a dotted path (`a.b.0.c`) inside a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dotted path the way a filter sees it.
///
/// Numeric segments index into arrays like [`lookup`]. Any other segment
/// applied to an array is applied to each embedded document in it, and the
/// values found are gathered into an array, so `list.x` matches when any
/// element of `list` has a matching `x`.
pub fn path_value(document: &Document, path: &str) -> Option<Bson> {
    let parts: Vec<&str> = path.split('.').collect();
    let (head, rest) = parts.split_first()?;
    descend(document.get(*head)?, rest)
}

fn descend(value: &Bson, parts: &[&str]) -> Option<Bson> {
    let Some((head, rest)) = parts.split_first() else {
        return Some(value.clone());
    };
    match value {
        Bson::Document(inner) => descend(inner.get(*head)?, rest),
        Bson::Array(items) => match head.parse::<usize>() {
            Ok(index) => descend(items.get(index)?, rest),
            Err(_) => {
                let mut found = Vec::new();
                for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                    match descend(item, parts) {
                        // Offer the array itself and its elements.
                        Some(Bson::Array(nested)) => {
                            found.push(Bson::Array(nested.clone()));
                            found.extend(nested);
                        }
                        Some(value) => found.push(value),
                        None => {}
                    }
                }
                (!found.is_empty()).then_some(Bson::Array(found))
            }
        },
        _ => None,
    }
}

/// Returns `true` if `document` satisfies every condition in `filter`.
pub fn matches(document: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let satisfied = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => any_clause(document, key, condition)?,
            "$nor" => !any_clause(document, key, condition)?,
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidFilter(format!(
                    "unknown top-level operator {op}"
                )))
            }
            path => matches_condition(path_value(document, path).as_ref(), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(op: &str, condition: &'a Bson) -> StoreResult<Vec<&'a Document>> {
    let invalid = || StoreError::InvalidFilter(format!("{op} expects a non-empty array of documents"));
    match condition {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Bson::Document(clause) => Ok(clause),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}

fn any_clause(document: &Document, op: &str, condition: &Bson) -> StoreResult<bool> {
    for clause in clauses(op, condition)? {
        if matches(document, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_operator_document(document: &Document) -> bool {
    document.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (op, operand) in operators {
                if !apply_operator(value, op, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(equals(value, condition)),
    }
}

fn apply_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> StoreResult<bool> {
    let ordered = |wanted: fn(Ordering) -> bool| {
        value.is_some_and(|v| {
            candidates(v).any(|c| compare_same_class(c, operand).is_some_and(wanted))
        })
    };
    Ok(match op {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => ordered(Ordering::is_gt),
        "$gte" => ordered(Ordering::is_ge),
        "$lt" => ordered(Ordering::is_lt),
        "$lte" => ordered(Ordering::is_le),
        "$in" => in_list(value, op, operand)?,
        "$nin" => !in_list(value, op, operand)?,
        "$exists" => value.is_some() == truthy(operand),
        "$not" => match operand {
            Bson::Document(inner) if is_operator_document(inner) => {
                !matches_condition(value, operand)?
            }
            _ => {
                return Err(StoreError::InvalidFilter(
                    "$not expects an operator document".into(),
                ))
            }
        },
        other => {
            return Err(StoreError::InvalidFilter(format!("unknown operator {other}")));
        }
    })
}

fn in_list(value: Option<&Bson>, op: &str, operand: &Bson) -> StoreResult<bool> {
    match operand {
        Bson::Array(items) => Ok(items.iter().any(|item| equals(value, item))),
        _ => Err(StoreError::InvalidFilter(format!("{op} expects an array"))),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => number(other).map_or(true, |n| n != Number::Int(0) && n != Number::Float(0.0)),
    }
}

/// An array offers its elements for comparison; anything else offers itself.
fn candidates(value: &Bson) -> Box<dyn Iterator<Item = &Bson> + '_> {
    match value {
        Bson::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

/// Equality as a filter sees it.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(value) => {
            values_equal(value, target)
                || matches!(value, Bson::Array(items) if items.iter().any(|i| values_equal(i, target)))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

fn number(value: &Bson) -> Option<Number> {
    match value {
        Bson::Int32(n) => Some(Number::Int(i64::from(*n))),
        Bson::Int64(n) => Some(Number::Int(*n)),
        Bson::Double(f) => Some(Number::Float(*f)),
        _ => None,
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        (Number::Int(x), Number::Float(y)) => (x as f64).partial_cmp(&y),
        (Number::Float(x), Number::Int(y)) => x.partial_cmp(&(y as f64)),
        (Number::Float(x), Number::Float(y)) => x.partial_cmp(&y),
    }
}

/// Structural equality with numeric values compared by magnitude.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return compare_numbers(x, y) == Some(Ordering::Equal);
    }
    match (a, b) {
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((kl, vl), (kr, vr))| kl == kr && values_equal(vl, vr))
        }
        _ => a == b,
    }
}

/// Ordering between two values of the same type class, `None` otherwise.
fn compare_same_class(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return compare_numbers(x, y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.timestamp_millis().cmp(&y.timestamp_millis())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            Some((x.time, x.increment).cmp(&(y.time, y.increment)))
        }
        (Bson::Binary(x), Bson::Binary(y)) => Some(x.bytes.cmp(&y.bytes)),
        _ => None,
    }
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Total order across all values, used for sorting. Missing sorts as null.
pub fn total_cmp(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let a = a.unwrap_or(&Bson::Null);
    let b = b.unwrap_or(&Bson::Null);
    type_rank(a).cmp(&type_rank(b)).then_with(|| {
        if let Some(ordering) = compare_same_class(a, b) {
            return ordering;
        }
        match (a, b) {
            (Bson::Array(x), Bson::Array(y)) => x
                .iter()
                .zip(y)
                .map(|(l, r)| total_cmp(Some(l), Some(r)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| x.len().cmp(&y.len())),
            (Bson::Document(x), Bson::Document(y)) => x
                .iter()
                .zip(y.iter())
                .map(|((kl, vl), (kr, vr))| kl.cmp(kr).then_with(|| total_cmp(Some(vl), Some(vr))))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| x.len().cmp(&y.len())),
            _ => Ordering::Equal,
        }
    })
}

/// A validated sort specification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(String, bool)>,
}

impl SortSpec {
    /// Parse `{ field: 1 | -1, ... }`.
    pub fn parse(spec: &Document) -> StoreResult<Self> {
        let keys = spec
            .iter()
            .map(|(field, direction)| match number(direction) {
                Some(Number::Int(1)) => Ok((field.clone(), true)),
                Some(Number::Int(-1)) => Ok((field.clone(), false)),
                Some(Number::Float(f)) if f == 1.0 => Ok((field.clone(), true)),
                Some(Number::Float(f)) if f == -1.0 => Ok((field.clone(), false)),
                _ => Err(StoreError::InvalidFilter(format!(
                    "sort direction for {field} must be 1 or -1"
                ))),
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Self { keys })
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        self.keys
            .iter()
            .map(|(path, ascending)| {
                let ordering = total_cmp(lookup(a, path), lookup(b, path));
                if *ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use proptest::prelude::*;

    fn sample() -> Document {
        doc! {
            "_id": "1",
            "string": "ten",
            "integer": 10,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": { "level": 3, "name": "deep" },
            "nothing": Bson::Null,
        }
    }

    fn check(filter: Document) -> bool {
        matches(&sample(), &filter).unwrap()
    }

    #[test]
    fn lookup_paths() {
        let d = sample();
        assert_eq!(lookup(&d, "nested.level"), Some(&Bson::Int32(3)));
        assert_eq!(lookup(&d, "tags.1"), Some(&Bson::String("b".into())));
        assert_eq!(lookup(&d, "tags.9"), None);
        assert_eq!(lookup(&d, "string.x"), None);
        assert_eq!(lookup(&d, "absent"), None);
    }

    #[test]
    fn dotted_paths_reach_into_array_elements() {
        let d = doc! {
            "list": [ { "x": 1, "tags": ["p"] }, { "x": 2, "tags": ["q", "r"] }, 7 ],
        };
        assert_eq!(
            path_value(&d, "list.x"),
            Some(Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)]))
        );
        assert_eq!(path_value(&d, "list.1.x"), Some(Bson::Int32(2)));
        assert_eq!(path_value(&d, "list.y"), None);

        let hit = |filter: Document| matches(&d, &filter).unwrap();
        assert!(hit(doc! { "list.x": 1 }));
        assert!(hit(doc! { "list.x": { "$gt": 1 } }));
        assert!(!hit(doc! { "list.x": 3 }));
        assert!(!hit(doc! { "list.x": { "$ne": 2 } }));
        assert!(hit(doc! { "list.tags": "r" }));
        assert!(hit(doc! { "list.tags": ["q", "r"] }));
        assert!(hit(doc! { "list.y": { "$exists": false } }));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(check(doc! {}));
    }

    #[test]
    fn implicit_equality() {
        assert!(check(doc! { "string": "ten" }));
        assert!(!check(doc! { "string": "twenty" }));
        assert!(check(doc! { "string": "ten", "integer": 10 }));
        assert!(!check(doc! { "string": "ten", "integer": 11 }));
    }

    #[test]
    fn numbers_compare_across_types() {
        assert!(check(doc! { "integer": 10i64 }));
        assert!(check(doc! { "integer": 10.0 }));
        assert!(check(doc! { "ratio": { "$lt": 1 } }));
    }

    #[test]
    fn arrays_match_elements() {
        assert!(check(doc! { "tags": "a" }));
        assert!(check(doc! { "tags": ["a", "b"] }));
        assert!(!check(doc! { "tags": ["b", "a"] }));
    }

    #[test]
    fn null_matches_missing() {
        assert!(check(doc! { "absent": Bson::Null }));
        assert!(check(doc! { "nothing": Bson::Null }));
        assert!(!check(doc! { "string": Bson::Null }));
    }

    #[test]
    fn nested_paths() {
        assert!(check(doc! { "nested.level": 3 }));
        assert!(check(doc! { "nested": { "level": 3, "name": "deep" } }));
        assert!(!check(doc! { "nested": { "name": "deep", "level": 3 } }));
    }

    #[test]
    fn comparison_operators() {
        assert!(check(doc! { "integer": { "$gt": 5, "$lte": 10 } }));
        assert!(!check(doc! { "integer": { "$gt": 10 } }));
        assert!(check(doc! { "integer": { "$gte": 10 } }));
        assert!(check(doc! { "string": { "$ne": "twenty" } }));
        assert!(check(doc! { "string": { "$eq": "ten" } }));
        assert!(!check(doc! { "string": { "$gt": 5 } }));
        assert!(check(doc! { "tags": { "$gt": "a" } }));
    }

    #[test]
    fn set_operators() {
        assert!(check(doc! { "integer": { "$in": [1, 10] } }));
        assert!(!check(doc! { "integer": { "$nin": [1, 10] } }));
        assert!(check(doc! { "tags": { "$in": ["z", "b"] } }));
        assert!(matches!(
            matches(&sample(), &doc! { "integer": { "$in": 10 } }),
            Err(StoreError::InvalidFilter(_))
        ));
    }

    #[test]
    fn exists_and_not() {
        assert!(check(doc! { "nothing": { "$exists": true } }));
        assert!(check(doc! { "absent": { "$exists": false } }));
        assert!(!check(doc! { "string": { "$exists": 0 } }));
        assert!(check(doc! { "integer": { "$not": { "$gt": 50 } } }));
    }

    #[test]
    fn logical_operators() {
        assert!(check(doc! { "$or": [ { "string": "x" }, { "integer": 10 } ] }));
        assert!(!check(doc! { "$and": [ { "string": "ten" }, { "integer": 11 } ] }));
        assert!(check(doc! { "$nor": [ { "string": "x" }, { "integer": 11 } ] }));
        assert!(matches!(
            matches(&sample(), &doc! { "$or": [] }),
            Err(StoreError::InvalidFilter(_))
        ));
    }

    #[test]
    fn unknown_operators_rejected() {
        assert!(matches!(
            matches(&sample(), &doc! { "$where": "1" }),
            Err(StoreError::InvalidFilter(_))
        ));
        assert!(matches!(
            matches(&sample(), &doc! { "integer": { "$near": 1 } }),
            Err(StoreError::InvalidFilter(_))
        ));
    }

    #[test]
    fn cross_type_order() {
        assert_eq!(total_cmp(None, Some(&Bson::Int32(0))), Ordering::Less);
        assert_eq!(total_cmp(Some(&Bson::Int32(5)), Some(&Bson::String("a".into()))), Ordering::Less);
        assert_eq!(total_cmp(Some(&Bson::Double(2.5)), Some(&Bson::Int64(2))), Ordering::Greater);
        assert_eq!(total_cmp(Some(&Bson::Null), None), Ordering::Equal);
    }

    #[test]
    fn sort_spec() {
        let spec = SortSpec::parse(&doc! { "integer": -1, "string": 1 }).unwrap();
        let a = doc! { "integer": 1, "string": "b" };
        let b = doc! { "integer": 1, "string": "a" };
        let c = doc! { "integer": 2 };
        assert_eq!(spec.compare(&a, &b), Ordering::Greater);
        assert_eq!(spec.compare(&c, &a), Ordering::Less);
        assert!(SortSpec::parse(&doc! { "integer": 2 }).is_err());
    }

    proptest! {
        #[test]
        fn integer_equality_ignores_width(n in any::<i32>()) {
            let d = doc! { "n": n };
            let eq = doc! { "n": i64::from(n) };
            let range = doc! { "n": { "$gte": n, "$lte": n } };
            prop_assert!(matches(&d, &eq).unwrap());
            prop_assert!(matches(&d, &range).unwrap());
        }
    }
}

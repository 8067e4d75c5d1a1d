//! Filter, sort and projection evaluation over stored documents.

use std::cmp::Ordering;

use utr_matcher::compare_numbers;
use utr_model::{Document, Value};

use crate::codes::BAD_VALUE;
use crate::memory::failure::{CommandFailure, CommandResult};

/// Rank of a value's type in the server's cross-type sort order.
const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 1,
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_) => 2,
        Value::String(_) => 3,
        Value::Document(_) => 4,
        Value::Array(_) => 5,
        Value::Binary(_) => 6,
        Value::ObjectId(_) => 7,
        Value::Bool(_) => 8,
        Value::DateTime(_) => 9,
    }
}

/// Total order over values, following the server's comparison rules.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Ordering {
    let by_type = type_rank(left).cmp(&type_rank(right));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::DateTime(l), Value::DateTime(r)) => l.cmp(r),
        (Value::ObjectId(l), Value::ObjectId(r)) => l.cmp(r),
        (Value::Binary(l), Value::Binary(r)) => (l.bytes.len(), l.subtype, &l.bytes).cmp(&(
            r.bytes.len(),
            r.subtype,
            &r.bytes,
        )),
        (Value::Array(l), Value::Array(r)) => compare_sequences(l, r),
        (Value::Document(l), Value::Document(r)) => compare_documents(l, r),
        _ if left.is_number() => compare_numbers(left, right).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

fn compare_sequences(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right) {
        let ordering = compare_values(l, r);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

fn compare_documents(left: &Document, right: &Document) -> Ordering {
    for ((lk, lv), (rk, rv)) in left.iter().zip(right.iter()) {
        let ordering = compare_values(lv, rv).then_with(|| lk.cmp(rk));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

/// Equality as the server applies it: numbers compare across types.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    compare_values(left, right) == Ordering::Equal
}

/// Whether a value counts as true in projections and flags.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        number if number.is_number() => number.as_f64().is_some_and(|n| n != 0.0),
        _ => true,
    }
}

/// Whether a document satisfies a query filter.
pub(crate) fn matches_filter(document: &Document, filter: &Document) -> CommandResult<bool> {
    for (key, condition) in filter.iter() {
        let satisfied = match key {
            "$and" => all_clauses(document, key, condition)?,
            "$or" => any_clause(document, key, condition)?,
            "$nor" => !any_clause(document, key, condition)?,
            other if other.starts_with('$') => {
                return Err(CommandFailure::new(
                    BAD_VALUE,
                    format!("unknown top level operator: {other}"),
                ));
            }
            path => field_matches(document.get_path(path), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_clauses(document: &Document, key: &str, condition: &Value) -> CommandResult<bool> {
    for clause in logical_clauses(key, condition)? {
        if !matches_filter(document, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_clause(document: &Document, key: &str, condition: &Value) -> CommandResult<bool> {
    for clause in logical_clauses(key, condition)? {
        if matches_filter(document, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn logical_clauses<'v>(key: &str, condition: &'v Value) -> CommandResult<Vec<&'v Document>> {
    let invalid = || CommandFailure::new(BAD_VALUE, format!("{key} must be an array of objects"));
    let items = condition.as_array().ok_or_else(invalid)?;
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .iter()
        .map(|item| item.as_document().ok_or_else(invalid))
        .collect()
}

fn is_operator_document(condition: &Value) -> Option<&Document> {
    condition
        .as_document()
        .filter(|document| document.first().is_some_and(|(key, _)| key.starts_with('$')))
}

fn field_matches(field: Option<&Value>, condition: &Value) -> CommandResult<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(field_equals(field, condition));
    };
    for (operator, operand) in operators.iter() {
        let satisfied = match operator {
            "$eq" => field_equals(field, operand),
            "$ne" => !field_equals(field, operand),
            "$gt" => field_compares(field, operand, |o| o == Ordering::Greater),
            "$gte" => field_compares(field, operand, |o| o != Ordering::Less),
            "$lt" => field_compares(field, operand, |o| o == Ordering::Less),
            "$lte" => field_compares(field, operand, |o| o != Ordering::Greater),
            "$in" => field_in(field, operator, operand)?,
            "$nin" => !field_in(field, operator, operand)?,
            "$exists" => field.is_some() == is_truthy(operand),
            other => {
                return Err(CommandFailure::new(
                    BAD_VALUE,
                    format!("unknown operator: {other}"),
                ));
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn field_equals(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => matches!(expected, Value::Null),
        Some(Value::Array(items)) if !matches!(expected, Value::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

fn field_compares(
    field: Option<&Value>,
    operand: &Value,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    let comparable =
        |value: &Value| type_rank(value) == type_rank(operand) && accept(compare_values(value, operand));
    match field {
        None => false,
        Some(Value::Array(items)) if !matches!(operand, Value::Array(_)) => {
            items.iter().any(comparable)
        }
        Some(value) => comparable(value),
    }
}

fn field_in(field: Option<&Value>, operator: &str, operand: &Value) -> CommandResult<bool> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| CommandFailure::new(BAD_VALUE, format!("{operator} needs an array")))?;
    Ok(candidates
        .iter()
        .any(|candidate| field_equals(field, candidate)))
}

/// Sorts documents in place by a sort specification such as `{x: -1}`.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> CommandResult<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (path, direction) in sort.iter() {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => {
                return Err(CommandFailure::new(
                    BAD_VALUE,
                    format!("invalid sort direction for {path}"),
                ));
            }
        };
        keys.push((path, descending));
    }
    documents.sort_by(|left, right| {
        keys.iter()
            .map(|(path, descending)| {
                let ordering = compare_values(
                    left.get_path(path).unwrap_or(&Value::Null),
                    right.get_path(path).unwrap_or(&Value::Null),
                );
                if *descending { ordering.reverse() } else { ordering }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(())
}

/// Applies an inclusion or exclusion projection to top-level fields.
pub(crate) fn project(document: &Document, projection: &Document) -> Document {
    let inclusion = projection
        .iter()
        .any(|(key, flag)| key != "_id" && is_truthy(flag));
    let keep_id = projection.get("_id").is_none_or(is_truthy);
    let included = |key: &str| {
        projection
            .iter()
            .any(|(path, flag)| is_truthy(flag) && path.split('.').next() == Some(key))
    };
    document
        .iter()
        .filter(|&(key, _)| {
            if key == "_id" {
                keep_id
            } else if inclusion {
                included(key)
            } else {
                !projection.contains_key(key)
            }
        })
        .map(|(key, value)| (key.to_owned(), value.clone()))
        .collect()
}

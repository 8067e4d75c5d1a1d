//! Update operators and replacement documents.

use utr_model::{Document, Value};

use crate::codes::{BAD_VALUE, FAILED_TO_PARSE, IMMUTABLE_FIELD, PATH_NOT_VIABLE, TYPE_MISMATCH};
use crate::memory::failure::{CommandFailure, CommandResult};
use crate::memory::query::values_equal;

/// Whether an update document uses operators rather than replacing the
/// document.
pub(crate) fn is_operator_update(update: &Document) -> bool {
    update.first().is_some_and(|(key, _)| key.starts_with('$'))
}

/// Applies an update to a copy of `original`.
///
/// `inserting` enables `$setOnInsert`, used when an upsert creates the
/// document.
pub(crate) fn apply_update(
    original: &Document,
    update: &Document,
    inserting: bool,
) -> CommandResult<Document> {
    if !is_operator_update(update) {
        return replace(original, update);
    }
    let mut updated = original.clone();
    for (operator, operand_fields) in update.iter() {
        let fields = operand_fields.as_document().ok_or_else(|| {
            CommandFailure::new(
                FAILED_TO_PARSE,
                format!("Modifiers operate on fields but we found a non-document for {operator}"),
            )
        })?;
        for (path, operand) in fields.iter() {
            if path == "_id" || path.starts_with("_id.") {
                return Err(CommandFailure::new(
                    IMMUTABLE_FIELD,
                    "Performing an update on the path '_id' would modify the immutable field '_id'",
                ));
            }
            match operator {
                "$set" => set_path(&mut updated, path, operand.clone())?,
                "$setOnInsert" if inserting => set_path(&mut updated, path, operand.clone())?,
                "$setOnInsert" => {}
                "$unset" => remove_path(&mut updated, path),
                "$inc" => increment(&mut updated, path, operand)?,
                "$push" => push(&mut updated, path, operand)?,
                other => {
                    return Err(CommandFailure::new(
                        FAILED_TO_PARSE,
                        format!("Unknown modifier: {other}"),
                    ));
                }
            }
        }
    }
    Ok(updated)
}

fn replace(original: &Document, replacement: &Document) -> CommandResult<Document> {
    let mut replaced = replacement.clone();
    match (original.get("_id"), replacement.get("_id")) {
        (Some(old), Some(new)) if !values_equal(old, new) => Err(CommandFailure::new(
            IMMUTABLE_FIELD,
            "After applying the update, the (immutable) field '_id' was found to have been altered",
        )),
        (Some(old), None) => {
            replaced.insert_first("_id", old.clone());
            Ok(replaced)
        }
        _ => Ok(replaced),
    }
}

fn parent_mut<'d>(document: &'d mut Document, path: &str) -> CommandResult<(&'d mut Document, String)> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let leaf = segments.pop().unwrap_or(path).to_owned();
    let mut current = document;
    for segment in segments {
        if !current.contains_key(segment) {
            current.insert(segment, Document::new());
        }
        current = match current.get_mut(segment) {
            Some(Value::Document(child)) => child,
            _ => {
                return Err(CommandFailure::new(
                    PATH_NOT_VIABLE,
                    format!("Cannot create field '{leaf}' in element {{{segment}: ...}}"),
                ));
            }
        };
    }
    Ok((current, leaf))
}

fn set_path(document: &mut Document, path: &str, value: Value) -> CommandResult<()> {
    let (parent, leaf) = parent_mut(document, path)?;
    parent.insert(leaf, value);
    Ok(())
}

fn remove_path(document: &mut Document, path: &str) {
    let mut segments = path.split('.').peekable();
    let mut current = document;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.remove(segment);
            return;
        }
        match current.get_mut(segment) {
            Some(Value::Document(child)) => current = child,
            _ => return,
        }
    }
}

fn increment(document: &mut Document, path: &str, operand: &Value) -> CommandResult<()> {
    if !operand.is_number() {
        return Err(CommandFailure::new(
            TYPE_MISMATCH,
            format!("Cannot increment with non-numeric argument: {{{path}: {operand}}}"),
        ));
    }
    let (parent, leaf) = parent_mut(document, path)?;
    let current = parent.get(&leaf).cloned().unwrap_or(Value::Int32(0));
    let sum = add_numbers(&current, operand).ok_or_else(|| {
        CommandFailure::new(
            TYPE_MISMATCH,
            format!("Cannot apply $inc to a value of non-numeric type {}", current.type_name()),
        )
    })?;
    parent.insert(leaf, sum);
    Ok(())
}

fn push(document: &mut Document, path: &str, operand: &Value) -> CommandResult<()> {
    let (parent, leaf) = parent_mut(document, path)?;
    match parent.get_mut(&leaf) {
        Some(Value::Array(items)) => items.push(operand.clone()),
        Some(other) => {
            return Err(CommandFailure::new(
                BAD_VALUE,
                format!("The field '{leaf}' must be an array but is of type {}", other.type_name()),
            ));
        }
        None => {
            parent.insert(leaf, vec![operand.clone()]);
        }
    }
    Ok(())
}

/// Adds two numbers with the server's type promotion rules.
///
/// Returns `None` when either value is not an integer or double, or when a
/// 64-bit integer sum overflows.
pub(crate) fn add_numbers(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Int32(l), Value::Int32(r)) => Some(
            l.checked_add(*r)
                .map_or_else(|| Value::Int64(i64::from(*l) + i64::from(*r)), Value::Int32),
        ),
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            left.as_i64()?.checked_add(right.as_i64()?).map(Value::Int64)
        }
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            Some(Value::Double(add_floats(left.as_f64()?, right.as_f64()?)))
        }
        _ => None,
    }
}

#[expect(clippy::float_arithmetic, reason = "$inc and $sum on doubles add doubles")]
fn add_floats(left: f64, right: f64) -> f64 {
    left + right
}

/// Builds the document an upsert inserts: equality fields of the filter,
/// then the update or replacement.
pub(crate) fn upsert_seed(filter: &Document, update: &Document) -> CommandResult<Document> {
    let mut seed = Document::new();
    for (key, value) in filter.iter() {
        let is_operator = value
            .as_document()
            .and_then(Document::first)
            .is_some_and(|(first, _)| first.starts_with('$'));
        if !key.starts_with('$') && !is_operator {
            set_path(&mut seed, key, value.clone())?;
        }
    }
    if is_operator_update(update) {
        apply_update(&seed, update, true)
    } else {
        let mut replacement = update.clone();
        if let Some(id) = seed.get("_id")
            && !replacement.contains_key("_id")
        {
            replacement.insert_first("_id", id.clone());
        }
        Ok(replacement)
    }
}

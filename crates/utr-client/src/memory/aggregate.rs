//! Aggregation pipeline stages supported by the in-memory server.

use utr_model::{Document, Value};

use crate::codes::{BAD_VALUE, UNRECOGNIZED_STAGE};
use crate::memory::failure::{CommandFailure, CommandResult};
use crate::memory::query::{matches_filter, project, sort_documents, values_equal};
use crate::memory::update::add_numbers;

/// Runs a pipeline over the documents of a collection.
pub(crate) fn run_pipeline(
    mut documents: Vec<Document>,
    pipeline: &[Value],
) -> CommandResult<Vec<Document>> {
    for stage in pipeline {
        let (name, spec) = stage
            .as_document()
            .filter(|stage_doc| stage_doc.len() == 1)
            .and_then(Document::first)
            .ok_or_else(|| {
                CommandFailure::new(
                    BAD_VALUE,
                    "A pipeline stage specification object must contain exactly one field.",
                )
            })?;
        documents = match name {
            "$match" => {
                let filter = stage_document(name, spec)?;
                let mut kept = Vec::with_capacity(documents.len());
                for document in documents {
                    if matches_filter(&document, filter)? {
                        kept.push(document);
                    }
                }
                kept
            }
            "$sort" => {
                sort_documents(&mut documents, stage_document(name, spec)?)?;
                documents
            }
            "$skip" => {
                let count = stage_count(name, spec)?;
                documents.into_iter().skip(count).collect()
            }
            "$limit" => {
                let count = stage_count(name, spec)?;
                documents.into_iter().take(count).collect()
            }
            "$project" => {
                let projection = stage_document(name, spec)?;
                documents
                    .iter()
                    .map(|document| project(document, projection))
                    .collect()
            }
            "$addFields" | "$set" => {
                let fields = stage_document(name, spec)?;
                documents
                    .into_iter()
                    .map(|document| add_fields(document, fields))
                    .collect()
            }
            "$count" => count(name, spec, documents.len())?,
            "$group" => group(&documents, stage_document(name, spec)?)?,
            other => {
                return Err(CommandFailure::new(
                    UNRECOGNIZED_STAGE,
                    format!("Unrecognized pipeline stage name: '{other}'"),
                ));
            }
        };
    }
    Ok(documents)
}

fn stage_document<'v>(name: &str, spec: &'v Value) -> CommandResult<&'v Document> {
    spec.as_document().ok_or_else(|| {
        CommandFailure::new(
            BAD_VALUE,
            format!("the {name} stage specification must be an object"),
        )
    })
}

fn stage_count(name: &str, spec: &Value) -> CommandResult<usize> {
    spec.as_i64()
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| {
            CommandFailure::new(
                BAD_VALUE,
                format!("invalid argument to {name} stage: expected a non-negative number"),
            )
        })
}

/// Evaluates an expression: `"$field"` reads a field, anything else is a
/// literal.
fn evaluate<'d>(document: &'d Document, expression: &'d Value) -> Option<&'d Value> {
    match expression.as_str().and_then(|text| text.strip_prefix('$')) {
        Some(path) => document.get_path(path),
        None => Some(expression),
    }
}

fn add_fields(mut document: Document, fields: &Document) -> Document {
    for (key, expression) in fields.iter() {
        let value = evaluate(&document, expression).cloned().unwrap_or(Value::Null);
        document.insert(key, value);
    }
    document
}

fn count(name: &str, spec: &Value, total: usize) -> CommandResult<Vec<Document>> {
    let field = spec
        .as_str()
        .filter(|field| !field.is_empty() && !field.starts_with('$'))
        .ok_or_else(|| {
            CommandFailure::new(BAD_VALUE, format!("the {name} field must be a non-empty string"))
        })?;
    if total == 0 {
        return Ok(Vec::new());
    }
    let mut result = Document::new();
    result.insert(
        field,
        i32::try_from(total).map_or_else(|_| Value::Int64(i64::MAX), Value::Int32),
    );
    Ok(vec![result])
}

enum Accumulator {
    Sum,
    First,
    Push,
}

impl Accumulator {
    const fn initial(&self) -> Value {
        match self {
            Self::Sum => Value::Int32(0),
            Self::First => Value::Null,
            Self::Push => Value::Array(Vec::new()),
        }
    }

    fn accumulate(&self, slot: &mut Value, input: Option<&Value>, first_member: bool) {
        match self {
            Self::Sum => {
                if let Some(number) = input.filter(|value| value.is_number())
                    && let Some(sum) = add_numbers(slot, number)
                {
                    *slot = sum;
                }
            }
            Self::First => {
                if first_member {
                    *slot = input.cloned().unwrap_or(Value::Null);
                }
            }
            Self::Push => {
                if let (Value::Array(items), Some(value)) = (slot, input) {
                    items.push(value.clone());
                }
            }
        }
    }
}

struct Group {
    key: Value,
    values: Vec<Value>,
}

fn group(documents: &[Document], spec: &Document) -> CommandResult<Vec<Document>> {
    let key_expression = spec.get("_id").ok_or_else(|| {
        CommandFailure::new(BAD_VALUE, "a group specification must include an _id")
    })?;
    let mut accumulators = Vec::new();
    for (field, definition) in spec.iter().filter(|(field, _)| *field != "_id") {
        let (operator, argument) = definition
            .as_document()
            .and_then(Document::first)
            .ok_or_else(|| {
                CommandFailure::new(
                    BAD_VALUE,
                    format!("the field '{field}' must be an accumulator object"),
                )
            })?;
        let accumulator = match operator {
            "$sum" => Accumulator::Sum,
            "$first" => Accumulator::First,
            "$push" => Accumulator::Push,
            other => {
                return Err(CommandFailure::new(
                    UNRECOGNIZED_STAGE,
                    format!("unknown group operator '{other}'"),
                ));
            }
        };
        accumulators.push((field, accumulator, argument));
    }

    let mut groups: Vec<Group> = Vec::new();
    for document in documents {
        let key = evaluate(document, key_expression)
            .cloned()
            .unwrap_or(Value::Null);
        let existing = groups
            .iter()
            .position(|group| values_equal(&group.key, &key));
        let first_member = existing.is_none();
        if first_member {
            let values = accumulators
                .iter()
                .map(|(_, accumulator, _)| accumulator.initial())
                .collect();
            groups.push(Group { key, values });
        }
        let index = existing.unwrap_or_else(|| groups.len().saturating_sub(1));
        let Some(group) = groups.get_mut(index) else {
            continue;
        };
        for ((_, accumulator, argument), slot) in accumulators.iter().zip(&mut group.values) {
            accumulator.accumulate(slot, evaluate(document, argument), first_member);
        }
    }

    Ok(groups
        .into_iter()
        .map(|group| {
            let mut result = Document::new();
            result.insert("_id", group.key);
            for ((field, _, _), value) in accumulators.iter().zip(group.values) {
                result.insert(*field, value);
            }
            result
        })
        .collect())
}

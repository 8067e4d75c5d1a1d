//! Built-in special operators.

use std::cmp::Ordering;

use utr_model::{Value, from_json};

use crate::error::MatchError;
use crate::matcher::{MappingMode, Matcher, OperatorCall, OperatorTable};
use crate::numeric::compare_numbers;

/// Type names accepted by `$$type` as an alias for every numeric type.
const NUMBER_ALIAS: &str = "number";

pub(crate) fn register_builtins(table: &mut OperatorTable) {
    table
        .register("$$exists", exists)
        .register("$$type", type_of)
        .register("$$unsetOrMatches", unset_or_matches)
        .register("$$lte", lte)
        .register("$$matchesEntity", matches_entity)
        .register("$$matchesHexBytes", matches_hex_bytes)
        .register("$$sessionLsid", session_lsid)
        .register("$$matchAsDocument", match_as_document)
        .register("$$matchAsRoot", match_as_root)
        .register("$$exact", exact)
        .register("$$unordered", unordered);
}

fn exists(_matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let should_exist = call
        .operand
        .as_bool()
        .ok_or_else(|| call.invalid_operand("expected a boolean"))?;
    match (should_exist, call.actual.is_some()) {
        (true, false) => Err(call.mismatch("key is absent")),
        (false, true) => Err(call.mismatch("key is present")),
        _ => Ok(()),
    }
}

fn type_of(_matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let names = match call.operand {
        Value::String(name) => vec![name.as_str()],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| call.invalid_operand("expected type names as strings"))
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(call.invalid_operand("expected a type name or list of names")),
    };
    let actual = call.require_actual()?;
    let found = actual.type_name();
    let accepted = names
        .iter()
        .any(|name| *name == found || (*name == NUMBER_ALIAS && actual.is_number()));
    if accepted {
        Ok(())
    } else {
        Err(call.mismatch(format!("type {found} is not one of {}", names.join(", "))))
    }
}

fn unset_or_matches(matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    match call.actual {
        None => Ok(()),
        Some(actual) => matcher.check_at(call.operand, Some(actual), call.path, call.mode),
    }
}

fn lte(_matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    if !call.operand.is_number() {
        return Err(call.invalid_operand("expected a number"));
    }
    let actual = call.require_actual()?;
    if !actual.is_number() {
        return Err(call.mismatch(format!("expected a number, found {}", actual.type_name())));
    }
    match compare_numbers(actual, call.operand) {
        Some(Ordering::Less | Ordering::Equal) => Ok(()),
        _ => Err(call.mismatch(format!("{actual} is not less than or equal to {}", call.operand))),
    }
}

fn entity_id<'c>(call: &OperatorCall<'c>) -> Result<&'c str, MatchError> {
    call.operand
        .as_str()
        .ok_or_else(|| call.invalid_operand("expected an entity id"))
}

fn matches_entity(matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let id = entity_id(call)?;
    let entity = matcher
        .entities()
        .entity_value(id)
        .ok_or_else(|| MatchError::unknown_entity(call.name, call.path, id))?;
    matcher.check_at(&entity, call.actual, call.path, call.mode)
}

fn matches_hex_bytes(_matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let text = call
        .operand
        .as_str()
        .ok_or_else(|| call.invalid_operand("expected a hexadecimal string"))?;
    let bytes = hex::decode(text).map_err(|error| call.invalid_operand(error.to_string()))?;
    let actual = call.require_actual()?;
    let Some(binary) = actual.as_binary() else {
        return Err(call.mismatch(format!("expected binData, found {}", actual.type_name())));
    };
    if binary.bytes == bytes {
        Ok(())
    } else {
        Err(call.mismatch("bytes differ"))
    }
}

fn session_lsid(matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let id = entity_id(call)?;
    let lsid = matcher
        .entities()
        .session_lsid(id)
        .ok_or_else(|| MatchError::unknown_entity(call.name, call.path, id))?;
    matcher.check_at(
        &Value::Document(lsid),
        call.actual,
        call.path,
        MappingMode::Exact,
    )
}

fn match_as_document(matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let actual = call.require_actual()?;
    let Some(text) = actual.as_str() else {
        return Err(call.mismatch(format!("expected a JSON string, found {}", actual.type_name())));
    };
    let parsed = serde_json::from_str::<serde_json::Value>(text)
        .map_err(|error| call.mismatch(format!("actual string is not JSON: {error}")))?;
    let document = from_json(&parsed)
        .map_err(|error| call.mismatch(format!("actual string is not Extended JSON: {error}")))?;
    if document.as_document().is_none() {
        return Err(call.mismatch("actual string does not encode a document"));
    }
    matcher.check_at(call.operand, Some(&document), call.path, call.mode)
}

fn match_as_root(matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    matcher.check_at(
        call.operand,
        call.actual,
        call.path,
        MappingMode::Permissive,
    )
}

fn exact(matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    if call.operand.as_document().is_none() {
        return Err(call.invalid_operand("expected a mapping"));
    }
    matcher.check_at(call.operand, call.actual, call.path, MappingMode::Exact)
}

fn unordered(matcher: &Matcher<'_>, call: &OperatorCall<'_>) -> Result<(), MatchError> {
    let expected = call
        .operand
        .as_array()
        .ok_or_else(|| call.invalid_operand("expected a sequence"))?;
    let actual = call.require_actual()?;
    let Some(items) = actual.as_array() else {
        return Err(call.mismatch(format!("expected array, found {}", actual.type_name())));
    };
    if expected.len() != items.len() {
        return Err(call.mismatch(format!(
            "expected {} elements, found {}",
            expected.len(),
            items.len()
        )));
    }

    let mut candidates = Vec::with_capacity(expected.len());
    for (position, pattern) in expected.iter().enumerate() {
        let mut compatible = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match matcher.check_at(pattern, Some(item), &call.path.index(index), call.mode) {
                Ok(()) => compatible.push(index),
                Err(error) if error.is_specification_error() => return Err(error),
                Err(_) => {}
            }
        }
        if compatible.is_empty() {
            return Err(call.mismatch(format!("no element matches expected element {position}")));
        }
        candidates.push(compatible);
    }

    let mut owner = vec![None; items.len()];
    for position in 0..expected.len() {
        let mut visited = vec![false; items.len()];
        if !assign(position, &candidates, &mut owner, &mut visited) {
            return Err(call.mismatch(format!(
                "no distinct element left for expected element {position}"
            )));
        }
    }
    Ok(())
}

/// Augmenting-path step of bipartite matching between expected positions and
/// actual elements.
fn assign(
    position: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    let Some(compatible) = candidates.get(position) else {
        return false;
    };
    for &index in compatible {
        match visited.get_mut(index) {
            Some(seen) if !*seen => *seen = true,
            _ => continue,
        }
        let free = match owner.get(index).copied().flatten() {
            None => true,
            Some(previous) => assign(previous, candidates, owner, visited),
        };
        if free {
            if let Some(slot) = owner.get_mut(index) {
                *slot = Some(position);
            }
            return true;
        }
    }
    false
}

//! Static checks run on a parsed test file before any entity is created.

use std::collections::{HashMap, HashSet};

use utr_model::{EntityKind, Operation, SUPPORTED_SCHEMA_VERSION, TestCase, TestFile, Value};

use crate::error::SpecificationError;
use crate::executor;

/// Identifiers visible at some point of a file, with their kinds.
type Scope<'f> = HashMap<&'f str, EntityKind>;

/// Checks that a file can be interpreted.
///
/// Covers the schema version, entity declarations and parents, operation
/// objects and names, entity references in `session` and `client`
/// arguments, `expectEvents` clients, entity references inside
/// expectations, and duplicate case descriptions.
///
/// # Errors
///
/// Returns the first [`SpecificationError`] found, in file order.
pub fn validate(file: &TestFile) -> Result<(), SpecificationError> {
    if !file.schema_version.is_supported_schema() {
        return Err(SpecificationError::UnsupportedSchemaVersion {
            found: file.schema_version,
            supported: SUPPORTED_SCHEMA_VERSION,
        });
    }
    let declared = declared_entities(file)?;

    let mut descriptions = HashSet::new();
    for (index, case) in file.tests.iter().enumerate() {
        if !descriptions.insert(case.description.as_str()) {
            return Err(SpecificationError::Duplicate {
                what: "test description",
                id: case.description.clone(),
            });
        }
        validate_case(index, case, &declared)?;
    }
    Ok(())
}

fn declared_entities(file: &TestFile) -> Result<Scope<'_>, SpecificationError> {
    let mut declared = Scope::new();
    for (index, descriptor) in file.create_entities.iter().enumerate() {
        let id = descriptor.id();
        if let Some((parent, expected)) = descriptor.parent() {
            require_kind(
                &declared,
                &format!("createEntities[{index}] ({id})"),
                parent,
                expected,
            )?;
        }
        if declared.insert(id, descriptor.kind()).is_some() {
            return Err(SpecificationError::Duplicate {
                what: "entity id",
                id: id.to_owned(),
            });
        }
    }
    Ok(declared)
}

fn require_kind(
    scope: &Scope<'_>,
    location: &str,
    id: &str,
    expected: EntityKind,
) -> Result<(), SpecificationError> {
    match scope.get(id) {
        None => Err(SpecificationError::dangling(location, id)),
        Some(actual) if *actual != expected => Err(SpecificationError::WrongReferenceKind {
            location: location.to_owned(),
            id: id.to_owned(),
            expected,
            actual: *actual,
        }),
        Some(_) => Ok(()),
    }
}

fn validate_case<'f>(
    case_index: usize,
    case: &'f TestCase,
    declared: &Scope<'f>,
) -> Result<(), SpecificationError> {
    let mut scope = declared.clone();
    for (index, operation) in case.operations.iter().enumerate() {
        let location = format!(
            "tests[{case_index}].operations[{index}] ({})",
            operation.name
        );
        validate_operation(&location, operation, &scope)?;
        if let Some(saved) = operation.save_result_as_entity.as_deref()
            && scope.insert(saved, EntityKind::Value).is_some()
        {
            return Err(SpecificationError::Duplicate {
                what: "entity id",
                id: saved.to_owned(),
            });
        }
    }
    for (index, expected) in case.expect_events.iter().enumerate() {
        let location = format!("tests[{case_index}].expectEvents[{index}]");
        require_kind(&scope, &location, &expected.client, EntityKind::Client)?;
        for event in &expected.events {
            for field in event.fields.iter().map(|(_, value)| value) {
                check_operator_references(&location, field, &scope)?;
            }
        }
    }
    Ok(())
}

fn validate_operation(
    location: &str,
    operation: &Operation,
    scope: &Scope<'_>,
) -> Result<(), SpecificationError> {
    let object_kind = if operation.targets_test_runner() {
        None
    } else {
        let kind = scope
            .get(operation.object.as_str())
            .copied()
            .ok_or_else(|| SpecificationError::dangling(location, operation.object.as_str()))?;
        Some(kind)
    };
    if !executor::is_supported(object_kind, &operation.name) {
        let object = object_kind.map_or_else(|| operation.object.clone(), |kind| kind.to_string());
        return Err(SpecificationError::unsupported_operation(
            object,
            operation.name.as_str(),
        ));
    }
    for (argument, kind) in [
        ("session", EntityKind::Session),
        ("client", EntityKind::Client),
    ] {
        if let Some(Value::String(id)) = operation.argument(argument) {
            require_kind(scope, location, id, kind)?;
        }
    }
    let expectations = operation.expect_result.iter().chain(
        operation
            .expect_error
            .as_ref()
            .and_then(|error| error.expect_result.as_ref()),
    );
    for expected in expectations {
        check_operator_references(location, expected, scope)?;
    }
    Ok(())
}

/// Checks that `$$sessionLsid` and `$$matchesEntity` operands name entities
/// in scope.
fn check_operator_references(
    location: &str,
    expected: &Value,
    scope: &Scope<'_>,
) -> Result<(), SpecificationError> {
    match expected {
        Value::Document(document) => {
            if document.len() == 1 {
                if let Some(id) = document.get_str("$$sessionLsid") {
                    return require_kind(scope, location, id, EntityKind::Session);
                }
                if let Some(id) = document.get_str("$$matchesEntity")
                    && !scope.contains_key(id)
                {
                    return Err(SpecificationError::dangling(location, id));
                }
            }
            document
                .iter()
                .try_for_each(|(_, value)| check_operator_references(location, value, scope))
        }
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| check_operator_references(location, item, scope)),
        _ => Ok(()),
    }
}

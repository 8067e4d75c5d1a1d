//! Structural comparison of expected and actual values.

use std::collections::HashMap;

use utr_model::{Document, Value};

use crate::error::MatchError;
use crate::lookup::{EntityLookup, NoEntities};
use crate::numeric::numbers_equal;
use crate::operators;
use crate::path::MatchPath;

/// How mappings treat keys the expectation does not mention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MappingMode {
    /// Extra actual keys are ignored.
    #[default]
    Permissive,
    /// Extra actual keys are a mismatch, in nested mappings too.
    Exact,
}

/// Arguments passed to an operator implementation.
#[derive(Debug, Clone, Copy)]
pub struct OperatorCall<'c> {
    /// Operator name, including the `$$` prefix.
    pub name: &'c str,
    /// Value the operator key maps to.
    pub operand: &'c Value,
    /// Actual value at this position; `None` when the key is absent.
    pub actual: Option<&'c Value>,
    /// Location of the operator object.
    pub path: &'c MatchPath,
    /// Mapping mode in effect at this position.
    pub mode: MappingMode,
}

impl OperatorCall<'_> {
    /// Reports a mismatch at the operator's location.
    #[must_use]
    pub fn mismatch(&self, reason: impl Into<String>) -> MatchError {
        let mut expected = Document::new();
        expected.insert(self.name, self.operand.clone());
        MatchError::mismatch(self.path, &Value::Document(expected), self.actual, reason)
    }

    /// Reports a malformed operand.
    #[must_use]
    pub fn invalid_operand(&self, message: impl Into<String>) -> MatchError {
        MatchError::invalid_operand(self.name, self.path, message)
    }

    /// Returns the actual value or a mismatch stating that it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Mismatch`] when the key is absent.
    pub fn require_actual(&self) -> Result<&Value, MatchError> {
        self.actual.ok_or_else(|| self.mismatch("key is absent"))
    }
}

/// Signature of an operator implementation.
pub type OperatorFn = fn(&Matcher<'_>, &OperatorCall<'_>) -> Result<(), MatchError>;

/// Name-keyed table of special operators.
#[derive(Debug, Clone)]
pub struct OperatorTable {
    operators: HashMap<&'static str, OperatorFn>,
}

impl OperatorTable {
    /// Empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Table with every built-in operator registered.
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        operators::register_builtins(&mut table);
        table
    }

    /// Registers an operator, replacing any existing entry of that name.
    pub fn register(&mut self, name: &'static str, operator: OperatorFn) -> &mut Self {
        self.operators.insert(name, operator);
        self
    }

    /// Looks an operator up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<OperatorFn> {
        self.operators.get(name).copied()
    }

    /// Whether an operator of that name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Returns the operator name and operand when `value` is a special operator
/// object: a mapping with a single `$$`-prefixed key.
#[must_use]
pub fn special_operator(value: &Value) -> Option<(&str, &Value)> {
    let document = value.as_document()?;
    if document.len() != 1 {
        return None;
    }
    document.first().filter(|(key, _)| key.starts_with("$$"))
}

/// Compares actual values against match expressions.
///
/// Matching has no side effects: the same inputs always produce the same
/// outcome.
///
/// # Example
///
/// ```
/// use utr_matcher::Matcher;
/// use utr_model::from_json;
///
/// let expected = from_json(&serde_json::json!({"x": {"$$lte": 2}})).expect("valid");
/// let actual = from_json(&serde_json::json!({"_id": 1, "x": 2})).expect("valid");
/// assert!(Matcher::standalone().matches(&expected, &actual));
/// ```
pub struct Matcher<'a> {
    entities: &'a dyn EntityLookup,
    operators: OperatorTable,
}

impl<'a> Matcher<'a> {
    /// Matcher with the built-in operators and the given entity lookup.
    #[must_use]
    pub fn new(entities: &'a dyn EntityLookup) -> Self {
        Self::with_operators(entities, OperatorTable::builtin())
    }

    /// Matcher with a custom operator table.
    #[must_use]
    pub fn with_operators(entities: &'a dyn EntityLookup, operators: OperatorTable) -> Self {
        Self {
            entities,
            operators,
        }
    }

    /// Entity lookup used by entity-referencing operators.
    #[must_use]
    pub fn entities(&self) -> &dyn EntityLookup {
        self.entities
    }

    /// Whether `actual` satisfies `expected`.
    #[must_use]
    pub fn matches(&self, expected: &Value, actual: &Value) -> bool {
        self.check(expected, actual).is_ok()
    }

    /// Checks `actual` against `expected` with root-level permissiveness.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Mismatch`] describing the first divergence, or
    /// another [`MatchError`] variant when the expectation is malformed.
    pub fn check(&self, expected: &Value, actual: &Value) -> Result<(), MatchError> {
        self.check_at(
            expected,
            Some(actual),
            &MatchPath::root(),
            MappingMode::Permissive,
        )
    }

    /// Checks a possibly absent value at `path`.
    ///
    /// Operator implementations call this to match nested expressions.
    ///
    /// # Errors
    ///
    /// As for [`Matcher::check`].
    pub fn check_at(
        &self,
        expected: &Value,
        actual: Option<&Value>,
        path: &MatchPath,
        mode: MappingMode,
    ) -> Result<(), MatchError> {
        if let Some((name, operand)) = special_operator(expected) {
            let operator = self
                .operators
                .get(name)
                .ok_or_else(|| MatchError::UnsupportedOperator {
                    name: name.to_owned(),
                    path: path.clone(),
                })?;
            let call = OperatorCall {
                name,
                operand,
                actual,
                path,
                mode,
            };
            return operator(self, &call);
        }

        let Some(present) = actual else {
            return Err(MatchError::mismatch(path, expected, None, "key is absent"));
        };
        match (expected, present) {
            (Value::Document(expected_doc), Value::Document(actual_doc)) => {
                self.check_document(expected_doc, actual_doc, path, mode)
            }
            (Value::Array(expected_items), Value::Array(actual_items)) => {
                self.check_sequence(expected, expected_items, present, actual_items, path, mode)
            }
            _ => check_scalar(expected, present, path),
        }
    }

    fn check_document(
        &self,
        expected: &Document,
        actual: &Document,
        path: &MatchPath,
        mode: MappingMode,
    ) -> Result<(), MatchError> {
        for (key, expected_value) in expected.iter() {
            self.check_at(expected_value, actual.get(key), &path.key(key), mode)?;
        }
        if mode == MappingMode::Exact
            && let Some((key, value)) = actual.iter().find(|(key, _)| !expected.contains_key(key))
        {
            return Err(MatchError::mismatch(
                &path.key(key),
                &Value::Null,
                Some(value),
                "unexpected key",
            ));
        }
        Ok(())
    }

    fn check_sequence(
        &self,
        expected: &Value,
        expected_items: &[Value],
        actual: &Value,
        actual_items: &[Value],
        path: &MatchPath,
        mode: MappingMode,
    ) -> Result<(), MatchError> {
        if expected_items.len() != actual_items.len() {
            return Err(MatchError::mismatch(
                path,
                expected,
                Some(actual),
                format!(
                    "expected {} elements, found {}",
                    expected_items.len(),
                    actual_items.len()
                ),
            ));
        }
        for (index, (expected_item, actual_item)) in
            expected_items.iter().zip(actual_items).enumerate()
        {
            self.check_at(expected_item, Some(actual_item), &path.index(index), mode)?;
        }
        Ok(())
    }
}

impl Matcher<'static> {
    /// Matcher with the built-in operators and no entities.
    #[must_use]
    pub fn standalone() -> Self {
        static NONE: NoEntities = NoEntities;
        Self::new(&NONE)
    }
}

fn check_scalar(expected: &Value, actual: &Value, path: &MatchPath) -> Result<(), MatchError> {
    if expected.is_number() && actual.is_number() {
        if numbers_equal(expected, actual) {
            return Ok(());
        }
        return Err(MatchError::mismatch(
            path,
            expected,
            Some(actual),
            "values differ",
        ));
    }
    if expected.type_name() != actual.type_name() {
        return Err(MatchError::mismatch(
            path,
            expected,
            Some(actual),
            format!(
                "expected type {}, found {}",
                expected.type_name(),
                actual.type_name()
            ),
        ));
    }
    if expected == actual {
        Ok(())
    } else {
        Err(MatchError::mismatch(
            path,
            expected,
            Some(actual),
            "values differ",
        ))
    }
}

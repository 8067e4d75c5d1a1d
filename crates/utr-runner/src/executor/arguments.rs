//! Typed access to operation arguments.
//!
//! Handlers take each argument they understand out of an [`Arguments`] and
//! call [`Arguments::finish`] before touching the client, so an unknown or
//! misspelt argument is reported instead of silently ignored.

use utr_model::{Document, Value};

use crate::error::SpecificationError;

/// Remaining arguments of one operation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arguments {
    operation: String,
    values: Document,
}

impl Arguments {
    pub(crate) fn new(operation: &str, values: Option<Document>) -> Self {
        Self {
            operation: operation.to_owned(),
            values: values.unwrap_or_default(),
        }
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> SpecificationError {
        SpecificationError::invalid_argument(self.operation.as_str(), message)
    }

    /// Takes an optional argument.
    pub(crate) fn take(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Takes a required argument.
    pub(crate) fn required(&mut self, name: &str) -> Result<Value, SpecificationError> {
        self.take(name)
            .ok_or_else(|| self.invalid(format!("missing required argument '{name}'")))
    }

    pub(crate) fn document(&mut self, name: &str) -> Result<Document, SpecificationError> {
        let value = self.required(name)?;
        self.expect_document(name, value)
    }

    /// An optional document argument; absent means empty.
    pub(crate) fn document_or_empty(&mut self, name: &str) -> Result<Document, SpecificationError> {
        Ok(self.optional_document(name)?.unwrap_or_default())
    }

    pub(crate) fn optional_document(
        &mut self,
        name: &str,
    ) -> Result<Option<Document>, SpecificationError> {
        self.take(name)
            .map(|value| self.expect_document(name, value))
            .transpose()
    }

    fn expect_document(&self, name: &str, value: Value) -> Result<Document, SpecificationError> {
        match value {
            Value::Document(document) => Ok(document),
            other => Err(self.wrong_type(name, "a document", &other)),
        }
    }

    pub(crate) fn string(&mut self, name: &str) -> Result<String, SpecificationError> {
        match self.required(name)? {
            Value::String(text) => Ok(text),
            other => Err(self.wrong_type(name, "a string", &other)),
        }
    }

    pub(crate) fn optional_bool(&mut self, name: &str) -> Result<Option<bool>, SpecificationError> {
        self.take(name)
            .map(|value| {
                value
                    .as_bool()
                    .ok_or_else(|| self.wrong_type(name, "a boolean", &value))
            })
            .transpose()
    }

    pub(crate) fn optional_i64(&mut self, name: &str) -> Result<Option<i64>, SpecificationError> {
        self.take(name)
            .map(|value| {
                value
                    .as_i64()
                    .ok_or_else(|| self.wrong_type(name, "an integer", &value))
            })
            .transpose()
    }

    pub(crate) fn i64(&mut self, name: &str) -> Result<i64, SpecificationError> {
        self.optional_i64(name)?
            .ok_or_else(|| self.invalid(format!("missing required argument '{name}'")))
    }

    pub(crate) fn array(&mut self, name: &str) -> Result<Vec<Value>, SpecificationError> {
        match self.required(name)? {
            Value::Array(items) => Ok(items),
            other => Err(self.wrong_type(name, "an array", &other)),
        }
    }

    pub(crate) fn documents(&mut self, name: &str) -> Result<Vec<Document>, SpecificationError> {
        self.array(name)?
            .into_iter()
            .map(|item| self.expect_document(name, item))
            .collect()
    }

    /// Takes a `{"$$hexBytes": "..."}` argument and decodes it.
    pub(crate) fn hex_bytes(&mut self, name: &str) -> Result<Vec<u8>, SpecificationError> {
        let source = self.document(name)?;
        let text = source
            .get_str("$$hexBytes")
            .filter(|_| source.len() == 1)
            .ok_or_else(|| self.invalid(format!("'{name}' must be {{\"$$hexBytes\": <hex>}}")))?;
        hex::decode(text).map_err(|error| self.invalid(format!("'{name}' is not hex: {error}")))
    }

    /// Fails when an argument was not consumed.
    pub(crate) fn finish(&self) -> Result<(), SpecificationError> {
        let unknown: Vec<&str> = self.values.keys().collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(self.invalid(format!("unsupported arguments: {}", unknown.join(", "))))
        }
    }

    fn wrong_type(&self, name: &str, expected: &str, actual: &Value) -> SpecificationError {
        self.invalid(format!(
            "'{name}' must be {expected}, got {}",
            actual.type_name()
        ))
    }
}

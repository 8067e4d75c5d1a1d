//! Conversion between Extended JSON and [`Value`].
//!
//! Parsing accepts both canonical and relaxed Extended JSON. Rendering uses
//! the relaxed form so reports stay readable: plain numbers for finite
//! numerics and type wrappers only where JSON has no native representation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};
use thiserror::Error;

use crate::value::{Binary, Decimal128, Document, ObjectId, Value};

/// Errors raised when a JSON value is not valid Extended JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtJsonError {
    /// A type wrapper such as `$numberLong` carried an unusable payload.
    #[error("invalid {wrapper} payload: {message}")]
    InvalidWrapper {
        /// Wrapper key, for example `$numberLong`.
        wrapper: String,
        /// Description of the problem.
        message: String,
    },
    /// A document was required but another JSON type was found.
    #[error("expected a JSON object, found {found}")]
    ExpectedObject {
        /// JSON type that was found instead.
        found: &'static str,
    },
}

impl ExtJsonError {
    fn invalid(wrapper: &str, message: impl Into<String>) -> Self {
        Self::InvalidWrapper {
            wrapper: wrapper.to_owned(),
            message: message.into(),
        }
    }
}

/// Parses an Extended JSON value.
///
/// # Errors
///
/// Returns [`ExtJsonError`] when a type wrapper carries a malformed payload.
pub fn from_json(json: &serde_json::Value) -> Result<Value, ExtJsonError> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(flag) => Ok(Value::Bool(*flag)),
        serde_json::Value::Number(number) => Ok(number_to_value(number)),
        serde_json::Value::String(text) => Ok(Value::String(text.clone())),
        serde_json::Value::Array(items) => items
            .iter()
            .map(from_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_json::Value::Object(map) => object_to_value(map),
    }
}

/// Parses an Extended JSON object into a [`Document`].
///
/// # Errors
///
/// Returns [`ExtJsonError::ExpectedObject`] when the JSON value is not an
/// object, or when the object is a type wrapper rather than a document.
pub fn document_from_json(json: &serde_json::Value) -> Result<Document, ExtJsonError> {
    match from_json(json)? {
        Value::Document(document) => Ok(document),
        other => Err(ExtJsonError::ExpectedObject {
            found: other.type_name(),
        }),
    }
}

fn number_to_value(number: &Number) -> Value {
    if let Some(integer) = number.as_i64() {
        return i32::try_from(integer).map_or(Value::Int64(integer), Value::Int32);
    }
    Value::Double(number.as_f64().unwrap_or(f64::NAN))
}

fn object_to_value(map: &Map<String, serde_json::Value>) -> Result<Value, ExtJsonError> {
    if map.len() == 1
        && let Some((key, payload)) = map.iter().next()
        && let Some(value) = parse_wrapper(key, payload)?
    {
        return Ok(value);
    }

    let mut document = Document::new();
    for (key, item) in map {
        document.insert(key.clone(), from_json(item)?);
    }
    Ok(Value::Document(document))
}

fn parse_wrapper(key: &str, payload: &serde_json::Value) -> Result<Option<Value>, ExtJsonError> {
    let value = match key {
        "$numberInt" => {
            let text = wrapper_text(key, payload)?;
            let parsed = text
                .parse::<i32>()
                .map_err(|error| ExtJsonError::invalid(key, error.to_string()))?;
            Value::Int32(parsed)
        }
        "$numberLong" => {
            let text = wrapper_text(key, payload)?;
            let parsed = text
                .parse::<i64>()
                .map_err(|error| ExtJsonError::invalid(key, error.to_string()))?;
            Value::Int64(parsed)
        }
        "$numberDouble" => Value::Double(parse_double(wrapper_text(key, payload)?)?),
        "$numberDecimal" => Value::Decimal128(Decimal128::new(wrapper_text(key, payload)?)),
        "$oid" => {
            let text = wrapper_text(key, payload)?;
            let id = ObjectId::parse_str(text)
                .map_err(|error| ExtJsonError::invalid(key, error.to_string()))?;
            Value::ObjectId(id)
        }
        "$binary" => Value::Binary(parse_binary(payload)?),
        "$date" => Value::DateTime(parse_date(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn wrapper_text<'a>(key: &str, payload: &'a serde_json::Value) -> Result<&'a str, ExtJsonError> {
    payload
        .as_str()
        .ok_or_else(|| ExtJsonError::invalid(key, "expected a string payload"))
}

fn parse_double(text: &str) -> Result<f64, ExtJsonError> {
    match text {
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other
            .parse::<f64>()
            .map_err(|error| ExtJsonError::invalid("$numberDouble", error.to_string())),
    }
}

fn parse_binary(payload: &serde_json::Value) -> Result<Binary, ExtJsonError> {
    const KEY: &str = "$binary";
    let fields = payload
        .as_object()
        .ok_or_else(|| ExtJsonError::invalid(KEY, "expected an object payload"))?;
    let encoded = fields
        .get("base64")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ExtJsonError::invalid(KEY, "missing base64 field"))?;
    let subtype_text = fields
        .get("subType")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ExtJsonError::invalid(KEY, "missing subType field"))?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|error| ExtJsonError::invalid(KEY, error.to_string()))?;
    let subtype = u8::from_str_radix(subtype_text, 16)
        .map_err(|error| ExtJsonError::invalid(KEY, error.to_string()))?;
    Ok(Binary::new(subtype, bytes))
}

fn parse_date(payload: &serde_json::Value) -> Result<i64, ExtJsonError> {
    const KEY: &str = "$date";
    if let Some(millis) = payload.as_i64() {
        return Ok(millis);
    }
    let text = payload
        .as_object()
        .and_then(|fields| fields.get("$numberLong"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ExtJsonError::invalid(KEY, "expected an integer or $numberLong"))?;
    text.parse::<i64>()
        .map_err(|error| ExtJsonError::invalid(KEY, error.to_string()))
}

/// Renders a value as relaxed Extended JSON.
#[must_use]
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(flag) => serde_json::Value::Bool(*flag),
        Value::Int32(number) => serde_json::Value::from(*number),
        Value::Int64(number) => serde_json::Value::from(*number),
        Value::Double(number) => Number::from_f64(*number).map_or_else(
            || wrapper("$numberDouble", serde_json::Value::String(non_finite(*number))),
            serde_json::Value::Number,
        ),
        Value::Decimal128(decimal) => wrapper(
            "$numberDecimal",
            serde_json::Value::String(decimal.as_str().to_owned()),
        ),
        Value::String(text) => serde_json::Value::String(text.clone()),
        Value::Binary(binary) => {
            let mut fields = Map::new();
            fields.insert(
                "base64".to_owned(),
                serde_json::Value::String(BASE64.encode(&binary.bytes)),
            );
            fields.insert(
                "subType".to_owned(),
                serde_json::Value::String(format!("{:02x}", binary.subtype)),
            );
            wrapper("$binary", serde_json::Value::Object(fields))
        }
        Value::ObjectId(id) => wrapper("$oid", serde_json::Value::String(id.to_hex())),
        Value::DateTime(millis) => wrapper(
            "$date",
            wrapper("$numberLong", serde_json::Value::String(millis.to_string())),
        ),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Document(document) => document_to_json(document),
    }
}

/// Renders a document as a relaxed Extended JSON object.
#[must_use]
pub fn document_to_json(document: &Document) -> serde_json::Value {
    let map = document
        .iter()
        .map(|(key, value)| (key.to_owned(), to_json(value)))
        .collect::<Map<_, _>>();
    serde_json::Value::Object(map)
}

fn wrapper(key: &str, payload: serde_json::Value) -> serde_json::Value {
    let mut map = Map::new();
    map.insert(key.to_owned(), payload);
    serde_json::Value::Object(map)
}

fn non_finite(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_owned()
    } else if number.is_sign_negative() {
        "-Infinity".to_owned()
    } else {
        "Infinity".to_owned()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        from_json(&json).map_err(de::Error::custom)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        document_to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        document_from_json(&json).map_err(de::Error::custom)
    }
}

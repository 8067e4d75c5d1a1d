//! Typed document values exchanged with the database client.
//!
//! Test files describe documents in Extended JSON, which distinguishes
//! numeric widths and carries binary and object-id payloads that plain JSON
//! cannot express. [`Value`] keeps those distinctions so the matcher can apply
//! numeric-type-aware rules and the `$$type` operator can inspect the declared
//! type of a value.

use std::fmt;

/// A dynamically typed document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// IEEE 754 double.
    Double(f64),
    /// 128-bit decimal, kept in its textual form.
    Decimal128(Decimal128),
    /// UTF-8 string.
    String(String),
    /// Binary payload with its subtype.
    Binary(Binary),
    /// 12-byte object identifier.
    ObjectId(ObjectId),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Embedded document.
    Document(Document),
}

impl Value {
    /// Returns the type tag understood by the `$$type` operator.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int",
            Self::Int64(_) => "long",
            Self::Double(_) => "double",
            Self::Decimal128(_) => "decimal",
            Self::String(_) => "string",
            Self::Binary(_) => "binData",
            Self::ObjectId(_) => "objectId",
            Self::DateTime(_) => "date",
            Self::Array(_) => "array",
            Self::Document(_) => "object",
        }
    }

    /// Whether the value is one of the numeric variants.
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(
            self,
            Self::Int32(_) | Self::Int64(_) | Self::Double(_) | Self::Decimal128(_)
        )
    }

    /// Returns the value as an `i64` when it is an integer, or a double with
    /// no fractional part that fits the range.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(value) => Some(i64::from(*value)),
            Self::Int64(value) => Some(*value),
            Self::Double(value) => integral_f64_to_i64(*value),
            _ => None,
        }
    }

    /// Returns the value as an `f64` for any numeric variant.
    ///
    /// Large `Int64` values lose precision; callers that need exact ordering
    /// should compare integers directly.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(value) => Some(approximate_i64(*value)),
            Self::Int32(value) => Some(f64::from(*value)),
            Self::Double(value) => Some(*value),
            Self::Decimal128(value) => value.to_f64(),
            _ => None,
        }
    }

    /// Returns the string payload when the value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the boolean payload when the value is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the embedded document when the value is a document.
    #[must_use]
    pub const fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(document) => Some(document),
            _ => None,
        }
    }

    /// Returns the elements when the value is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Returns the binary payload when the value is binary.
    #[must_use]
    pub const fn as_binary(&self) -> Option<&Binary> {
        match self {
            Self::Binary(binary) => Some(binary),
            _ => None,
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "approximate view used only for mixed-type comparisons"
)]
const fn approximate_i64(value: i64) -> f64 {
    value as f64
}

fn integral_f64_to_i64(value: f64) -> Option<i64> {
    // i64::MAX is not representable as f64; the exclusive bound is 2^63.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.fract() != 0.0 || !value.is_finite() || value >= LIMIT || value < -LIMIT {
        return None;
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "range and integrality are checked above"
    )]
    let integral = value as i64;
    Some(integral)
}

impl fmt::Display for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = crate::extjson::to_json(self);
        write!(formatter, "{json}")
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Self::Document(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::ObjectId(value)
    }
}

impl From<Binary> for Value {
    fn from(value: Binary) -> Self {
        Self::Binary(value)
    }
}

/// Decimal128 value in its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal128(String);

impl Decimal128 {
    /// Wraps the textual representation of a decimal.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the textual representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Approximates the decimal as a double.
    ///
    /// Returns `None` for text that does not parse as a number.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        match self.0.as_str() {
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            "NaN" => Some(f64::NAN),
            text => text.parse().ok(),
        }
    }
}

/// Binary payload tagged with its subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    /// Binary subtype (`0x04` marks a UUID).
    pub subtype: u8,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

impl Binary {
    /// Subtype used for generic binary data.
    pub const GENERIC: u8 = 0x00;
    /// Subtype used for UUIDs, including session identifiers.
    pub const UUID: u8 = 0x04;

    /// Builds a binary value.
    #[must_use]
    pub const fn new(subtype: u8, bytes: Vec<u8>) -> Self {
        Self { subtype, bytes }
    }
}

/// 12-byte object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Builds an identifier from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parses a 24-character hexadecimal identifier.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not 24 hexadecimal characters.
    pub fn parse_str(text: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0_u8; 12];
        hex::decode_to_slice(text, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Lowercase hexadecimal representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_hex())
    }
}

/// Ordered mapping from keys to values.
///
/// Insertion order is preserved because command documents depend on it: the
/// first key names the command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks a key up.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Looks a key up for mutation.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Whether the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces a key, keeping the original position on replace.
    ///
    /// Returns the previous value when the key already existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = key.into();
        let entry = value.into();
        match self.get_mut(&name) {
            Some(slot) => Some(std::mem::replace(slot, entry)),
            None => {
                self.entries.push((name, entry));
                None
            }
        }
    }

    /// Inserts a key in front of all others, replacing any existing entry.
    pub fn insert_first(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let name = key.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.insert(0, (name, value.into()));
    }

    /// Removes a key and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let position = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(position).1)
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the first entry, which names the command in command documents.
    #[must_use]
    pub fn first(&self) -> Option<(&str, &Value)> {
        self.entries
            .first()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Looks up a string-valued key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Looks up a document-valued key.
    #[must_use]
    pub fn get_document(&self, key: &str) -> Option<&Self> {
        self.get(key).and_then(Value::as_document)
    }

    /// Looks up an array-valued key.
    #[must_use]
    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_array)
    }

    /// Looks up a boolean-valued key.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Looks up an integral numeric key.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Resolves a dotted path such as `cursor.firstBatch`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = match current {
                Value::Document(document) => document.get(segment)?,
                Value::Array(values) => values.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut document = Self::new();
        for (key, value) in iter {
            document.insert(key, value);
        }
        document
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = crate::extjson::document_to_json(self);
        write!(formatter, "{json}")
    }
}

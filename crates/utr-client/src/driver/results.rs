//! Results of collection write operations.

use utr_model::{Document, Value};

/// Result of `insertOne`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    /// `_id` of the inserted document.
    pub inserted_id: Value,
}

impl InsertOneResult {
    /// Renders the result as `{insertedId}`.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("insertedId", self.inserted_id.clone());
        document
    }
}

/// Result of `insertMany`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyResult {
    /// `_id` of each inserted document, keyed by its position in the request.
    pub inserted_ids: Vec<(usize, Value)>,
}

impl InsertManyResult {
    /// Renders the result as `{insertedIds: {"0": id, ...}}`.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let ids = self
            .inserted_ids
            .iter()
            .map(|(index, id)| (index.to_string(), id.clone()))
            .collect::<Document>();
        let mut document = Document::new();
        document.insert("insertedIds", ids);
        document
    }
}

/// Result of `updateOne`, `updateMany` and `replaceOne`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Documents matching the filter.
    pub matched_count: i64,
    /// Documents actually changed.
    pub modified_count: i64,
    /// Documents created by an upsert.
    pub upserted_count: i64,
    /// `_id` of the upserted document.
    pub upserted_id: Option<Value>,
}

impl UpdateResult {
    /// Renders the result with the counts as longs.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("matchedCount", self.matched_count);
        document.insert("modifiedCount", self.modified_count);
        document.insert("upsertedCount", self.upserted_count);
        if let Some(id) = &self.upserted_id {
            document.insert("upsertedId", id.clone());
        }
        document
    }
}

/// Result of `deleteOne` and `deleteMany`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Documents removed.
    pub deleted_count: i64,
}

impl DeleteResult {
    /// Renders the result as `{deletedCount}`.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("deletedCount", self.deleted_count);
        document
    }
}

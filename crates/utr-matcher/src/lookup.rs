//! Access to runtime entities from inside match expressions.

use utr_model::{Document, Value};

/// Resolves entity references made by operators such as `$$matchesEntity`.
pub trait EntityLookup {
    /// Value of a saved or registered entity, if one is bound to `id`.
    fn entity_value(&self, id: &str) -> Option<Value>;

    /// Logical session identifier of the session entity bound to `id`.
    fn session_lsid(&self, id: &str) -> Option<Document>;
}

/// Lookup with no entities, for matching outside a test run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEntities;

impl EntityLookup for NoEntities {
    fn entity_value(&self, _id: &str) -> Option<Value> {
        None
    }

    fn session_lsid(&self, _id: &str) -> Option<Document> {
        None
    }
}

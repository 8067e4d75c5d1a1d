//! Value matching for the unified test format.
//!
//! The matcher compares actual results and events against expected values
//! written in the test file's match language: literals and nested mappings
//! or sequences, plus special operator objects such as `{"$$lte": 2}` whose
//! single key starts with `$$`. Operators live in an [`OperatorTable`]; new
//! ones are registered without touching the comparator.
//!
//! Mappings are permissive by default (extra actual keys are ignored),
//! sequences are compared in order with equal length, and `Int32`, `Int64`
//! and `Double` values compare by mathematical value.

mod error;
mod lookup;
mod matcher;
mod numeric;
mod operators;
mod path;

pub use error::{MatchError, Mismatch};
pub use lookup::{EntityLookup, NoEntities};
pub use matcher::{MappingMode, Matcher, OperatorCall, OperatorFn, OperatorTable, special_operator};
pub use numeric::{compare_numbers, numbers_equal};
pub use path::MatchPath;

#[cfg(test)]
mod tests;

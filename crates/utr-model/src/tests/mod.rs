//! Unit tests for `utr_model` types.

mod extjson_tests;

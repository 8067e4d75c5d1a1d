//! Collection operations and their result shapes.

use utr_client::CommandOptions;
use utr_client::driver::{Collection, FindOptions};
use utr_model::{Document, Value};

use super::arguments::Arguments;
use super::{HandlerResult, OperationOutcome, RoutingTable};
use crate::error::CaseFailure;

type CollectionHandler = fn(&Collection, &mut Arguments, &CommandOptions) -> HandlerResult;

pub(crate) const OPERATIONS: RoutingTable<CollectionHandler> = RoutingTable {
    object: "collection",
    operations: &[
        ("insertOne", insert_one),
        ("insertMany", insert_many),
        ("find", find),
        ("countDocuments", count_documents),
        ("estimatedDocumentCount", estimated_document_count),
        ("distinct", distinct),
        ("aggregate", aggregate),
        ("updateOne", update_one),
        ("updateMany", update_many),
        ("replaceOne", replace_one),
        ("deleteOne", delete_one),
        ("deleteMany", delete_many),
        ("drop", drop_collection),
    ],
};

fn documents(items: Vec<Document>) -> Value {
    Value::Array(items.into_iter().map(Value::Document).collect())
}

fn insert_one(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let document = arguments.document("document")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.insert_one(document, options),
        |result| result.to_document().into(),
    ))
}

fn insert_many(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let items = arguments.documents("documents")?;
    let ordered = arguments.optional_bool("ordered")?.unwrap_or(true);
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.insert_many(items, ordered, options),
        |result| result.to_document().into(),
    ))
}

fn find(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let find = FindOptions {
        filter: arguments.document_or_empty("filter")?,
        sort: arguments.optional_document("sort")?,
        skip: arguments.optional_i64("skip")?,
        limit: arguments.optional_i64("limit")?,
        projection: arguments.optional_document("projection")?,
        batch_size: arguments.optional_i64("batchSize")?,
    };
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.find(&find, options),
        documents,
    ))
}

fn count_documents(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let filter = arguments.document_or_empty("filter")?;
    let skip = arguments.optional_i64("skip")?;
    let limit = arguments.optional_i64("limit")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.count_documents(filter, skip, limit, options),
        Value::Int64,
    ))
}

fn estimated_document_count(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.estimated_document_count(options),
        Value::Int64,
    ))
}

fn distinct(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let field_name = arguments.string("fieldName")?;
    let filter = arguments.document_or_empty("filter")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.distinct(&field_name, filter, options),
        Value::Array,
    ))
}

fn aggregate(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let pipeline = arguments.array("pipeline")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.aggregate(pipeline, options),
        documents,
    ))
}

/// Filter, update document and `upsert` flag shared by the update family.
fn update_arguments(
    arguments: &mut Arguments,
    update_key: &str,
) -> Result<(Document, Document, bool), CaseFailure> {
    let filter = arguments.document("filter")?;
    let update = arguments.document(update_key)?;
    let upsert = arguments.optional_bool("upsert")?.unwrap_or(false);
    arguments.finish()?;
    Ok((filter, update, upsert))
}

fn update_one(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let (filter, update, upsert) = update_arguments(arguments, "update")?;
    Ok(OperationOutcome::from_result(
        collection.update_one(filter, update, upsert, options),
        |result| result.to_document().into(),
    ))
}

fn update_many(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let (filter, update, upsert) = update_arguments(arguments, "update")?;
    Ok(OperationOutcome::from_result(
        collection.update_many(filter, update, upsert, options),
        |result| result.to_document().into(),
    ))
}

fn replace_one(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let (filter, replacement, upsert) = update_arguments(arguments, "replacement")?;
    Ok(OperationOutcome::from_result(
        collection.replace_one(filter, replacement, upsert, options),
        |result| result.to_document().into(),
    ))
}

fn delete_one(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let filter = arguments.document("filter")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.delete_one(filter, options),
        |result| result.to_document().into(),
    ))
}

fn delete_many(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    let filter = arguments.document("filter")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        collection.delete_many(filter, options),
        |result| result.to_document().into(),
    ))
}

fn drop_collection(
    collection: &Collection,
    arguments: &mut Arguments,
    options: &CommandOptions,
) -> HandlerResult {
    arguments.finish()?;
    Ok(OperationOutcome::from_unit(collection.drop(options)))
}

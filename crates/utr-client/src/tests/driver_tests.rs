//! Tests for the collection, database and bucket operations.

use rstest::{fixture, rstest};
use serde_json::json;
use utr_model::{BucketOptions, Document, Value};

use super::doc;
use crate::codes::DUPLICATE_KEY;
use crate::driver::{Collection, Database, FindOptions, list_database_names};
use crate::memory::MemoryClientFactory;
use crate::{ClientFactory, ClientOptions, CommandOptions};

#[fixture]
fn database() -> Database {
    let client = MemoryClientFactory::default()
        .connect(&ClientOptions::new("memory://"))
        .expect("memory client");
    Database::new(client, "test")
}

#[fixture]
fn collection(database: Database) -> Collection {
    let collection = database.collection("coll");
    collection
        .insert_many(
            vec![
                doc(json!({"_id": 1, "x": 11})),
                doc(json!({"_id": 2, "x": 22})),
                doc(json!({"_id": 3, "x": 33})),
            ],
            true,
            &CommandOptions::default(),
        )
        .expect("seed documents");
    collection
}

fn none() -> CommandOptions {
    CommandOptions::default()
}

#[rstest]
fn insert_one_reports_the_inserted_id(database: Database) {
    let collection = database.collection("fresh");
    let result = collection
        .insert_one(doc(json!({"_id": 7, "x": 1})), &none())
        .expect("insert");
    assert_eq!(result.to_document(), doc(json!({"insertedId": 7})));
}

#[rstest]
fn insert_one_generates_missing_ids(database: Database) {
    let collection = database.collection("fresh");
    let result = collection
        .insert_one(doc(json!({"x": 1})), &none())
        .expect("insert");
    assert_eq!(result.inserted_id.type_name(), "objectId");
}

#[rstest]
fn insert_many_failure_carries_the_ids_inserted_before_it(collection: Collection) {
    let error = collection
        .insert_many(
            vec![doc(json!({"_id": 4})), doc(json!({"_id": 1})), doc(json!({"_id": 5}))],
            true,
            &none(),
        )
        .expect_err("duplicate key");
    assert_eq!(error.code(), Some(DUPLICATE_KEY));
    assert_eq!(
        error.partial_result(),
        Some(&doc(json!({"insertedIds": {"0": 4}})))
    );
}

#[rstest]
fn find_applies_filter_sort_and_limit(collection: Collection) {
    let find = FindOptions {
        filter: doc(json!({"x": {"$gt": 11}})),
        sort: Some(doc(json!({"x": -1}))),
        limit: Some(1),
        ..FindOptions::default()
    };
    let found = collection.find(&find, &none()).expect("find");
    assert_eq!(found, vec![doc(json!({"_id": 3, "x": 33}))]);
}

#[rstest]
fn find_reads_past_the_first_batch(collection: Collection) {
    let find = FindOptions {
        batch_size: Some(1),
        ..FindOptions::default()
    };
    let found = collection.find(&find, &none()).expect("find");
    assert_eq!(found.len(), 3);
}

#[rstest]
fn counts_agree(collection: Collection) {
    let matching = collection
        .count_documents(doc(json!({"x": {"$gte": 22}})), None, None, &none())
        .expect("count");
    assert_eq!(matching, 2);
    let total = collection
        .estimated_document_count(&none())
        .expect("estimate");
    assert_eq!(total, 3);
    let nothing = collection
        .count_documents(doc(json!({"x": 0})), None, None, &none())
        .expect("count");
    assert_eq!(nothing, 0);
}

#[rstest]
fn distinct_returns_each_value_once(collection: Collection) {
    let values = collection
        .distinct("x", Document::new(), &none())
        .expect("distinct");
    assert_eq!(values.len(), 3);
}

#[rstest]
fn update_one_reports_counts(collection: Collection) {
    let result = collection
        .update_one(doc(json!({"_id": 1})), doc(json!({"$inc": {"x": 1}})), false, &none())
        .expect("update");
    assert_eq!(
        result.to_document(),
        doc(json!({"matchedCount": {"$numberLong": "1"}, "modifiedCount": {"$numberLong": "1"}, "upsertedCount": {"$numberLong": "0"}}))
    );
}

#[rstest]
fn update_many_with_upsert_reports_the_new_id(collection: Collection) {
    let result = collection
        .update_many(doc(json!({"_id": 9})), doc(json!({"$set": {"x": 0}})), true, &none())
        .expect("upsert");
    assert_eq!(result.upserted_count, 1);
    assert_eq!(result.matched_count, 0);
    assert_eq!(result.upserted_id, Some(Value::Int32(9)));
}

#[rstest]
#[case::replacement_as_update(json!({"x": 1}))]
#[case::empty_update(json!({}))]
fn updates_require_operators(collection: Collection, #[case] update: serde_json::Value) {
    let error = collection
        .update_one(doc(json!({})), doc(update), false, &none())
        .expect_err("invalid update");
    assert!(error.is_client_error());
}

#[rstest]
fn replace_rejects_operators_and_replaces_documents(collection: Collection) {
    assert!(
        collection
            .replace_one(doc(json!({"_id": 1})), doc(json!({"$set": {"x": 1}})), false, &none())
            .is_err()
    );
    let result = collection
        .replace_one(doc(json!({"_id": 1})), doc(json!({"y": 1})), false, &none())
        .expect("replace");
    assert_eq!(result.modified_count, 1);
    let found = collection
        .find(
            &FindOptions {
                filter: doc(json!({"_id": 1})),
                ..FindOptions::default()
            },
            &none(),
        )
        .expect("find");
    assert_eq!(found, vec![doc(json!({"_id": 1, "y": 1}))]);
}

#[rstest]
fn deletes_report_counts(collection: Collection) {
    let one = collection
        .delete_one(doc(json!({"x": {"$gt": 0}})), &none())
        .expect("delete one");
    assert_eq!(one.deleted_count, 1);
    let many = collection
        .delete_many(Document::new(), &none())
        .expect("delete many");
    assert_eq!(many.deleted_count, 2);
}

#[rstest]
fn aggregate_runs_the_pipeline(collection: Collection) {
    let pipeline = vec![
        Value::Document(doc(json!({"$match": {"x": {"$lt": 30}}}))),
        Value::Document(doc(json!({"$project": {"_id": 0, "x": 1}}))),
    ];
    let output = collection.aggregate(pipeline, &none()).expect("aggregate");
    assert_eq!(output, vec![doc(json!({"x": 11})), doc(json!({"x": 22}))]);
}

#[rstest]
fn database_lists_creates_and_drops_collections(database: Database) {
    database
        .create_collection("a", &none())
        .expect("create");
    assert!(database.create_collection("a", &none()).is_err());
    assert_eq!(
        database.list_collection_names(&none()).expect("list"),
        vec!["a".to_owned()]
    );
    database.drop_collection("a", &none()).expect("drop");
    database
        .drop_collection("a", &none())
        .expect("dropping a missing collection succeeds");
    assert!(database.list_collection_names(&none()).expect("list").is_empty());
}

#[rstest]
fn database_names_are_listed(collection: Collection) {
    let client = collection.database().client().as_ref();
    let names = list_database_names(client, &none()).expect("list databases");
    assert_eq!(names, vec!["test".to_owned()]);
}

#[rstest]
fn bucket_round_trips_files_across_chunks(database: Database) {
    let bucket = database.bucket(&BucketOptions::default());
    let contents = b"abcdefghij".to_vec();
    let id = bucket
        .upload("letters", &contents, Some(4), &none())
        .expect("upload");
    let chunks = bucket
        .chunks()
        .count_documents(Document::new(), None, None, &none())
        .expect("count chunks");
    assert_eq!(chunks, 3);
    assert_eq!(bucket.download(&id, &none()).expect("download"), contents);

    bucket.delete(&id, &none()).expect("delete");
    let missing = bucket.download(&id, &none()).expect_err("deleted");
    assert!(missing.message().contains("FileNotFound"));
    assert!(bucket.delete(&id, &none()).is_err());
}

#[rstest]
fn bucket_detects_missing_chunks(database: Database) {
    let bucket = database.bucket(&BucketOptions {
        bucket_name: Some("media".to_owned()),
        chunk_size_bytes: Some(2),
    });
    let id = bucket
        .upload("pair", b"abcd", None, &none())
        .expect("upload");
    let mut filter = Document::new();
    filter.insert("files_id", id.clone());
    filter.insert("n", 1);
    bucket
        .chunks()
        .delete_one(filter, &none())
        .expect("remove chunk");
    let error = bucket.download(&id, &none()).expect_err("chunk missing");
    assert!(error.message().contains("ChunkIsMissing"));
    assert_eq!(bucket.files().name(), "media.files");
}

#[rstest]
fn empty_files_have_no_chunks(database: Database) {
    let bucket = database.bucket(&BucketOptions::default());
    let id = bucket.upload("empty", &[], None, &none()).expect("upload");
    assert_eq!(bucket.download(&id, &none()).expect("download"), Vec::<u8>::new());
}

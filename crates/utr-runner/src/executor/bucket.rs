//! File bucket operations.

use std::convert;

use utr_client::CommandOptions;
use utr_client::driver::Bucket;
use utr_model::{Binary, Value};

use super::arguments::Arguments;
use super::{HandlerResult, OperationOutcome, RoutingTable};

type BucketHandler = fn(&Bucket, &mut Arguments, &CommandOptions) -> HandlerResult;

pub(crate) const OPERATIONS: RoutingTable<BucketHandler> = RoutingTable {
    object: "bucket",
    operations: &[
        ("upload", upload),
        ("download", download),
        ("delete", delete),
    ],
};

fn upload(bucket: &Bucket, arguments: &mut Arguments, options: &CommandOptions) -> HandlerResult {
    let filename = arguments.string("filename")?;
    let contents = arguments.hex_bytes("source")?;
    let chunk_size = arguments
        .optional_i64("chunkSizeBytes")?
        .map(|size| {
            u32::try_from(size)
                .map_err(|_| arguments.invalid("'chunkSizeBytes' must fit in 32 bits"))
        })
        .transpose()?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        bucket.upload(&filename, &contents, chunk_size, options),
        convert::identity,
    ))
}

fn download(bucket: &Bucket, arguments: &mut Arguments, options: &CommandOptions) -> HandlerResult {
    let id = arguments.required("id")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_result(
        bucket.download(&id, options),
        |bytes| Value::Binary(Binary::new(Binary::GENERIC, bytes)),
    ))
}

fn delete(bucket: &Bucket, arguments: &mut Arguments, options: &CommandOptions) -> HandlerResult {
    let id = arguments.required("id")?;
    arguments.finish()?;
    Ok(OperationOutcome::from_unit(bucket.delete(&id, options)))
}

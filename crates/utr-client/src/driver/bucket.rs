//! Chunked file storage over a `.files` and a `.chunks` collection.

use utr_model::{Binary, BucketOptions, Document, Value};

use crate::client::CommandOptions;
use crate::driver::{Collection, Database, FindOptions};
use crate::error::ClientError;
use crate::ids::{new_object_id, now_millis};

/// A file bucket in a database.
///
/// Each file is one document in `<bucket>.files` and its contents are split
/// into fixed-size chunks in `<bucket>.chunks`, keyed by `files_id` and
/// chunk number `n`.
#[derive(Debug, Clone)]
pub struct Bucket {
    files: Collection,
    chunks: Collection,
    chunk_size: u32,
}

impl Bucket {
    /// Bucket with the given naming and chunking options.
    #[must_use]
    pub fn new(database: Database, options: &BucketOptions) -> Self {
        let name = options.bucket_name();
        Self {
            files: database.collection(format!("{name}.files")),
            chunks: database.collection(format!("{name}.chunks")),
            chunk_size: options.chunk_size_bytes(),
        }
    }

    /// Collection holding the file documents.
    #[must_use]
    pub const fn files(&self) -> &Collection {
        &self.files
    }

    /// Collection holding the chunks.
    #[must_use]
    pub const fn chunks(&self) -> &Collection {
        &self.chunks
    }

    /// Stores a file and returns its generated id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] for a zero chunk size, or the failure
    /// of either insert.
    pub fn upload(
        &self,
        filename: &str,
        contents: &[u8],
        chunk_size: Option<u32>,
        options: &CommandOptions,
    ) -> Result<Value, ClientError> {
        let size = chunk_size.unwrap_or(self.chunk_size);
        let step = usize::try_from(size)
            .ok()
            .filter(|step| *step > 0)
            .ok_or_else(|| ClientError::client("chunkSizeBytes must be positive"))?;
        let id = Value::ObjectId(new_object_id());

        let chunks: Vec<Document> = contents
            .chunks(step)
            .enumerate()
            .map(|(index, data)| {
                let mut chunk = Document::new();
                chunk.insert("_id", new_object_id());
                chunk.insert("files_id", id.clone());
                chunk.insert("n", i64::try_from(index).unwrap_or(i64::MAX));
                chunk.insert("data", Binary::new(Binary::GENERIC, data.to_vec()));
                chunk
            })
            .collect();
        if !chunks.is_empty() {
            self.chunks.insert_many(chunks, true, options)?;
        }

        let mut file = Document::new();
        file.insert("_id", id.clone());
        file.insert(
            "length",
            i64::try_from(contents.len()).unwrap_or(i64::MAX),
        );
        file.insert("chunkSize", i64::from(size));
        file.insert("uploadDate", Value::DateTime(now_millis()));
        file.insert("filename", filename);
        self.files.insert_one(file, options)?;
        Ok(id)
    }

    /// Reads a file's contents.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when the file does not exist or its
    /// chunks are missing or of the wrong size.
    pub fn download(&self, id: &Value, options: &CommandOptions) -> Result<Vec<u8>, ClientError> {
        let file = self
            .find_by("_id", id, None, options)?
            .into_iter()
            .next()
            .ok_or_else(|| file_not_found(id))?;
        let length = file
            .get_i64("length")
            .and_then(|length| u64::try_from(length).ok())
            .unwrap_or_default();
        let chunk_size = file
            .get_i64("chunkSize")
            .and_then(|size| u64::try_from(size).ok())
            .filter(|size| *size > 0)
            .ok_or_else(|| ClientError::client(format!("file {id} has no valid chunkSize")))?;
        let expected_chunks = length.div_ceil(chunk_size);

        let mut sort = Document::new();
        sort.insert("n", 1);
        let chunks = self.find_by("files_id", id, Some(sort), options)?;
        let mut contents = Vec::new();
        let mut expected_n = 0_u64;
        for chunk in &chunks {
            let n = chunk
                .get_i64("n")
                .and_then(|n| u64::try_from(n).ok());
            if n != Some(expected_n) {
                return Err(ClientError::client(format!(
                    "ChunkIsMissing: file {id} has no chunk {expected_n}"
                )));
            }
            let data = chunk
                .get("data")
                .and_then(Value::as_binary)
                .ok_or_else(|| ClientError::client(format!("chunk {expected_n} of {id} has no data")))?;
            contents.extend_from_slice(&data.bytes);
            expected_n += 1;
        }
        if expected_n != expected_chunks {
            return Err(ClientError::client(format!(
                "ChunkIsMissing: file {id} has {expected_n} chunks, expected {expected_chunks}"
            )));
        }
        if u64::try_from(contents.len()).ok() != Some(length) {
            return Err(ClientError::client(format!(
                "ChunkIsShort: file {id} holds {} bytes, expected {length}",
                contents.len()
            )));
        }
        Ok(contents)
    }

    /// Removes a file and its chunks.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Client`] when the file does not exist, after
    /// removing any orphaned chunks.
    pub fn delete(&self, id: &Value, options: &CommandOptions) -> Result<(), ClientError> {
        let deleted = self.files.delete_one(filter_on("_id", id), options)?;
        self.chunks.delete_many(filter_on("files_id", id), options)?;
        if deleted.deleted_count == 0 {
            return Err(file_not_found(id));
        }
        Ok(())
    }

    fn find_by(
        &self,
        field: &str,
        id: &Value,
        sort: Option<Document>,
        options: &CommandOptions,
    ) -> Result<Vec<Document>, ClientError> {
        let collection = if field == "_id" {
            &self.files
        } else {
            &self.chunks
        };
        let find = FindOptions {
            filter: filter_on(field, id),
            sort,
            ..FindOptions::default()
        };
        collection.find(&find, options)
    }
}

fn filter_on(field: &str, id: &Value) -> Document {
    let mut filter = Document::new();
    filter.insert(field, id.clone());
    filter
}

fn file_not_found(id: &Value) -> ClientError {
    ClientError::client(format!("FileNotFound: no file with id {id}"))
}

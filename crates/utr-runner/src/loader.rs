//! Reading test files from disk.

use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use utr_model::TestFile;

use crate::error::SpecificationError;

/// Reads and parses one test file.
///
/// # Errors
///
/// Returns [`SpecificationError::Read`] when the file cannot be read and
/// [`SpecificationError::Parse`] when it is not a valid test file.
pub fn load_test_file(path: &Utf8Path) -> Result<TestFile, SpecificationError> {
    let text = fs::read_to_string(path).map_err(|source| SpecificationError::Read {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })?;
    TestFile::from_json_str(&text).map_err(|source| SpecificationError::Parse {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}

/// Expands directories into the `.json` files they contain, sorted by name.
///
/// Plain file paths are kept as given, in order. Directories are not
/// searched recursively.
///
/// # Errors
///
/// Returns [`SpecificationError::Read`] when a directory cannot be listed.
pub fn collect_test_files(paths: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>, SpecificationError> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let read_failed = |source| SpecificationError::Read {
            path: path.clone(),
            source: Arc::new(source),
        };
        let mut found = Vec::new();
        for listed in path.read_dir_utf8().map_err(read_failed)? {
            let entry = listed.map_err(read_failed)?;
            let candidate = entry.path();
            if candidate.extension() == Some("json") && candidate.is_file() {
                found.push(candidate.to_path_buf());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

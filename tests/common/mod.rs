#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tabular_qa::dataset::Dataset;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes an extracted document whose table is `records`.
    pub fn write_document(&self, name: &str, records: Value) -> PathBuf {
        self.write(name, &document(records).to_string())
    }
}

/// Wraps `records` the way the document extractor stores tables.
pub fn document(records: Value) -> Value {
    json!({
        "pageContent": "",
        "metadata": { "structuredData": { "data": records } }
    })
}

pub fn dataset(records: Value) -> Dataset {
    Dataset::from_records(records.as_array().expect("records array")).expect("rectangular rows")
}

pub fn scores() -> Value {
    json!([
        {"year": 2020, "score": 10},
        {"year": 2021, "score": 20},
        {"year": 2022, "score": 30}
    ])
}

pub fn race_results() -> Value {
    json!([
        {"Year": 2023, "finish_time": "1:58:30"},
        {"Year": 2023, "finish_time": "2:01:15"}
    ])
}

//! Directory-backed document store used by the `query` command.
//!
//! Documents are matched to logical table names by file name and loaded into
//! [`Dataset`]s with normalized column names.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::debug;

use crate::{
    dataset::{self, Dataset},
    io_utils,
};

pub const DEFAULT_DOCUMENTS_DIR: &str = "storage/documents/custom-documents";

pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Finds the file backing `table_name`. A file matches when its name is
    /// the document id (optionally with `.csv`), starts with the document id,
    /// or is the table name (optionally with `.csv`). Names are checked in
    /// sorted order.
    pub fn locate(&self, table_name: &str, doc_id: &str) -> Result<PathBuf> {
        let mut names = fs::read_dir(&self.root)
            .with_context(|| format!("Listing documents in {:?}", self.root))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect::<Vec<_>>();
        names.sort();
        debug!("Looking for doc_id '{doc_id}' or table '{table_name}' among {names:?}");
        names
            .into_iter()
            .find(|name| file_matches(name, table_name, doc_id))
            .map(|name| self.root.join(name))
            .ok_or_else(|| {
                anyhow!("Document not found for table '{table_name}' (doc_id: {doc_id})")
            })
    }

    /// Loads the table behind `doc_id` and normalizes its column names.
    pub fn load_table(&self, table_name: &str, doc_id: &str) -> Result<Dataset> {
        let path = self.locate(table_name, doc_id)?;
        debug!("Found file for table '{table_name}' at {path:?}");
        let mut dataset = load_document(&path).with_context(|| {
            format!("Failed to load or parse data for table '{table_name}'")
        })?;
        dataset.rename_columns(normalize_column_name);
        debug!(
            "Table '{table_name}' has {} row(s), columns {:?}",
            dataset.len(),
            dataset.columns()
        );
        Ok(dataset)
    }
}

fn file_matches(name: &str, table_name: &str, doc_id: &str) -> bool {
    (!doc_id.is_empty()
        && (name == doc_id || name == format!("{doc_id}.csv") || name.starts_with(doc_id)))
        || name == table_name
        || name == format!("{table_name}.csv")
}

/// Reads a stored document. JSON documents use `structuredData.data` when
/// present and fall back to the `Row ...` lines of `pageContent`; `.csv` and
/// `.tsv` files are read as delimited text.
fn load_document(path: &Path) -> Result<Dataset> {
    if io_utils::is_delimited_text(path) {
        return Ok(dataset::load_dataset(path, None, encoding_rs::UTF_8)?);
    }
    let doc = io_utils::read_json(path)?;
    if doc.pointer("/metadata/structuredData/data").is_some() {
        debug!("Using structuredData.data from {path:?}");
        return Ok(Dataset::from_document(&doc)?);
    }
    debug!("Falling back to pageContent parsing for {path:?}");
    let content = doc
        .get("pageContent")
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    Ok(Dataset::from_page_content(content))
}

/// Trims, lowercases and replaces spaces with underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

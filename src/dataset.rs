//! In-memory tabular dataset and the value coercions used by the resolver.
//!
//! A [`Dataset`] is built from an array of JSON row records (the
//! `metadata.structuredData.data` payload of an extracted document), from the
//! `Row ...` lines of a document's `pageContent`, or from a CSV file. Columns
//! are the union of keys across rows in first-seen order; cells a row does not
//! define are `Null`, so the row matrix is always rectangular.
//!
//! Cells keep their original JSON type. Coercion into numbers, years, or text
//! happens on demand through [`to_number`], [`to_year`], and [`cell_text`].

use std::path::Path;

use encoding_rs::Encoding;
use serde_json::{Map, Value};

use crate::{error::AnswerError, io_utils};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, AnswerError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(AnswerError::malformed(format!(
                "Row {} has {} value(s) but {} column(s) are defined",
                idx + 1,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Builds a dataset from JSON row records. Every record must be an object.
    pub fn from_records(records: &[Value]) -> Result<Self, AnswerError> {
        let mut objects = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                AnswerError::malformed(format!(
                    "Row {} is not a key/value record (found {})",
                    idx + 1,
                    json_type_name(record)
                ))
            })?;
            objects.push(object);
        }
        Ok(Self::from_objects(&objects))
    }

    fn from_objects(objects: &[&Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for object in objects {
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = objects
            .iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|column| object.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Extracts `metadata.structuredData.data` from a parsed document.
    pub fn from_document(doc: &Value) -> Result<Self, AnswerError> {
        let records = doc
            .pointer("/metadata/structuredData/data")
            .ok_or_else(|| AnswerError::malformed("No structuredData.data found in JSON file."))?;
        let records = records.as_array().ok_or_else(|| {
            AnswerError::malformed(format!(
                "structuredData.data must be an array of records (found {})",
                json_type_name(records)
            ))
        })?;
        Self::from_records(records)
    }

    /// Parses `Row N, key: value, key: value` lines from free document text.
    /// Lines that do not start with `Row ` are ignored.
    pub fn from_page_content(content: &str) -> Self {
        let mut records = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if !line.starts_with("Row ") {
                continue;
            }
            let mut record = Map::new();
            for part in line.split(", ") {
                if let Some((key, value)) = part.split_once(": ") {
                    record.insert(
                        key.trim().to_string(),
                        Value::String(value.trim().to_string()),
                    );
                }
            }
            if !record.is_empty() {
                records.push(record);
            }
        }
        let objects = records.iter().collect::<Vec<_>>();
        Self::from_objects(&objects)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of the column at `index`, in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Copies the rows accepted by `keep`, preserving their relative order.
    pub fn select_rows<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&[Value]) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row))
                .cloned()
                .collect(),
        }
    }

    pub fn rename_columns<F>(&mut self, rename: F)
    where
        F: Fn(&str) -> String,
    {
        for column in &mut self.columns {
            *column = rename(column);
        }
    }

    /// Rows as JSON objects, limited to the first `limit` rows when given.
    pub fn to_records(&self, limit: Option<usize>) -> Vec<Value> {
        let take = limit.unwrap_or(self.rows.len());
        self.rows
            .iter()
            .take(take)
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>();
                Value::Object(object)
            })
            .collect()
    }
}

/// Loads a dataset for question answering. `.csv`/`.tsv` paths are read as
/// delimited text; anything else is treated as an extracted JSON document.
pub fn load_dataset(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Dataset, AnswerError> {
    if !path.exists() {
        return Err(AnswerError::InputFileMissing(path.to_path_buf()));
    }
    if io_utils::is_delimited_text(path) {
        let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
        let (headers, records) = io_utils::read_delimited(path, delimiter, encoding)
            .map_err(|err| AnswerError::malformed(format!("Failed to load table: {err:#}")))?;
        let rows = records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|field| {
                        if field.is_empty() {
                            Value::Null
                        } else {
                            Value::String(field)
                        }
                    })
                    .collect()
            })
            .collect();
        return Dataset::new(headers, rows);
    }
    let doc = io_utils::read_json(path)
        .map_err(|err| AnswerError::malformed(format!("Failed to load table: {err:#}")))?;
    Dataset::from_document(&doc)
}

/// Lowercases `name` and drops every character outside `[a-z0-9]`.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Numeric view of a cell; non-numeric text, nulls and NaN are missing.
pub fn to_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|f| !f.is_nan())
}

/// Integer year of a cell: numeric coercion truncated toward zero.
pub fn to_year(value: &Value) -> Option<i64> {
    let number = to_number(value)?;
    let truncated = number.trunc();
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}

/// Text form of a cell, `None` for nulls.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_name_keeps_lowercase_alphanumerics() {
        assert_eq!(normalize_name("Finish Time (h:m:s)"), "finishtimehms");
        assert_eq!(normalize_name("Year_2"), "year2");
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("Ünïcode Year"), "ncodeyear");
    }

    #[test]
    fn from_records_unions_keys_in_first_seen_order() {
        let records = vec![
            json!({"year": 2020, "score": 10}),
            json!({"score": 20, "team": "b"}),
        ];
        let dataset = Dataset::from_records(&records).unwrap();
        assert_eq!(dataset.columns(), ["year", "score", "team"]);
        assert_eq!(dataset.rows()[1][0], Value::Null);
        assert_eq!(dataset.rows()[0][2], Value::Null);
    }

    #[test]
    fn from_records_rejects_non_object_rows() {
        let records = vec![json!({"year": 2020}), json!([1, 2])];
        let err = Dataset::from_records(&records).unwrap_err();
        assert!(matches!(err, AnswerError::MalformedInput(_)));
        assert!(err.to_string().contains("Row 2"));
    }

    #[test]
    fn from_document_requires_structured_data() {
        let doc = json!({"metadata": {"title": "x"}});
        let err = Dataset::from_document(&doc).unwrap_err();
        assert_eq!(err.to_string(), "No structuredData.data found in JSON file.");

        let doc = json!({"metadata": {"structuredData": {"data": [{"a": 1}]}}});
        assert_eq!(Dataset::from_document(&doc).unwrap().len(), 1);
    }

    #[test]
    fn page_content_rows_are_split_into_pairs() {
        let content = "Header line\nRow 1, Year: 2020, Score: 10\n  Row 2, Year: 2021, Score: 12\n";
        let dataset = Dataset::from_page_content(content);
        assert_eq!(dataset.columns(), ["Year", "Score"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[1][1], json!("12"));
    }

    #[test]
    fn coercions_follow_lenient_numeric_rules() {
        assert_eq!(to_number(&json!(3)), Some(3.0));
        assert_eq!(to_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(to_number(&json!("n/a")), None);
        assert_eq!(to_number(&json!("NaN")), None);
        assert_eq!(to_number(&json!(null)), None);
        assert_eq!(to_number(&json!(true)), None);
        assert_eq!(to_year(&json!("2021.9")), Some(2021));
        assert_eq!(to_year(&json!(-3.5)), Some(-3));
        assert_eq!(to_year(&json!("inf")), None);
    }

    #[test]
    fn select_rows_preserves_order_and_leaves_source_untouched() {
        let records = vec![json!({"v": 1}), json!({"v": 2}), json!({"v": 3})];
        let dataset = Dataset::from_records(&records).unwrap();
        let odd = dataset.select_rows(|row| to_number(&row[0]).is_some_and(|v| v != 2.0));
        assert_eq!(odd.to_records(None), vec![json!({"v": 1}), json!({"v": 3})]);
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Dataset::new(vec!["a".into(), "b".into()], vec![vec![json!(1)]]).unwrap_err();
        assert!(err.to_string().contains("Row 1 has 1 value(s)"));
    }
}

//! Column typing over loosely-typed tabular data.
//!
//! Nothing here is declared up front: every classification is derived from
//! column names and a scan of the values currently in the dataset.
//!
//! - **Year detection**: a column whose normalized name contains `year` wins
//!   outright; otherwise the first column whose numeric values mostly fall in
//!   [`YEAR_RANGE_MIN`]..=[`YEAR_RANGE_MAX`] is used.
//! - **Duration detection**: columns whose normalized name contains `time`
//!   hold clock-style durations.
//! - **Profiling**: [`profile`] assigns each column a [`ColumnRole`] for the
//!   `schema` command and the code generator prompt.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::dataset::{Dataset, cell_text, normalize_name, to_number, to_year};

pub const YEAR_RANGE_MIN: i64 = 1900;
pub const YEAR_RANGE_MAX: i64 = 2100;

const YEAR_MARKER: &str = "year";
const DURATION_MARKER: &str = "time";
const TIME_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Year,
    Duration,
    Numeric,
    Text,
}

impl ColumnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnRole::Year => "year",
            ColumnRole::Duration => "duration",
            ColumnRole::Numeric => "numeric",
            ColumnRole::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub role: ColumnRole,
    pub non_null: usize,
    pub numeric: usize,
}

pub fn is_year_like(column: &str) -> bool {
    normalize_name(column).contains(YEAR_MARKER)
}

pub fn is_duration_like(column: &str) -> bool {
    normalize_name(column).contains(DURATION_MARKER)
}

/// Picks the column holding calendar years, by name first and by value range
/// second. Returns `None` when neither pass finds a candidate.
pub fn infer_year_column(dataset: &Dataset) -> Option<&str> {
    if let Some(named) = dataset.columns().iter().find(|c| is_year_like(c)) {
        return Some(named.as_str());
    }
    dataset
        .columns()
        .iter()
        .enumerate()
        .find(|(idx, _)| mostly_year_values(dataset, *idx))
        .map(|(_, name)| name.as_str())
}

fn mostly_year_values(dataset: &Dataset, index: usize) -> bool {
    let years = dataset
        .column_values(index)
        .filter_map(to_year)
        .collect::<Vec<_>>();
    if years.is_empty() {
        return false;
    }
    let in_range = years
        .iter()
        .filter(|year| (YEAR_RANGE_MIN..=YEAR_RANGE_MAX).contains(*year))
        .count();
    in_range as f64 / years.len() as f64 > 0.5
}

fn time_or_date_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\d{1,2}:\d{2}$",
            r"^\d{1,2}:\d{2}:\d{2}$",
            r"^\d{1,2}/\d{1,2}/\d{2,4}$",
            r"^\d{4}-\d{2}-\d{2}$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("time/date pattern is valid"))
        .collect()
    })
}

/// True when any of the first few non-null values reads like a clock time or
/// a calendar date.
pub fn looks_like_time_or_date<'a, I>(values: I) -> bool
where
    I: IntoIterator<Item = &'a serde_json::Value>,
{
    values
        .into_iter()
        .filter_map(cell_text)
        .take(TIME_SAMPLE_SIZE)
        .any(|text| {
            let trimmed = text.trim();
            time_or_date_patterns().iter().any(|re| re.is_match(trimmed))
        })
}

pub fn profile(dataset: &Dataset) -> Vec<ColumnProfile> {
    let year_column = infer_year_column(dataset);
    dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let non_null = dataset
                .column_values(idx)
                .filter(|value| !value.is_null())
                .count();
            let numeric = dataset
                .column_values(idx)
                .filter_map(to_number)
                .count();
            let role = if year_column == Some(name.as_str()) {
                ColumnRole::Year
            } else if is_duration_like(name) || looks_like_time_or_date(dataset.column_values(idx))
            {
                ColumnRole::Duration
            } else if numeric * 2 > dataset.len() {
                ColumnRole::Numeric
            } else {
                ColumnRole::Text
            };
            ColumnProfile {
                name: name.clone(),
                role,
                non_null,
                numeric,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn dataset(records: Value) -> Dataset {
        Dataset::from_records(records.as_array().unwrap()).unwrap()
    }

    #[test]
    fn named_year_column_beats_value_heuristic() {
        let data = dataset(json!([
            {"season": 2019, "Fiscal Year": "FY1", "score": 3},
            {"season": 2020, "Fiscal Year": "FY2", "score": 4}
        ]));
        assert_eq!(infer_year_column(&data), Some("Fiscal Year"));
    }

    #[test]
    fn value_heuristic_needs_a_strict_majority_in_range() {
        let data = dataset(json!([
            {"id": 1, "season": 2019},
            {"id": 2, "season": "2020"},
            {"id": 3, "season": 12}
        ]));
        assert_eq!(infer_year_column(&data), Some("season"));

        let split = dataset(json!([
            {"season": 2019},
            {"season": 5}
        ]));
        assert_eq!(infer_year_column(&split), None);
    }

    #[test]
    fn value_heuristic_skips_non_numeric_columns() {
        let data = dataset(json!([
            {"name": "a", "label": "x"},
            {"name": "b", "label": "y"}
        ]));
        assert_eq!(infer_year_column(&data), None);
    }

    #[test]
    fn duration_and_year_names_are_normalized() {
        assert!(is_duration_like("Finish_Time"));
        assert!(is_duration_like("TIME"));
        assert!(is_duration_like("Tim e"));
        assert!(!is_duration_like("duration"));
        assert!(is_year_like("  YEAR "));
        assert!(is_year_like("Model-Year"));
        assert!(!is_year_like("yr"));
    }

    #[test]
    fn time_and_date_values_are_recognized() {
        let values = [json!(null), json!("2:58"), json!("x")];
        assert!(looks_like_time_or_date(values.iter()));
        let dates = [json!("12/31/2021")];
        assert!(looks_like_time_or_date(dates.iter()));
        let numbers = [json!(12), json!("7.5")];
        assert!(!looks_like_time_or_date(numbers.iter()));
    }

    #[test]
    fn profile_assigns_roles() {
        let data = dataset(json!([
            {"Year": 2021, "finish": "2:58:49", "score": "10", "team": "a"},
            {"Year": 2022, "finish": "3:01:02", "score": 12, "team": "b"}
        ]));
        let roles = profile(&data)
            .into_iter()
            .map(|p| (p.name, p.role))
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![
                ("Year".to_string(), ColumnRole::Year),
                ("finish".to_string(), ColumnRole::Duration),
                ("score".to_string(), ColumnRole::Numeric),
                ("team".to_string(), ColumnRole::Text),
            ]
        );
    }
}

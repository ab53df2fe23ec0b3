//! Look-back window over the distinct years present in a dataset.

use itertools::Itertools;

use crate::{
    dataset::{Dataset, to_year},
    error::AnswerError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecentRows {
    /// Selected years, most recent first.
    pub years: Vec<i64>,
    pub rows: Dataset,
}

/// Keeps the rows whose year is among the `years_back` most recent distinct
/// years of `year_column`.
///
/// Fails with [`AnswerError::NoValidYears`] when the column holds no year at
/// all. A non-positive window is not an error here: it selects no years and
/// yields an empty subset.
pub fn filter_recent(
    dataset: &Dataset,
    year_column: &str,
    years_back: i64,
) -> Result<RecentRows, AnswerError> {
    let index = dataset
        .column_index(year_column)
        .ok_or(AnswerError::NoYearColumn)?;
    let distinct = dataset
        .column_values(index)
        .filter_map(to_year)
        .unique()
        .sorted_unstable_by(|a, b| b.cmp(a))
        .collect::<Vec<_>>();
    if distinct.is_empty() {
        return Err(AnswerError::NoValidYears);
    }
    let take = usize::try_from(years_back.max(0)).unwrap_or(usize::MAX);
    let years = distinct.into_iter().take(take).collect::<Vec<_>>();
    let rows = dataset.select_rows(|row| {
        row.get(index)
            .and_then(to_year)
            .is_some_and(|year| years.contains(&year))
    });
    Ok(RecentRows { years, rows })
}

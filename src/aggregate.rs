//! Mean of a column over a row subset, for plain numbers and clock durations.
//!
//! Duration text is read as `H:MM:SS`, `H:MM:SS.fff` or `H:MM`, optionally
//! preceded by `N day(s)`. The mean is kept in fractional seconds and only
//! floored to whole seconds when rendered.

use std::{fmt, sync::OnceLock};

use chrono::TimeDelta;
use regex::Regex;

use crate::{
    dataset::{Dataset, cell_text, to_number},
    error::{AnswerError, ValueKind},
};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Average {
    Numeric(f64),
    Duration { seconds: f64 },
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Average::Numeric(value) => write!(f, "{value:.4}"),
            Average::Duration { seconds } => f.write_str(&format_duration(*seconds)),
        }
    }
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:(\d+)\s*days?,?\s+)?(\d+):(\d{1,2})(?::(\d{1,2})(?:\.(\d{1,9}))?)?$",
        )
        .expect("duration pattern is valid")
    })
}

/// Parses clock-style duration text. Minutes and seconds must be below 60;
/// hours are unbounded.
pub fn parse_duration(text: &str) -> Option<TimeDelta> {
    let captures = duration_pattern().captures(text.trim())?;
    let field = |idx: usize| -> Option<i64> {
        match captures.get(idx) {
            Some(m) => m.as_str().parse::<i64>().ok(),
            None => Some(0),
        }
    };
    let days = field(1)?;
    let hours = field(2)?;
    let minutes = field(3)?;
    let seconds = field(4)?;
    if minutes >= SECONDS_PER_MINUTE || seconds >= SECONDS_PER_MINUTE {
        return None;
    }
    let nanos = match captures.get(5) {
        Some(fraction) => format!("{:0<9}", fraction.as_str()).parse::<u32>().ok()?,
        None => 0,
    };
    let total = days
        .checked_mul(SECONDS_PER_DAY)?
        .checked_add(hours.checked_mul(SECONDS_PER_HOUR)?)?
        .checked_add(minutes * SECONDS_PER_MINUTE)?
        .checked_add(seconds)?;
    TimeDelta::new(total, nanos)
}

fn total_seconds(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

/// Renders `seconds` as `H:MM:SS`, dropping any fractional second.
pub fn format_duration(seconds: f64) -> String {
    let whole = seconds.floor() as i64;
    let hours = whole / SECONDS_PER_HOUR;
    let minutes = (whole % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let secs = whole % SECONDS_PER_MINUTE;
    format!("{hours}:{minutes:02}:{secs:02}")
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Averages `target_column` over `subset`. Cells that cannot be read as the
/// expected kind are skipped; if none remain the aggregation fails.
pub fn aggregate(
    subset: &Dataset,
    target_column: &str,
    is_duration: bool,
) -> Result<Average, AnswerError> {
    let kind = if is_duration {
        ValueKind::Duration
    } else {
        ValueKind::Numeric
    };
    let failed = || AnswerError::AggregationFailed {
        column: target_column.to_string(),
        kind,
    };
    let index = subset.column_index(target_column).ok_or_else(failed)?;
    let cells = subset.column_values(index);
    match kind {
        ValueKind::Duration => {
            let seconds = cells
                .filter_map(cell_text)
                .filter_map(|text| parse_duration(&text))
                .map(total_seconds)
                .collect::<Vec<_>>();
            mean(&seconds)
                .map(|seconds| Average::Duration { seconds })
                .ok_or_else(failed)
        }
        ValueKind::Numeric => {
            let numbers = cells.filter_map(to_number).collect::<Vec<_>>();
            mean(&numbers).map(Average::Numeric).ok_or_else(failed)
        }
    }
}

pub fn format_answer(target_column: &str, years_back: i64, average: &Average) -> String {
    format!("Average {target_column} over past {years_back} years: {average}")
}

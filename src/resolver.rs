//! Token-overlap matching of a free-text phrase against column names.
//!
//! Both sides are normalized (see [`normalize_name`]) and split into runs of
//! letters. The score is the number of shared runs, plus [`TIME_BONUS`] when
//! both sides mention `time`. The first column reaching the highest score
//! wins, so ties always go to the earliest column.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::dataset::normalize_name;

pub const TIME_BONUS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch<'a> {
    pub column: &'a str,
    pub score: usize,
}

fn alpha_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z]+").expect("token pattern is valid"))
}

fn tokens(normalized: &str) -> HashSet<&str> {
    alpha_runs()
        .find_iter(normalized)
        .map(|m| m.as_str())
        .collect()
}

pub fn score(column: &str, phrase: &str) -> usize {
    let column = normalize_name(column);
    let phrase = normalize_name(phrase);
    let common = tokens(&column).intersection(&tokens(&phrase)).count();
    let bonus = if column.contains("time") && phrase.contains("time") {
        TIME_BONUS
    } else {
        0
    };
    common + bonus
}

/// Best-scoring column for `phrase`. Only `None` when `columns` is empty; a
/// zero score is still a match and callers decide whether to trust it.
pub fn resolve<'a, S>(columns: &'a [S], phrase: &str) -> Option<ColumnMatch<'a>>
where
    S: AsRef<str>,
{
    let mut best: Option<ColumnMatch<'a>> = None;
    for column in columns {
        let column = column.as_ref();
        let candidate = score(column, phrase);
        // strict comparison keeps the earliest column on ties
        if best.as_ref().is_none_or(|b| candidate > b.score) {
            best = Some(ColumnMatch {
                column,
                score: candidate,
            });
        }
    }
    best
}

//! Recognizes the one question shape the deterministic path can answer:
//! `average <phrase> for the past <N> year(s)`.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub target_phrase: String,
    pub years_back: i64,
}

fn average_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)average\s+(.+?)\s+for\s+the\s+past\s+(\d+)\s+years?")
            .expect("average pattern is valid")
    })
}

/// Matches anywhere in `question`, ignoring case. Returns `None` for any other
/// phrasing. A year count beyond `i64` saturates; the window covers every year
/// either way.
pub fn parse(question: &str) -> Option<ParsedQuestion> {
    let captures = average_pattern().captures(question)?;
    let target_phrase = captures.get(1)?.as_str().trim().to_string();
    let years_back = captures
        .get(2)?
        .as_str()
        .parse::<i64>()
        .unwrap_or(i64::MAX);
    Some(ParsedQuestion {
        target_phrase,
        years_back,
    })
}

//! The question pipeline and its fallback policy.
//!
//! [`Resolver`] runs the deterministic stages in order:
//!
//! 1. parse the question ([`question::parse`])
//! 2. find the year column ([`schema::infer_year_column`])
//! 3. keep the most recent years ([`temporal::filter_recent`])
//! 4. pick the target column ([`resolver::resolve`])
//! 5. average it ([`aggregate::aggregate`])
//!
//! Each stage returns an explicit [`AnswerError`] on failure. [`Coordinator`]
//! wraps a resolver and, when a [`CodeGenerator`] is configured, hands
//! deterministic failures to it exactly once. Without a generator every
//! failure is terminal.

use serde_json::Value;

use crate::{
    aggregate::{self, Average},
    codegen::{self, CodeGenerator},
    dataset::Dataset,
    error::AnswerError,
    question, resolver,
    response::Response,
    schema, temporal,
    trace::TraceSink,
};

pub const DEFAULT_MIN_MATCH_SCORE: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub target_column: String,
    pub year_column: String,
    pub years_back: i64,
    pub years: Vec<i64>,
    pub rows_used: usize,
    pub average: Average,
}

impl Answer {
    pub fn sentence(&self) -> String {
        aggregate::format_answer(&self.target_column, self.years_back, &self.average)
    }
}

pub struct Resolver<'t> {
    min_match_score: usize,
    trace: Option<&'t dyn TraceSink>,
}

impl Default for Resolver<'_> {
    fn default() -> Self {
        Self {
            min_match_score: DEFAULT_MIN_MATCH_SCORE,
            trace: None,
        }
    }
}

impl<'t> Resolver<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target matches scoring below `score` fail with
    /// [`AnswerError::NoConfidentMatch`]. `0` accepts any match.
    pub fn with_min_match_score(mut self, score: usize) -> Self {
        self.min_match_score = score;
        self
    }

    pub fn with_trace(mut self, trace: &'t dyn TraceSink) -> Self {
        self.trace = Some(trace);
        self
    }

    fn trace(&self, step: &str, detail: impl FnOnce() -> String) {
        if let Some(sink) = self.trace {
            sink.record(step, &detail());
        }
    }

    pub fn answer(&self, dataset: &Dataset, question: &str) -> Result<Answer, AnswerError> {
        self.run(dataset, question).inspect_err(|err| {
            self.trace("failed", || err.to_string());
        })
    }

    fn run(&self, dataset: &Dataset, question: &str) -> Result<Answer, AnswerError> {
        let parsed = question::parse(question).ok_or(AnswerError::UnsupportedQuestion)?;
        self.trace("parsed", || {
            format!(
                "target_phrase={:?} years_back={}",
                parsed.target_phrase, parsed.years_back
            )
        });

        let year_column = schema::infer_year_column(dataset).ok_or(AnswerError::NoYearColumn)?;
        self.trace("year_column_found", || year_column.to_string());

        let recent = temporal::filter_recent(dataset, year_column, parsed.years_back)?;
        self.trace("recency_selected", || {
            format!("years={:?} rows={}", recent.years, recent.rows.len())
        });
        if recent.rows.is_empty() {
            return Err(AnswerError::EmptyRecencyWindow);
        }

        let matched = resolver::resolve(dataset.columns(), &parsed.target_phrase).ok_or_else(
            || AnswerError::NoConfidentMatch {
                phrase: parsed.target_phrase.clone(),
                best: String::new(),
                score: 0,
            },
        )?;
        if matched.score < self.min_match_score {
            return Err(AnswerError::NoConfidentMatch {
                phrase: parsed.target_phrase.clone(),
                best: matched.column.to_string(),
                score: matched.score,
            });
        }
        self.trace("target_column_resolved", || {
            format!("column={} score={}", matched.column, matched.score)
        });

        let is_duration = schema::is_duration_like(matched.column);
        let average = aggregate::aggregate(&recent.rows, matched.column, is_duration)?;
        self.trace("aggregated", || format!("{average:?}"));

        Ok(Answer {
            target_column: matched.column.to_string(),
            year_column: year_column.to_string(),
            years_back: parsed.years_back,
            years: recent.years,
            rows_used: recent.rows.len(),
            average,
        })
    }
}

/// Final answer in the shape shared by the deterministic and delegated paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub answer: Value,
    /// `None` when no fallback is configured; otherwise the generated code,
    /// which is itself `None` for deterministic answers.
    pub code: Option<Option<String>>,
}

impl From<Outcome> for Response {
    fn from(outcome: Outcome) -> Self {
        Response::Answer {
            answer: outcome.answer,
            code: outcome.code,
        }
    }
}

pub struct Coordinator<'a> {
    resolver: Resolver<'a>,
    fallback: Option<&'a dyn CodeGenerator>,
}

impl<'a> Coordinator<'a> {
    /// Deterministic-only: every failure is returned to the caller.
    pub fn deterministic(resolver: Resolver<'a>) -> Self {
        Self {
            resolver,
            fallback: None,
        }
    }

    pub fn with_fallback(resolver: Resolver<'a>, fallback: &'a dyn CodeGenerator) -> Self {
        Self {
            resolver,
            fallback: Some(fallback),
        }
    }

    pub fn respond(&self, dataset: &Dataset, question: &str) -> Result<Outcome, AnswerError> {
        match self.resolver.answer(dataset, question) {
            Ok(answer) => Ok(Outcome {
                answer: Value::String(answer.sentence()),
                code: self.fallback.map(|_| None),
            }),
            Err(err) if err.is_deterministic() => {
                let Some(generator) = self.fallback else {
                    return Err(err);
                };
                self.resolver
                    .trace("delegated_to_fallback", || err.to_string());
                let generated = generator.ask(&codegen::wrap_question(question), dataset)?;
                Ok(Outcome {
                    answer: generated.answer,
                    code: Some(generated.code),
                })
            }
            Err(err) => Err(err),
        }
    }
}

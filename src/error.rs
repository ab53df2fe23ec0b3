//! Error kinds surfaced to callers of the resolver and its collaborators.
//!
//! Every variant renders to the user-facing message that ends up in the
//! `{"error": ...}` payload. Stage functions return these directly so the
//! coordinator can decide, by variant, whether a failure is eligible for
//! delegation to the code generator.

use std::path::PathBuf;

use thiserror::Error;

use crate::response::Guidance;

/// Value family the aggregator tried to average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Numeric,
    Duration,
}

impl ValueKind {
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Numeric => "numeric",
            ValueKind::Duration => "time",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnswerError {
    #[error("File not found: {}", .0.display())]
    InputFileMissing(PathBuf),

    #[error("{0}")]
    MalformedInput(String),

    #[error("Question not supported by deterministic aggregator.")]
    UnsupportedQuestion,

    #[error("Could not detect a 'year' column.")]
    NoYearColumn,

    #[error("No valid year values found.")]
    NoValidYears,

    #[error("No rows within the requested year range.")]
    EmptyRecencyWindow,

    #[error("No column matches '{phrase}' (best candidate '{best}' scored {score})")]
    NoConfidentMatch {
        phrase: String,
        best: String,
        score: usize,
    },

    #[error("Deterministic aggregator error: Could not compute average of {} column", .kind.label())]
    AggregationFailed { column: String, kind: ValueKind },

    #[error("{message}")]
    CollaboratorFailure {
        message: String,
        code: Option<String>,
        guidance: Option<Guidance>,
    },
}

impl AnswerError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::CollaboratorFailure {
            message: message.into(),
            code: None,
            guidance: None,
        }
    }

    pub fn collaborator_with_code(message: impl Into<String>, code: Option<String>) -> Self {
        Self::CollaboratorFailure {
            message: message.into(),
            code,
            guidance: None,
        }
    }

    /// True for failures raised inside the deterministic pipeline. Only these
    /// are handed to the code generator when a fallback is configured.
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            AnswerError::UnsupportedQuestion
                | AnswerError::NoYearColumn
                | AnswerError::NoValidYears
                | AnswerError::EmptyRecencyWindow
                | AnswerError::NoConfidentMatch { .. }
                | AnswerError::AggregationFailed { .. }
        )
    }
}

//! JSON payloads written to stdout.
//!
//! Every command emits exactly one of these objects on a single line:
//!
//! - `{"answer": ..., "code": ...}` for answered questions; `code` appears
//!   only when a code generator fallback was configured.
//! - `{"answer": [...], "metadata": {...}}` for relational queries.
//! - `{"error": ..., "guidance"?: {...}, "code"?: ...}` for failures.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::{error::AnswerError, query::QueryMetadata};

/// Tables and columns that were available when a query failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Guidance {
    pub available_tables: Vec<String>,
    pub table_columns: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Answer {
        answer: Value,
        /// `Some(None)` renders as `"code": null`, `None` omits the field.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<Option<String>>,
    },
    Query {
        answer: Vec<Value>,
        metadata: QueryMetadata,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        guidance: Option<Guidance>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
            guidance: None,
            code: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<AnswerError> for Response {
    fn from(err: AnswerError) -> Self {
        let message = err.to_string();
        match err {
            AnswerError::CollaboratorFailure { code, guidance, .. } => Response::Error {
                error: message,
                guidance,
                code,
            },
            _ => Response::error(message),
        }
    }
}

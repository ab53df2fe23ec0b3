//! Code-generating fallback for questions the deterministic path cannot answer.
//!
//! A [`CodeGenerator`] receives the question (already wrapped by
//! [`wrap_question`]) and the loaded table, and returns an answer plus the
//! data-manipulation code it wrote. The bundled
//! [`OllamaCodeGenerator`] asks a local Ollama model; generated code is
//! returned for inspection and never executed here.

use std::{sync::OnceLock, time::Duration};

use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{dataset::Dataset, error::AnswerError, schema};

pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3:8b";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: Value,
    pub code: Option<String>,
}

pub trait CodeGenerator {
    fn ask(&self, question: &str, dataset: &Dataset) -> Result<GeneratedAnswer, AnswerError>;
}

/// Wraps the user question with the constraints the generated code must obey.
pub fn wrap_question(question: &str) -> String {
    format!(
        "You are working with a table loaded as a pandas DataFrame named `df`.\n\
         Never use `dfs`, `dfs[0]`, or any variable except `df`.\n\
         If you need to filter, use `df[...]` or `df.loc[...]` only.\n\
         Always return code inside triple backticks.\n\
         If the answer is a single value, return code that extracts that value from the DataFrame and prints it.\n\
         After the code, state the result on its own line starting with `Answer:`.\n\n\
         User question:\n{question}"
    )
}

/// Full prompt: an already wrapped question preceded by the table's columns
/// and a sample of its rows.
pub fn build_prompt(wrapped_question: &str, dataset: &Dataset, sample_rows: usize) -> String {
    let columns = schema::profile(dataset)
        .into_iter()
        .map(|column| format!("- {} ({})", column.name, column.role.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    let sample = Value::Array(dataset.to_records(Some(sample_rows)));
    format!(
        "The DataFrame `df` has {rows} row(s) and these columns:\n{columns}\n\n\
         First rows as JSON records:\n{sample}\n\n{wrapped_question}",
        rows = dataset.len(),
    )
}

fn fenced_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
    })
}

/// Splits a model reply into its answer text and first fenced code block.
pub fn parse_reply(reply: &str) -> GeneratedAnswer {
    let code = fenced_block()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|code| !code.is_empty());

    let prose = fenced_block().replace_all(reply, "");
    let labelled = prose.lines().find_map(|line| {
        let trimmed = line.trim();
        let (label, rest) = trimmed.split_at_checked(7)?;
        label
            .eq_ignore_ascii_case("answer:")
            .then(|| rest.trim().to_string())
    });
    let answer = labelled.unwrap_or_else(|| prose.trim().to_string());
    let answer = if answer.is_empty() {
        Value::Null
    } else {
        Value::String(answer)
    };
    GeneratedAnswer { answer, code }
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub timeout: Option<Duration>,
    pub sample_rows: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout: Some(Duration::from_secs(120)),
            sample_rows: 20,
        }
    }
}

pub fn normalize_ollama_host(host: &str) -> String {
    let mut host = host.trim().to_string();
    if host.is_empty() {
        host = DEFAULT_OLLAMA_HOST.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("http://{host}");
    }
    host.trim_end_matches('/').to_string()
}

pub struct OllamaCodeGenerator {
    config: OllamaConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OllamaCodeGenerator {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }

    fn chat(&self, prompt: &str) -> Result<String, AnswerError> {
        let host = normalize_ollama_host(&self.config.host);
        let url = format!("{host}/api/chat");
        let body = json!({
            "model": self.config.model,
            "stream": false,
            "messages": [{ "role": "user", "content": prompt }],
            "options": { "temperature": 0 }
        });

        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            AnswerError::collaborator(format!("Code generation failed: http client: {e}"))
        })?;

        let resp = client.post(&url).json(&body).send().map_err(|e| {
            AnswerError::collaborator(format!(
                "Code generation failed: could not reach ollama at {url} ({e})"
            ))
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(AnswerError::collaborator(format!(
                "Code generation failed: ollama http error {status}: {text}"
            )));
        }
        let parsed: ChatResponse = resp.json().map_err(|e| {
            AnswerError::collaborator(format!(
                "Code generation failed: ollama returned invalid JSON: {e}"
            ))
        })?;
        Ok(parsed.message.content)
    }
}

impl CodeGenerator for OllamaCodeGenerator {
    fn ask(&self, question: &str, dataset: &Dataset) -> Result<GeneratedAnswer, AnswerError> {
        info!("Delegating question to ollama model '{}'", self.config.model);
        let prompt = build_prompt(question, dataset, self.config.sample_rows);
        let reply = self.chat(&prompt)?;
        debug!("Model reply: {reply}");
        let generated = parse_reply(&reply);
        if generated.answer.is_null() {
            return Err(AnswerError::collaborator_with_code(
                "Code generation failed: model reply contained no answer",
                generated.code,
            ));
        }
        Ok(generated)
    }
}

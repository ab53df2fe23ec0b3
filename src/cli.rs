use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    codegen::{DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL},
    documents::DEFAULT_DOCUMENTS_DIR,
    pipeline::DEFAULT_MIN_MATCH_SCORE,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Answer natural-language questions about tabular document data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Answer a question about one document's table
    Ask(AskArgs),
    /// Run a SQL query over tables loaded from stored documents
    Query(QueryArgs),
    /// Show how each column of a document's table is typed
    Schema(SchemaArgs),
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// JSON document (metadata.structuredData.data) or CSV/TSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Question to answer, e.g. "average finish time for the past 3 years"
    pub question: String,
    /// Only use the deterministic aggregator; never call the language model
    #[arg(long = "no-fallback")]
    pub no_fallback: bool,
    /// Minimum token-overlap score for the target column (0 accepts any column)
    #[arg(long = "min-match-score", default_value_t = DEFAULT_MIN_MATCH_SCORE)]
    pub min_match_score: usize,
    /// Ollama server used for fallback answers
    #[arg(long = "ollama-host", env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_HOST)]
    pub ollama_host: String,
    /// Ollama model used for fallback answers
    #[arg(long = "ollama-model", env = "OLLAMA_MODEL", default_value = DEFAULT_OLLAMA_MODEL)]
    pub ollama_model: String,
    /// Seconds to wait for the language model (0 disables the timeout)
    #[arg(long = "llm-timeout-secs", default_value_t = 120)]
    pub llm_timeout_secs: u64,
    /// Rows of the table included in the fallback prompt
    #[arg(long = "sample-rows", default_value_t = 20)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of a CSV input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// JSON object mapping table names to document ids, e.g. '{"sales":"a1b2"}'
    #[arg(long = "tables")]
    pub tables: String,
    /// SQL to run against the loaded tables
    pub sql: String,
    /// Directory holding the stored documents
    #[arg(
        long = "documents-dir",
        env = "TABULAR_QA_DOCUMENTS",
        default_value = DEFAULT_DOCUMENTS_DIR
    )]
    pub documents_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// JSON document (metadata.structuredData.data) or CSV/TSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Render a text table instead of JSON
    #[arg(long = "table")]
    pub table: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of a CSV input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

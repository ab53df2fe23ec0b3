pub mod aggregate;
pub mod cli;
pub mod codegen;
pub mod dataset;
pub mod documents;
pub mod error;
pub mod io_utils;
pub mod pipeline;
pub mod query;
pub mod question;
pub mod resolver;
pub mod response;
pub mod schema;
pub mod table;
pub mod temporal;
pub mod trace;

use std::{env, io, process::ExitCode, sync::OnceLock, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, error::ErrorKind};
use log::{LevelFilter, debug, info, warn};
use serde_json::json;

use crate::{
    cli::{Cli, Commands},
    codegen::{OllamaCodeGenerator, OllamaConfig},
    pipeline::{Coordinator, Resolver},
    response::Response,
    trace::LogTrace,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_qa", LevelFilter::Info);
        }
        let _ = builder
            .format_timestamp_millis()
            .target(env_logger::Target::Stderr)
            .try_init();
    });
}

/// Parses the command line, runs the command, and writes its JSON result to
/// stdout. Errors that escape are left for `main` to report.
pub fn run() -> Result<ExitCode> {
    init_logging();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) =>
        {
            err.exit()
        }
        Err(err) => return Err(err.into()),
    };
    match cli.command {
        Commands::Ask(args) => emit(&handle_ask(&args)?),
        Commands::Query(args) => emit(&query::execute(&args)?),
        Commands::Schema(args) => handle_schema(&args),
    }
}

fn emit(response: &Response) -> Result<ExitCode> {
    io_utils::write_json_line(io::stdout().lock(), response)?;
    Ok(if response.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn handle_ask(args: &cli::AskArgs) -> Result<Response> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!("Answering {:?} from '{}'", args.question, args.input.display());
    if io_utils::is_delimited_text(&args.input) {
        let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
        debug!(
            "Reading delimited text with delimiter {:?}",
            char::from(delimiter)
        );
    }
    let dataset = match dataset::load_dataset(&args.input, args.delimiter, encoding) {
        Ok(dataset) => dataset,
        Err(err) => {
            warn!("{err}");
            return Ok(err.into());
        }
    };
    debug!(
        "Loaded {} row(s) with columns {:?}",
        dataset.len(),
        dataset.columns()
    );

    let trace = LogTrace;
    let resolver = Resolver::new()
        .with_min_match_score(args.min_match_score)
        .with_trace(&trace);
    let generator;
    let coordinator = if args.no_fallback {
        Coordinator::deterministic(resolver)
    } else {
        generator = OllamaCodeGenerator::new(OllamaConfig {
            host: args.ollama_host.clone(),
            model: args.ollama_model.clone(),
            timeout: (args.llm_timeout_secs > 0)
                .then(|| Duration::from_secs(args.llm_timeout_secs)),
            sample_rows: args.sample_rows,
        });
        Coordinator::with_fallback(resolver, &generator)
    };

    Ok(match coordinator.respond(&dataset, &args.question) {
        Ok(outcome) => {
            info!("Question answered");
            outcome.into()
        }
        Err(err) => {
            warn!("{err}");
            err.into()
        }
    })
}

fn handle_schema(args: &cli::SchemaArgs) -> Result<ExitCode> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let dataset = dataset::load_dataset(&args.input, args.delimiter, encoding)
        .with_context(|| format!("Profiling columns of {:?}", args.input))?;
    let profiles = schema::profile(&dataset);
    info!(
        "Profiled {} column(s) across {} row(s)",
        profiles.len(),
        dataset.len()
    );
    if args.table {
        print!("{}", table::render_profiles(&profiles));
        return Ok(ExitCode::SUCCESS);
    }
    let payload = json!({
        "columns": profiles,
        "year_column": schema::infer_year_column(&dataset),
    });
    io_utils::write_json_line(io::stdout().lock(), &payload)?;
    Ok(ExitCode::SUCCESS)
}

//! Relational queries over named tables.
//!
//! The `query` command loads every requested table from the
//! [`DocumentStore`], hands the tables and the SQL text to a [`QueryEngine`],
//! and reports the rows with row/column counts and the execution time. The
//! bundled [`DuckDbEngine`] loads the tables into an in-memory DuckDB
//! database; result columns come from the statement, so an empty result
//! still lists them. When the engine rejects the query, the error carries
//! [`Guidance`] listing the tables and columns that were available.

use std::{collections::BTreeMap, time::Instant};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveTime};
use duckdb::{
    Connection, params_from_iter,
    types::{TimeUnit, Value as SqlValue},
};
use log::{debug, error, info};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::{
    cli::QueryArgs,
    dataset::{Dataset, cell_text},
    documents::DocumentStore,
    error::AnswerError,
    response::{Guidance, Response},
};

pub struct NamedTable {
    pub name: String,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetadata {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub execution_time_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub metadata: QueryMetadata,
}

pub trait QueryEngine {
    fn execute(&self, sql: &str, tables: &[NamedTable]) -> Result<QueryResult>;
}

/// Runs queries on an in-memory DuckDB database. Every call opens a fresh
/// connection and loads the given tables into it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuckDbEngine;

/// Column type used when loading a table. Picked from the JSON cells: all
/// booleans, all integers, all numbers, otherwise text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    BigInt,
    Double,
    Varchar,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::Varchar => "VARCHAR",
        }
    }

    fn to_sql_value(self, cell: &Value) -> SqlValue {
        match (self, cell) {
            (_, Value::Null) => SqlValue::Null,
            (SqlType::Boolean, Value::Bool(flag)) => SqlValue::Boolean(*flag),
            (SqlType::BigInt, Value::Number(n)) => n.as_i64().map_or(SqlValue::Null, SqlValue::BigInt),
            (SqlType::Double, Value::Number(n)) => n.as_f64().map_or(SqlValue::Null, SqlValue::Double),
            (_, other) => cell_text(other).map_or(SqlValue::Null, SqlValue::Text),
        }
    }
}

pub fn column_type<'a, I>(cells: I) -> SqlType
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut seen = None;
    for cell in cells {
        let kind = match cell {
            Value::Null => continue,
            Value::Bool(_) => SqlType::Boolean,
            Value::Number(n) if n.is_i64() => SqlType::BigInt,
            Value::Number(_) => SqlType::Double,
            _ => return SqlType::Varchar,
        };
        seen = Some(match (seen, kind) {
            (None, kind) => kind,
            (Some(a), b) if a == b => a,
            (Some(SqlType::BigInt | SqlType::Double), SqlType::BigInt | SqlType::Double) => {
                SqlType::Double
            }
            _ => return SqlType::Varchar,
        });
    }
    seen.unwrap_or(SqlType::Varchar)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Creates `table` in `conn` with one typed column per dataset column and
/// inserts every row.
pub fn create_table(conn: &Connection, table: &NamedTable) -> Result<()> {
    let columns = table.dataset.columns();
    if columns.is_empty() {
        return Err(anyhow!("Table '{}' has no columns", table.name));
    }
    let types = (0..columns.len())
        .map(|idx| column_type(table.dataset.column_values(idx)))
        .collect::<Vec<_>>();
    let definitions = columns
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote_identifier(name), ty.as_sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let table_name = quote_identifier(&table.name);
    conn.execute_batch(&format!("CREATE TABLE {table_name} ({definitions});"))
        .with_context(|| format!("Creating table '{}'", table.name))?;
    debug!("Table '{}' columns: {definitions}", table.name);

    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut insert = conn
        .prepare(&format!("INSERT INTO {table_name} VALUES ({placeholders})"))
        .with_context(|| format!("Preparing inserts for '{}'", table.name))?;
    for (idx, row) in table.dataset.rows().iter().enumerate() {
        let values = types.iter().zip(row).map(|(ty, cell)| ty.to_sql_value(cell));
        insert
            .execute(params_from_iter(values))
            .with_context(|| format!("Loading row {} of '{}'", idx + 1, table.name))?;
    }
    Ok(())
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// JSON form of one result cell. Dates and times render as ISO text; types
/// with no JSON counterpart fall back to their debug text.
pub fn to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Boolean(flag) => Value::Bool(flag),
        SqlValue::TinyInt(n) => n.into(),
        SqlValue::SmallInt(n) => n.into(),
        SqlValue::Int(n) => n.into(),
        SqlValue::BigInt(n) => n.into(),
        SqlValue::HugeInt(n) => i64::try_from(n).map_or_else(|_| float_value(n as f64), Value::from),
        SqlValue::UTinyInt(n) => n.into(),
        SqlValue::USmallInt(n) => n.into(),
        SqlValue::UInt(n) => n.into(),
        SqlValue::UBigInt(n) => n.into(),
        SqlValue::Float(f) => float_value(f64::from(f)),
        SqlValue::Double(f) => float_value(f),
        SqlValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map_or_else(|_| Value::String(d.to_string()), float_value),
        SqlValue::Text(text) | SqlValue::Enum(text) => Value::String(text),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        SqlValue::Date32(days) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map_or(Value::Null, |dt| Value::String(dt.date_naive().to_string())),
        SqlValue::Timestamp(unit, value) => DateTime::from_timestamp_micros(micros(unit, value))
            .map_or(Value::Null, |dt| Value::String(dt.naive_utc().to_string())),
        SqlValue::Time64(unit, value) => {
            let micros = micros(unit, value);
            NaiveTime::from_num_seconds_from_midnight_opt(
                u32::try_from(micros / 1_000_000).unwrap_or_default(),
                u32::try_from((micros % 1_000_000) * 1_000).unwrap_or_default(),
            )
            .map_or(Value::Null, |t| Value::String(t.to_string()))
        }
        SqlValue::List(items) | SqlValue::Array(items) => {
            Value::Array(items.into_iter().map(to_json).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}

impl QueryEngine for DuckDbEngine {
    fn execute(&self, sql: &str, tables: &[NamedTable]) -> Result<QueryResult> {
        let conn = Connection::open_in_memory().context("Opening in-memory DuckDB")?;
        for table in tables {
            create_table(&conn, table)?;
        }

        let start = Instant::now();
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let columns = rows
            .as_ref()
            .map(|stmt| stmt.column_names())
            .unwrap_or_default();
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Map::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get::<_, SqlValue>(idx)?));
            }
            records.push(Value::Object(record));
        }
        let elapsed = start.elapsed().as_secs_f64();

        Ok(QueryResult {
            metadata: QueryMetadata {
                row_count: records.len(),
                column_count: columns.len(),
                columns,
                execution_time_seconds: elapsed,
            },
            rows: records,
        })
    }
}

pub fn guidance_for(tables: &[NamedTable]) -> Guidance {
    Guidance {
        available_tables: tables.iter().map(|t| t.name.clone()).collect(),
        table_columns: tables
            .iter()
            .map(|t| (t.name.clone(), t.dataset.columns().to_vec()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Loads `table_map` (table name → document id) and runs `sql` on `engine`.
pub fn run_query(
    store: &DocumentStore,
    engine: &dyn QueryEngine,
    table_map: &Map<String, Value>,
    sql: &str,
) -> Result<QueryResult, AnswerError> {
    let mut tables = Vec::with_capacity(table_map.len());
    for (name, doc_id) in table_map {
        let doc_id = match doc_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let dataset = store.load_table(name, &doc_id).map_err(|err| {
            error!("{err:#}");
            AnswerError::collaborator(format!("{err:#}"))
        })?;
        tables.push(NamedTable {
            name: name.clone(),
            dataset,
        });
    }

    info!("Executing query over {} table(s)", tables.len());
    engine.execute(sql, &tables).map_err(|err| {
        error!("Query failed: {err:#} | Query: {sql}");
        AnswerError::CollaboratorFailure {
            message: format!("Query failed: {err:#}"),
            code: None,
            guidance: Some(guidance_for(&tables)),
        }
    })
}

pub fn execute(args: &QueryArgs) -> Result<Response> {
    let table_map: Map<String, Value> = serde_json::from_str(&args.tables)
        .with_context(|| format!("Parsing --tables mapping {:?}", args.tables))?;
    let store = DocumentStore::new(&args.documents_dir);
    let response = match run_query(&store, &DuckDbEngine, &table_map, &args.sql) {
        Ok(result) => {
            info!(
                "Query returned {} row(s) in {:.3}s",
                result.metadata.row_count, result.metadata.execution_time_seconds
            );
            Response::Query {
                answer: result.rows,
                metadata: result.metadata,
            }
        }
        Err(err) => Response::from(err),
    };
    Ok(response)
}

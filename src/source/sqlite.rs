use std::path::Path;
use std::sync::Mutex;

use polars::prelude::*;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, ToSql};
use tracing::debug;

use super::{SqlValue, Statement, TabularSource};
use crate::error::{DashError, Result};

/// Local SQLite database used as a tabular source, mainly for the metadata
/// store when no warehouse is configured.
pub struct SqliteSource {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteSource {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            label: format!("sqlite:{}", path.display()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            label: "sqlite::memory:".to_string(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DashError::SourceUnavailable(format!("sqlite connection lock poisoned: {e}")))
    }
}

fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(v) => Value::Integer(*v),
        SqlValue::Float(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Bool(v) => Value::Integer(i64::from(*v)),
    }
}

#[derive(Clone, Debug)]
enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ColType {
    Unknown,
    Int64,
    Float64,
    Utf8,
}

impl TabularSource for SqliteSource {
    fn execute(&self, stmt: &Statement) -> Result<DataFrame> {
        debug!("{}: {}", self.label, stmt);
        let conn = self.lock()?;
        let mut prepared = conn.prepare(&stmt.sql)?;

        let names: Vec<String> = stmt.params.iter().map(|(n, _)| format!(":{n}")).collect();
        let values: Vec<Value> = stmt.params.iter().map(|(_, v)| to_sqlite_value(v)).collect();
        let bound: Vec<(&str, &dyn ToSql)> = names
            .iter()
            .zip(values.iter())
            .map(|(n, v)| (n.as_str(), v as &dyn ToSql))
            .collect();

        let column_count = prepared.column_count();
        if column_count == 0 {
            prepared.execute(bound.as_slice())?;
            return Ok(DataFrame::empty());
        }

        let column_names: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let mut data_rows: Vec<Vec<Cell>> = Vec::new();
        let mut rows = prepared.query(bound.as_slice())?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(match row.get_ref(i)? {
                    ValueRef::Null => Cell::Null,
                    ValueRef::Integer(x) => Cell::Integer(x),
                    ValueRef::Real(f) => Cell::Real(f),
                    ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
                    ValueRef::Blob(b) => Cell::Text(format!("{b:?}")),
                });
            }
            data_rows.push(values);
        }

        // integer -> float -> text promotion per column
        let mut col_types = vec![ColType::Unknown; column_count];
        for row in &data_rows {
            for (i, cell) in row.iter().enumerate() {
                col_types[i] = match (col_types[i], cell) {
                    (t, Cell::Null) => t,
                    (ColType::Unknown | ColType::Int64, Cell::Integer(_)) => ColType::Int64,
                    (ColType::Float64, Cell::Integer(_)) => ColType::Float64,
                    (ColType::Unknown | ColType::Int64 | ColType::Float64, Cell::Real(_)) => ColType::Float64,
                    _ => ColType::Utf8,
                };
            }
        }

        let mut columns: Vec<Column> = Vec::with_capacity(column_count);
        for (i, name) in column_names.iter().enumerate() {
            let series = match col_types[i] {
                ColType::Int64 => {
                    let data: Vec<Option<i64>> = data_rows
                        .iter()
                        .map(|row| match row[i] {
                            Cell::Integer(x) => Some(x),
                            _ => None,
                        })
                        .collect();
                    Series::new(name.as_str().into(), data)
                }
                ColType::Float64 => {
                    let data: Vec<Option<f64>> = data_rows
                        .iter()
                        .map(|row| match row[i] {
                            Cell::Integer(x) => Some(x as f64),
                            Cell::Real(f) => Some(f),
                            _ => None,
                        })
                        .collect();
                    Series::new(name.as_str().into(), data)
                }
                ColType::Utf8 | ColType::Unknown => {
                    let data: Vec<Option<String>> = data_rows
                        .iter()
                        .map(|row| match &row[i] {
                            Cell::Null => None,
                            Cell::Integer(x) => Some(x.to_string()),
                            Cell::Real(f) => Some(f.to_string()),
                            Cell::Text(s) => Some(s.clone()),
                        })
                        .collect();
                    Series::new(name.as_str().into(), data)
                }
            };
            columns.push(series.into());
        }

        Ok(DataFrame::new(columns)?)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

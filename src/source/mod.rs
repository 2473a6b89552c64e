//! Tabular data sources: anything that runs a statement and hands back a table.

pub mod databricks;
pub mod sqlite;
pub mod table;

use std::fmt;

use lazy_static::lazy_static;
use polars::prelude::DataFrame;
use regex::Regex;
use serde::Serialize;

use crate::error::{DashError, Result};

pub use databricks::DatabricksSource;
pub use sqlite::SqliteSource;

/// A value bound to a named `:param` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// SQL text plus bound parameters. Values never get spliced into `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind `value` to `:name`
    pub fn bind(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.params.push((name.trim_start_matches(':').to_string(), value.into()));
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Executes statements against a SQL engine or API and returns a table.
///
/// Implementations must be shareable across sessions.
pub trait TabularSource: Send + Sync {
    fn execute(&self, stmt: &Statement) -> Result<DataFrame>;

    /// Short label used in log lines
    fn name(&self) -> &str;
}

lazy_static! {
    static ref IDENT: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-]*$").unwrap();
}

/// Back-quote a catalog, schema or table name. Identifiers cannot be bound as
/// parameters, so anything outside `[A-Za-z0-9_-]` is refused.
pub fn quote_ident(ident: &str) -> Result<String> {
    if IDENT.is_match(ident) {
        Ok(format!("`{ident}`"))
    } else {
        Err(DashError::validation(format!("invalid identifier: {ident:?}")))
    }
}

/// `a`, `b`, `c` -> `` `a`.`b`.`c` ``
pub fn qualify(parts: &[&str]) -> Result<String> {
    let quoted = parts
        .iter()
        .map(|p| quote_ident(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("main").unwrap(), "`main`");
        assert_eq!(quote_ident("dev-catalog").unwrap(), "`dev-catalog`");
        assert!(quote_ident("x`; DROP TABLE project; --").is_err());
        assert!(quote_ident("").is_err());
        assert!(quote_ident("a.b").is_err());
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify(&["c", "s", "t"]).unwrap(), "`c`.`s`.`t`");
        assert!(qualify(&["c", "bad name"]).is_err());
    }

    #[test]
    fn test_bind_strips_colon() {
        let stmt = Statement::new("SELECT :a, :b").bind(":a", 1i64).bind("b", "x");
        assert_eq!(stmt.params[0], ("a".to_string(), SqlValue::Int(1)));
        assert_eq!(stmt.params[1], ("b".to_string(), SqlValue::Text("x".into())));
    }

    #[test]
    fn test_option_binding() {
        let none: Option<String> = None;
        let stmt = Statement::new("SELECT :ts").bind("ts", none);
        assert_eq!(stmt.params[0].1, SqlValue::Null);
    }

    #[test]
    fn test_display_collapses_whitespace() {
        let stmt = Statement::new("SELECT *\n   FROM t\n WHERE id = :id");
        assert_eq!(stmt.to_string(), "SELECT * FROM t WHERE id = :id");
    }
}

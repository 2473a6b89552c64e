use std::sync::Arc;

use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::debug;

use crate::config::WorkspaceConfig;
use crate::error::Result;
use crate::source::table::{text_at, text_values};
use crate::source::{qualify, quote_ident, DatabricksSource, Statement, TabularSource};

/// A column as reported by `DESCRIBE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn is_timestamp(&self) -> bool {
        is_timestamp_type(&self.data_type)
    }
}

/// True for date and time types (`timestamp`, `date`, `datetime`, `timestamp_ntz`...)
pub fn is_timestamp_type(data_type: &str) -> bool {
    let lower = data_type.to_lowercase();
    ["timestamp", "date", "time"].iter().any(|t| lower.contains(t))
}

/// Walks the warehouse namespace: catalogs, schemas, tables and columns.
#[derive(Clone)]
pub struct CatalogBrowser {
    source: Arc<dyn TabularSource>,
}

impl CatalogBrowser {
    pub fn new(source: Arc<dyn TabularSource>) -> Self {
        Self { source }
    }

    /// Browse the configured SQL warehouse. `SHOW` and `DESCRIBE` only make
    /// sense there, so a missing warehouse is an error rather than a fallback.
    pub fn from_config(cfg: &WorkspaceConfig) -> Result<Self> {
        let source = DatabricksSource::from_config(cfg)?;
        Ok(Self::new(Arc::new(source)))
    }

    fn run(&self, sql: String) -> Result<DataFrame> {
        debug!("catalog: {sql}");
        self.source.execute(&Statement::new(sql))
    }

    pub fn catalogs(&self) -> Result<Vec<String>> {
        Ok(text_values(&self.run("SHOW CATALOGS".to_string())?, 0))
    }

    pub fn schemas(&self, catalog: &str) -> Result<Vec<String>> {
        let df = self.run(format!("SHOW SCHEMAS IN {}", quote_ident(catalog)?))?;
        Ok(text_values(&df, 0))
    }

    /// Table names in `catalog.schema`. `SHOW TABLES` answers
    /// `(database, tableName, isTemporary)`; single-column answers are used as is.
    pub fn tables(&self, catalog: &str, schema: &str) -> Result<Vec<String>> {
        let df = self.run(format!("SHOW TABLES IN {}", qualify(&[catalog, schema])?))?;
        let index = if df.width() >= 2 { 1 } else { 0 };
        Ok(text_values(&df, index))
    }

    pub fn columns(&self, catalog: &str, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let df = self.run(format!("DESCRIBE TABLE {}", qualify(&[catalog, schema, table])?))?;
        Ok(describe_rows(&df))
    }

    /// Output columns of an arbitrary query, without running it
    pub fn describe_query(&self, sql: &str) -> Result<Vec<ColumnInfo>> {
        let body = sql.trim().trim_end_matches(';');
        let df = self.run(format!("DESCRIBE QUERY {body}"))?;
        Ok(describe_rows(&df))
    }
}

/// Column rows of a `DESCRIBE` result, up to the first `#` section.
fn describe_rows(df: &DataFrame) -> Vec<ColumnInfo> {
    let mut out = Vec::new();
    for row in 0..df.height() {
        let name = text_at(df, row, 0).unwrap_or_default().trim().to_string();
        if name.starts_with('#') {
            break;
        }
        if name.is_empty() || name.eq_ignore_ascii_case("col_name") {
            continue;
        }
        let data_type = text_at(df, row, 1)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        out.push(ColumnInfo { name, data_type });
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::DashError;

    /// Answers with a fixed frame and records the SQL it was sent.
    struct Canned {
        df: DataFrame,
        seen: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(df: DataFrame) -> Arc<Self> {
            Arc::new(Self {
                df,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl TabularSource for Canned {
        fn execute(&self, stmt: &Statement) -> Result<DataFrame> {
            self.seen.lock().unwrap().push(stmt.sql.clone());
            Ok(self.df.clone())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_from_config_requires_a_warehouse() {
        let cfg = WorkspaceConfig {
            host: "https://adb.example.net".into(),
            ..Default::default()
        };
        let err = CatalogBrowser::from_config(&cfg).err().unwrap();
        assert!(matches!(&err, DashError::SourceUnavailable(m) if m.contains("no SQL warehouse configured")));
    }

    #[test]
    fn test_tables_use_second_column() {
        let src = Canned::new(
            df!(
                "database" => ["s", "s"],
                "tableName" => ["orders", "customers"],
                "isTemporary" => [false, false]
            )
            .unwrap(),
        );
        let browser = CatalogBrowser::new(src.clone());
        assert_eq!(browser.tables("main", "s").unwrap(), vec!["orders", "customers"]);
        assert_eq!(src.seen.lock().unwrap()[0], "SHOW TABLES IN `main`.`s`");
    }

    #[test]
    fn test_tables_single_column_fallback() {
        let src = Canned::new(df!("name" => ["t1"]).unwrap());
        assert_eq!(CatalogBrowser::new(src).tables("c", "s").unwrap(), vec!["t1"]);
    }

    #[test]
    fn test_describe_skips_headers_and_stops_at_partition_info() {
        let src = Canned::new(
            df!(
                "col_name" => ["customer_id", "ts", "", "col_name", "amount", "# Partition Information", "ts"],
                "data_type" => [Some("bigint"), Some("timestamp"), None, Some("data_type"), None, Some(""), Some("timestamp")],
                "comment" => [None::<&str>, None, None, None, None, None, None]
            )
            .unwrap(),
        );
        let cols = CatalogBrowser::new(src).columns("c", "s", "t").unwrap();
        assert_eq!(
            cols,
            vec![
                ColumnInfo { name: "customer_id".into(), data_type: "bigint".into() },
                ColumnInfo { name: "ts".into(), data_type: "timestamp".into() },
                ColumnInfo { name: "amount".into(), data_type: "Unknown".into() },
            ]
        );
    }

    #[test]
    fn test_describe_query_wraps_sql() {
        let src = Canned::new(df!("col_name" => ["x"], "data_type" => ["int"]).unwrap());
        let browser = CatalogBrowser::new(src.clone());
        browser.describe_query("SELECT x FROM t;").unwrap();
        assert_eq!(src.seen.lock().unwrap()[0], "DESCRIBE QUERY SELECT x FROM t");
    }

    #[test]
    fn test_bad_identifier_never_reaches_source() {
        let src = Canned::new(DataFrame::empty());
        let browser = CatalogBrowser::new(src.clone());
        assert!(matches!(browser.schemas("x; DROP"), Err(DashError::ValidationFailed(_))));
        assert!(src.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_is_timestamp_type() {
        for t in ["timestamp", "TIMESTAMP_NTZ", "date", "datetime", "time"] {
            assert!(is_timestamp_type(t), "{t}");
        }
        for t in ["bigint", "string", "double", "Unknown"] {
            assert!(!is_timestamp_type(t), "{t}");
        }
    }
}

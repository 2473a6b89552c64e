use crate::config::Dialect;
use crate::error::Result;
use crate::services::metadata_store::TableNames;

/// `CREATE TABLE IF NOT EXISTS` statements for the metadata tables.
///
/// One statement per table, since the statement API runs a single statement
/// per request.
pub fn schema_statements(dialect: Dialect, tables: &TableNames) -> Result<Vec<String>> {
    let id = match dialect {
        Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        Dialect::Databricks => "id BIGINT GENERATED ALWAYS AS IDENTITY",
    };
    let (text, int) = match dialect {
        Dialect::Sqlite => ("TEXT", "INTEGER"),
        Dialect::Databricks => ("STRING", "BIGINT"),
    };

    Ok(vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id},
                name {text} NOT NULL,
                description {text},
                catalog {text},
                `schema` {text},
                git_url {text},
                training_notebook {text}
            )",
            table = tables.project()?,
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id},
                name {text} NOT NULL,
                sql_definition {text} NOT NULL,
                project_id {int} NOT NULL
            )",
            table = tables.eol_definition()?,
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id},
                name {text} NOT NULL,
                project_id {int} NOT NULL,
                eol_id {int} NOT NULL,
                table_name {text} NOT NULL,
                feature_names {text} NOT NULL,
                lookup_key {text} NOT NULL,
                timestamp_key {text}
            )",
            table = tables.feature_lookup()?,
        ),
    ])
}

//! Databricks workspace access: the SQL Statement Execution API as a
//! [`TabularSource`], plus the authenticated HTTP client the tracking and jobs
//! services share.

use std::time::Duration;

use polars::prelude::*;
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SqlValue, Statement, TabularSource};
use crate::config::WorkspaceConfig;
use crate::error::{DashError, Result};

/// Host + bearer token + a blocking HTTP client.
#[derive(Debug, Clone)]
pub struct WorkspaceClient {
    host: String,
    token: String,
    http: HttpClient,
}

impl WorkspaceClient {
    pub fn new(host: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    pub fn from_config(cfg: &WorkspaceConfig) -> Result<Self> {
        if !cfg.is_configured() {
            return Err(DashError::source_unavailable("workspace host is not configured"));
        }
        let token = cfg.token().ok_or_else(|| {
            DashError::source_unavailable(format!("no workspace token in ${}", cfg.token_env))
        })?;
        // leave room over the server-side wait
        Self::new(&cfg.host, token, Duration::from_secs(cfg.timeout_secs + 10))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    pub fn get_json<R: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<R> {
        debug!("GET {path}");
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(resp)
    }

    pub fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        debug!("POST {path}");
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(resp)
    }
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    warehouse_id: &'a str,
    statement: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<StatementParameter>,
    wait_timeout: String,
    on_wait_timeout: &'static str,
    disposition: &'static str,
    format: &'static str,
}

#[derive(Debug, Serialize, PartialEq)]
struct StatementParameter {
    name: String,
    // omitted means NULL
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(rename = "type")]
    type_name: &'static str,
}

impl StatementParameter {
    fn new(name: &str, value: &SqlValue) -> Self {
        let (value, type_name) = match value {
            SqlValue::Null => (None, "STRING"),
            SqlValue::Int(v) => (Some(v.to_string()), "BIGINT"),
            SqlValue::Float(v) => (Some(v.to_string()), "DOUBLE"),
            SqlValue::Text(v) => (Some(v.clone()), "STRING"),
            SqlValue::Bool(v) => (Some(v.to_string()), "BOOLEAN"),
        };
        Self {
            name: name.to_string(),
            value,
            type_name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatementResponse {
    #[serde(default)]
    statement_id: String,
    #[serde(default)]
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<StatusError>,
}

#[derive(Debug, Deserialize)]
struct StatusError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    schema: ManifestSchema,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ManifestColumn>,
}

#[derive(Debug, Deserialize)]
struct ManifestColumn {
    name: String,
    #[serde(default)]
    type_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

/// Runs statements on a SQL warehouse through `/api/2.0/sql/statements`.
pub struct DatabricksSource {
    client: WorkspaceClient,
    warehouse_id: String,
    wait_secs: u64,
    label: String,
}

impl DatabricksSource {
    pub fn new(client: WorkspaceClient, warehouse_id: impl Into<String>, wait_secs: u64) -> Self {
        let warehouse_id = warehouse_id.into();
        let label = format!("databricks:{}", warehouse_id);
        Self {
            client,
            warehouse_id,
            // the API accepts 5..=50 seconds
            wait_secs: wait_secs.clamp(5, 50),
            label,
        }
    }

    pub fn from_config(cfg: &WorkspaceConfig) -> Result<Self> {
        if cfg.warehouse_id.trim().is_empty() {
            return Err(DashError::source_unavailable("no SQL warehouse configured"));
        }
        Ok(Self::new(
            WorkspaceClient::from_config(cfg)?,
            cfg.warehouse_id.clone(),
            cfg.timeout_secs,
        ))
    }

    fn request<'a>(&'a self, stmt: &'a Statement) -> StatementRequest<'a> {
        StatementRequest {
            warehouse_id: &self.warehouse_id,
            statement: &stmt.sql,
            parameters: stmt
                .params
                .iter()
                .map(|(name, value)| StatementParameter::new(name, value))
                .collect(),
            wait_timeout: format!("{}s", self.wait_secs),
            on_wait_timeout: "CANCEL",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        }
    }
}

impl TabularSource for DatabricksSource {
    fn execute(&self, stmt: &Statement) -> Result<DataFrame> {
        debug!("{}: {}", self.label, stmt);
        let mut resp: StatementResponse = self.client.post_json("/api/2.0/sql/statements", &self.request(stmt))?;

        // follow chunk links until the inline result is complete
        let mut next = resp.result.as_ref().and_then(|r| r.next_chunk_internal_link.clone());
        while let Some(link) = next {
            let chunk: ResultChunk = self.client.get_json(&link, &[])?;
            next = chunk.next_chunk_internal_link.clone();
            if let Some(result) = resp.result.as_mut() {
                result.data_array.extend(chunk.data_array);
            }
        }

        frame_from_response(resp)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Turn a finished statement response into a typed frame.
pub(crate) fn frame_from_response(resp: StatementResponse) -> Result<DataFrame> {
    if resp.status.state != "SUCCEEDED" {
        let detail = resp.status.error.map(|e| e.message).unwrap_or_default();
        return Err(DashError::SourceUnavailable(format!(
            "statement {} ended in state {}: {}",
            resp.statement_id, resp.status.state, detail
        )));
    }

    let columns = resp.manifest.map(|m| m.schema.columns).unwrap_or_default();
    if columns.is_empty() {
        return Ok(DataFrame::empty());
    }
    let rows = resp.result.map(|r| r.data_array).unwrap_or_default();

    let mut out: Vec<Column> = Vec::with_capacity(columns.len());
    for (i, col) in columns.iter().enumerate() {
        let cells = rows.iter().map(|row| row.get(i).cloned().flatten());
        let name: PlSmallStr = col.name.as_str().into();
        let series = match col.type_name.to_ascii_uppercase().as_str() {
            "BYTE" | "TINYINT" | "SHORT" | "SMALLINT" | "INT" | "INTEGER" | "LONG" | "BIGINT" => {
                let data = cells
                    .map(|c| c.map(|s| parse_cell::<i64>(&col.name, &s)).transpose())
                    .collect::<Result<Vec<Option<i64>>>>()?;
                Series::new(name, data)
            }
            "FLOAT" | "DOUBLE" | "DECIMAL" => {
                let data = cells
                    .map(|c| c.map(|s| parse_cell::<f64>(&col.name, &s)).transpose())
                    .collect::<Result<Vec<Option<f64>>>>()?;
                Series::new(name, data)
            }
            "BOOLEAN" => {
                let data: Vec<Option<bool>> = cells.map(|c| c.map(|s| s.eq_ignore_ascii_case("true"))).collect();
                Series::new(name, data)
            }
            _ => {
                let data: Vec<Option<String>> = cells.collect();
                Series::new(name, data)
            }
        };
        out.push(series.into());
    }
    Ok(DataFrame::new(out)?)
}

fn parse_cell<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| DashError::Decode(format!("column {column}: cannot parse {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::source::table;

    fn response(value: serde_json::Value) -> StatementResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_frame_uses_manifest_types() {
        let resp = response(json!({
            "statement_id": "01ef",
            "status": {"state": "SUCCEEDED"},
            "manifest": {"schema": {"columns": [
                {"name": "id", "type_name": "LONG", "position": 0},
                {"name": "score", "type_name": "DOUBLE", "position": 1},
                {"name": "active", "type_name": "BOOLEAN", "position": 2},
                {"name": "name", "type_name": "STRING", "position": 3}
            ]}},
            "result": {"data_array": [
                ["1", "0.5", "true", "a"],
                [null, "2", "false", null]
            ]}
        }));
        let df = frame_from_response(resp).unwrap();
        assert_eq!(df.shape(), (2, 4));
        assert_eq!(df.column("id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("score").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("active").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(df.column("name").unwrap().dtype(), &DataType::String);
        assert_eq!(table::get_i64(&df, "id", 0).unwrap(), Some(1));
        assert_eq!(table::get_i64(&df, "id", 1).unwrap(), None);
        assert_eq!(table::get_text(&df, "name", 1).unwrap(), None);
    }

    #[test]
    fn test_failed_state_is_source_unavailable() {
        let resp = response(json!({
            "statement_id": "01ef",
            "status": {"state": "FAILED", "error": {"message": "TABLE_OR_VIEW_NOT_FOUND"}}
        }));
        let err = frame_from_response(resp).unwrap_err();
        assert!(matches!(err, DashError::SourceUnavailable(ref m) if m.contains("TABLE_OR_VIEW_NOT_FOUND")));
    }

    #[test]
    fn test_statement_without_result_set() {
        let resp = response(json!({"statement_id": "x", "status": {"state": "SUCCEEDED"}}));
        let df = frame_from_response(resp).unwrap();
        assert_eq!(df.width(), 0);
    }

    #[test]
    fn test_bad_integer_cell_is_decode_error() {
        let resp = response(json!({
            "status": {"state": "SUCCEEDED"},
            "manifest": {"schema": {"columns": [{"name": "id", "type_name": "INT"}]}},
            "result": {"data_array": [["nope"]]}
        }));
        assert!(matches!(frame_from_response(resp), Err(DashError::Decode(_))));
    }

    #[test]
    fn test_request_carries_named_parameters() {
        let client = WorkspaceClient::new("https://example.cloud.databricks.com/", "t", Duration::from_secs(5)).unwrap();
        let source = DatabricksSource::new(client, "wh1", 120);
        let stmt = Statement::new("SELECT * FROM p WHERE id = :id AND ts = :ts")
            .bind("id", 7i64)
            .bind("ts", SqlValue::Null);
        let body = serde_json::to_value(source.request(&stmt)).unwrap();
        assert_eq!(
            body,
            json!({
                "warehouse_id": "wh1",
                "statement": "SELECT * FROM p WHERE id = :id AND ts = :ts",
                "parameters": [
                    {"name": "id", "value": "7", "type": "BIGINT"},
                    {"name": "ts", "type": "STRING"}
                ],
                "wait_timeout": "50s",
                "on_wait_timeout": "CANCEL",
                "disposition": "INLINE",
                "format": "JSON_ARRAY"
            })
        );
        assert_eq!(source.client.host(), "https://example.cloud.databricks.com");
    }
}

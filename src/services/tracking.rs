//! Experiment tracking (runs, logged models) and workspace jobs.
//!
//! The HTTP clients return typed records; the `*_frame` functions pivot
//! those into wide tables whose metric and parameter columns depend on what
//! was logged. [`ExperimentService`] is what views call: it never fails, a
//! remote error turns into an empty table and a warning.

use std::collections::BTreeSet;

use chrono::DateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{TrackingConfig, WorkspaceConfig};
use crate::error::{DashError, Result};
use crate::source::databricks::WorkspaceClient;
use crate::source::table::get_text;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl KeyValue {
    fn as_f64(&self) -> Option<f64> {
        match &self.value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match &self.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunInfo {
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunData {
    #[serde(default)]
    pub metrics: Vec<KeyValue>,
    #[serde(default)]
    pub params: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub info: RunInfo,
    #[serde(default)]
    pub data: RunData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelMetric {
    pub key: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub dataset_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggedModelInfo {
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "creation_timestamp")]
    pub creation_timestamp_ms: Option<i64>,
    #[serde(default, alias = "last_updated_timestamp")]
    pub last_updated_timestamp_ms: Option<i64>,
    #[serde(default, alias = "creator_id")]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metrics: Vec<ModelMetric>,
    #[serde(default)]
    pub params: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggedModelData {
    #[serde(default)]
    pub metrics: Vec<ModelMetric>,
    #[serde(default)]
    pub params: Vec<KeyValue>,
}

/// A logged model. Depending on the server version metrics and params come
/// either under `info` or under `data`; both are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggedModel {
    #[serde(default)]
    pub info: LoggedModelInfo,
    #[serde(default)]
    pub data: LoggedModelData,
}

impl LoggedModel {
    fn metrics(&self) -> impl Iterator<Item = &ModelMetric> {
        self.info.metrics.iter().chain(self.data.metrics.iter())
    }

    fn params(&self) -> impl Iterator<Item = &KeyValue> {
        self.info.params.iter().chain(self.data.params.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub max_concurrent_runs: Option<i64>,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub schedule: Option<JobSchedule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSchedule {
    #[serde(default)]
    pub quartz_cron_expression: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    pub job_id: i64,
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub creator_user_name: Option<String>,
    #[serde(default)]
    pub settings: JobSettings,
}

fn format_millis(ms: Option<i64>) -> Option<String> {
    ms.and_then(DateTime::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// MLflow REST client for one workspace
#[derive(Debug, Clone)]
pub struct MlflowClient {
    client: WorkspaceClient,
}

impl MlflowClient {
    pub fn new(client: WorkspaceClient) -> Self {
        Self { client }
    }

    pub fn experiment_id(&self, name: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Experiment {
            experiment_id: String,
        }
        #[derive(Deserialize)]
        struct GetByNameResponse {
            experiment: Option<Experiment>,
        }

        let resp: GetByNameResponse = self.client.get_json(
            "/api/2.0/mlflow/experiments/get-by-name",
            &[("experiment_name", name.to_string())],
        )?;
        resp.experiment
            .map(|e| e.experiment_id)
            .ok_or_else(|| DashError::NotFound(format!("experiment {name:?}")))
    }

    /// Runs of an experiment, following page tokens up to `max` runs.
    pub fn search_runs(&self, experiment_id: &str, max: usize) -> Result<Vec<Run>> {
        #[derive(Serialize)]
        struct SearchRunsRequest<'a> {
            experiment_ids: [&'a str; 1],
            max_results: usize,
            #[serde(skip_serializing_if = "Option::is_none")]
            page_token: Option<String>,
        }
        #[derive(Deserialize)]
        struct SearchRunsResponse {
            #[serde(default)]
            runs: Vec<Run>,
            #[serde(default)]
            next_page_token: Option<String>,
        }

        let mut runs = Vec::new();
        if max == 0 {
            return Ok(runs);
        }
        let mut page_token = None;
        loop {
            let req = SearchRunsRequest {
                experiment_ids: [experiment_id],
                max_results: (max - runs.len()).min(1000),
                page_token,
            };
            let resp: SearchRunsResponse = self.client.post_json("/api/2.0/mlflow/runs/search", &req)?;
            runs.extend(resp.runs);
            match resp.next_page_token {
                Some(token) if !token.is_empty() && runs.len() < max => page_token = Some(token),
                _ => break,
            }
        }
        runs.truncate(max);
        Ok(runs)
    }

    pub fn search_logged_models(&self, experiment_id: &str, max: usize) -> Result<Vec<LoggedModel>> {
        #[derive(Serialize)]
        struct SearchModelsRequest<'a> {
            experiment_ids: [&'a str; 1],
            max_results: usize,
        }
        #[derive(Deserialize)]
        struct SearchModelsResponse {
            #[serde(default)]
            models: Vec<LoggedModel>,
        }

        let req = SearchModelsRequest {
            experiment_ids: [experiment_id],
            max_results: max,
        };
        let resp: SearchModelsResponse = self.client.post_json("/api/2.0/mlflow/logged-models/search", &req)?;
        Ok(resp.models)
    }
}

/// Jobs API client
#[derive(Debug, Clone)]
pub struct WorkspaceJobs {
    client: WorkspaceClient,
}

impl WorkspaceJobs {
    pub fn new(client: WorkspaceClient) -> Self {
        Self { client }
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        #[derive(Deserialize)]
        struct ListJobsResponse {
            #[serde(default)]
            jobs: Vec<Job>,
            #[serde(default)]
            has_more: bool,
            #[serde(default)]
            next_page_token: Option<String>,
        }

        let mut jobs = Vec::new();
        let mut query = vec![("limit", "100".to_string())];
        loop {
            let resp: ListJobsResponse = self.client.get_json("/api/2.1/jobs/list", &query)?;
            jobs.extend(resp.jobs);
            match resp.next_page_token {
                Some(token) if resp.has_more => {
                    query = vec![("limit", "100".to_string()), ("page_token", token)];
                }
                _ => break,
            }
        }
        Ok(jobs)
    }

    /// Trigger a job and return the id of the new run
    pub fn run_now(&self, job_id: i64) -> Result<i64> {
        #[derive(Serialize)]
        struct RunNowRequest {
            job_id: i64,
        }
        #[derive(Deserialize)]
        struct RunNowResponse {
            run_id: i64,
        }

        let resp: RunNowResponse = self.client.post_json("/api/2.1/jobs/run-now", &RunNowRequest { job_id })?;
        info!("started run {} of job {job_id}", resp.run_id);
        Ok(resp.run_id)
    }
}

/// `run_name, run_id, status, start_time, end_time, metric_*, param_*`
pub fn runs_frame(runs: &[Run]) -> Result<DataFrame> {
    let metric_keys: BTreeSet<&str> = runs
        .iter()
        .flat_map(|r| r.data.metrics.iter().map(|m| m.key.as_str()))
        .collect();
    let param_keys: BTreeSet<&str> = runs
        .iter()
        .flat_map(|r| r.data.params.iter().map(|p| p.key.as_str()))
        .collect();

    let mut columns: Vec<Column> = vec![
        Series::new("run_name".into(), runs.iter().map(|r| r.info.run_name.clone()).collect::<Vec<_>>()).into(),
        Series::new("run_id".into(), runs.iter().map(|r| r.info.run_id.clone()).collect::<Vec<_>>()).into(),
        Series::new("status".into(), runs.iter().map(|r| r.info.status.clone()).collect::<Vec<_>>()).into(),
        Series::new(
            "start_time".into(),
            runs.iter().map(|r| format_millis(r.info.start_time)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "end_time".into(),
            runs.iter().map(|r| format_millis(r.info.end_time)).collect::<Vec<_>>(),
        )
        .into(),
    ];

    for key in metric_keys {
        let values: Vec<Option<f64>> = runs
            .iter()
            .map(|r| r.data.metrics.iter().find(|m| m.key == key).and_then(KeyValue::as_f64))
            .collect();
        columns.push(Series::new(format!("metric_{key}").into(), values).into());
    }
    for key in param_keys {
        let values: Vec<Option<String>> = runs
            .iter()
            .map(|r| r.data.params.iter().find(|p| p.key == key).and_then(KeyValue::as_text))
            .collect();
        columns.push(Series::new(format!("param_{key}").into(), values).into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Identity columns, then one column per observed `(dataset, metric)`
/// combination (`<dataset>_<metric>` or bare `<metric>`), then `param_*`.
pub fn logged_models_frame(models: &[LoggedModel]) -> Result<DataFrame> {
    // (dataset or "", metric) sorts like the display grouping expects
    let combos: BTreeSet<(String, String)> = models
        .iter()
        .flat_map(|m| m.metrics().map(|x| (x.dataset_name.clone().unwrap_or_default(), x.key.clone())))
        .collect();
    let param_keys: BTreeSet<String> = models.iter().flat_map(|m| m.params().map(|p| p.key.clone())).collect();

    let user_id = |m: &LoggedModel| match &m.info.user_id {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    let mut columns: Vec<Column> = vec![
        Series::new("model_id".into(), models.iter().map(|m| m.info.model_id.clone()).collect::<Vec<_>>()).into(),
        Series::new("model_name".into(), models.iter().map(|m| m.info.name.clone()).collect::<Vec<_>>()).into(),
        Series::new(
            "creation_timestamp".into(),
            models.iter().map(|m| format_millis(m.info.creation_timestamp_ms)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "last_updated_timestamp".into(),
            models.iter().map(|m| format_millis(m.info.last_updated_timestamp_ms)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("user_id".into(), models.iter().map(user_id).collect::<Vec<_>>()).into(),
        Series::new(
            "description".into(),
            models.iter().map(|m| m.info.description.clone().unwrap_or_default()).collect::<Vec<_>>(),
        )
        .into(),
    ];

    // `train` + `auc` and a bare `train_auc` share one column, the later
    // value wins per row. Model fields keep their names.
    let mut metric_columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for (dataset, metric) in &combos {
        let name = if dataset.is_empty() {
            metric.clone()
        } else {
            format!("{dataset}_{metric}")
        };
        if columns.iter().any(|c| c.name().as_str() == name) {
            debug!("metric {name} shadows a model field, skipped");
            continue;
        }
        let values = models.iter().map(|m| {
            m.metrics()
                .find(|x| &x.key == metric && x.dataset_name.as_deref().unwrap_or_default() == dataset.as_str())
                .and_then(|x| x.value)
        });
        match metric_columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, merged)) => {
                for (slot, value) in merged.iter_mut().zip(values) {
                    if value.is_some() {
                        *slot = value;
                    }
                }
            }
            None => metric_columns.push((name, values.collect())),
        }
    }
    for (name, values) in metric_columns {
        columns.push(Series::new(name.into(), values).into());
    }
    for key in &param_keys {
        let name = format!("param_{key}");
        if columns.iter().any(|c| c.name().as_str() == name) {
            debug!("parameter {key} shadows an existing column, skipped");
            continue;
        }
        let values: Vec<Option<String>> = models
            .iter()
            .map(|m| m.params().find(|p| &p.key == key).and_then(KeyValue::as_text))
            .collect();
        columns.push(Series::new(name.into(), values).into());
    }

    Ok(DataFrame::new(columns)?)
}

pub fn jobs_frame(jobs: &[Job]) -> Result<DataFrame> {
    let columns: Vec<Column> = vec![
        Series::new("job_id".into(), jobs.iter().map(|j| j.job_id).collect::<Vec<_>>()).into(),
        Series::new(
            "job_name".into(),
            jobs.iter()
                .map(|j| j.settings.name.clone().unwrap_or_else(|| "Unnamed Job".to_string()))
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "created_time".into(),
            jobs.iter().map(|j| format_millis(j.created_time)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "creator_user_name".into(),
            jobs.iter().map(|j| j.creator_user_name.clone()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "max_concurrent_runs".into(),
            jobs.iter().map(|j| j.settings.max_concurrent_runs).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "timeout_seconds".into(),
            jobs.iter().map(|j| j.settings.timeout_seconds).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "schedule".into(),
            jobs.iter()
                .map(|j| j.settings.schedule.as_ref().and_then(|s| s.quartz_cron_expression.clone()))
                .collect::<Vec<_>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Run counts by status and the span of start times
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentSummary {
    pub experiment_name: String,
    pub total_runs: usize,
    pub completed_runs: usize,
    pub failed_runs: usize,
    pub running_runs: usize,
    pub first_start: Option<String>,
    pub last_start: Option<String>,
}

impl ExperimentSummary {
    pub fn from_runs(experiment_name: &str, runs: &DataFrame) -> Result<Self> {
        let mut summary = Self {
            experiment_name: experiment_name.to_string(),
            total_runs: runs.height(),
            ..Self::default()
        };
        if runs.height() == 0 {
            return Ok(summary);
        }
        let mut starts = BTreeSet::new();
        for row in 0..runs.height() {
            match get_text(runs, "status", row)?.as_deref() {
                Some("FINISHED") => summary.completed_runs += 1,
                Some("FAILED") => summary.failed_runs += 1,
                Some("RUNNING") => summary.running_runs += 1,
                _ => {}
            }
            if let Some(start) = get_text(runs, "start_time", row)? {
                starts.insert(start);
            }
        }
        summary.first_start = starts.first().cloned();
        summary.last_start = starts.last().cloned();
        Ok(summary)
    }
}

/// Read side used by the dashboard views.
pub struct ExperimentService {
    mlflow: Option<MlflowClient>,
    jobs: Option<WorkspaceJobs>,
    tracking: TrackingConfig,
}

impl ExperimentService {
    pub fn new(client: Option<WorkspaceClient>, tracking: TrackingConfig) -> Self {
        Self {
            mlflow: client.clone().map(MlflowClient::new),
            jobs: client.map(WorkspaceJobs::new),
            tracking,
        }
    }

    /// Build from config; a workspace that is not configured yields a
    /// service whose views are all empty.
    pub fn from_config(workspace: &WorkspaceConfig, tracking: TrackingConfig) -> Self {
        let client = match WorkspaceClient::from_config(workspace) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("tracking views disabled: {e}");
                None
            }
        };
        Self::new(client, tracking)
    }

    pub fn experiment_name(&self) -> &str {
        &self.tracking.experiment_name
    }

    pub fn jobs_client(&self) -> Option<&WorkspaceJobs> {
        self.jobs.as_ref()
    }

    fn try_runs(&self) -> Result<DataFrame> {
        let mlflow = self
            .mlflow
            .as_ref()
            .ok_or_else(|| DashError::source_unavailable("no workspace configured"))?;
        let id = mlflow.experiment_id(&self.tracking.experiment_name)?;
        runs_frame(&mlflow.search_runs(&id, self.tracking.max_runs)?)
    }

    fn try_logged_models(&self) -> Result<DataFrame> {
        let mlflow = self
            .mlflow
            .as_ref()
            .ok_or_else(|| DashError::source_unavailable("no workspace configured"))?;
        let id = mlflow.experiment_id(&self.tracking.experiment_name)?;
        logged_models_frame(&mlflow.search_logged_models(&id, self.tracking.max_models)?)
    }

    fn try_jobs(&self) -> Result<DataFrame> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| DashError::source_unavailable("no workspace configured"))?;
        jobs_frame(&jobs.list_jobs()?)
    }

    pub fn runs(&self) -> DataFrame {
        self.try_runs().unwrap_or_else(|e| {
            warn!("runs of {:?} unavailable: {e}", self.tracking.experiment_name);
            DataFrame::empty()
        })
    }

    pub fn logged_models(&self) -> DataFrame {
        self.try_logged_models().unwrap_or_else(|e| {
            warn!("logged models of {:?} unavailable: {e}", self.tracking.experiment_name);
            DataFrame::empty()
        })
    }

    pub fn jobs(&self) -> DataFrame {
        self.try_jobs().unwrap_or_else(|e| {
            warn!("jobs unavailable: {e}");
            DataFrame::empty()
        })
    }

    pub fn summary(&self) -> ExperimentSummary {
        let runs = self.runs();
        ExperimentSummary::from_runs(&self.tracking.experiment_name, &runs).unwrap_or_else(|e| {
            warn!("cannot summarise runs: {e}");
            ExperimentSummary {
                experiment_name: self.tracking.experiment_name.clone(),
                ..ExperimentSummary::default()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::source::table::{column_names, get_text};

    fn runs() -> Vec<Run> {
        serde_json::from_value(json!([
            {
                "info": {"run_id": "r1", "run_name": "first", "status": "FINISHED", "start_time": 1700000000000i64, "end_time": 1700000060000i64},
                "data": {"metrics": [{"key": "rmse", "value": 0.5}], "params": [{"key": "depth", "value": "4"}]}
            },
            {
                "info": {"run_id": "r2", "run_name": "second", "status": "FAILED", "start_time": 1700000100000i64},
                "data": {"metrics": [{"key": "auc", "value": 0.9}]}
            },
            {
                "info": {"run_id": "r3", "status": "RUNNING", "start_time": 1600000000000i64}
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_runs_frame_pivots_metrics_and_params() {
        let df = runs_frame(&runs()).unwrap();
        assert_eq!(
            column_names(&df),
            vec!["run_name", "run_id", "status", "start_time", "end_time", "metric_auc", "metric_rmse", "param_depth"]
        );
        assert_eq!(df.height(), 3);
        assert_eq!(get_text(&df, "start_time", 0).unwrap().as_deref(), Some("2023-11-14 22:13:20"));
        assert_eq!(get_text(&df, "end_time", 1).unwrap(), None);
        assert_eq!(get_text(&df, "param_depth", 0).unwrap().as_deref(), Some("4"));
        assert_eq!(df.column("metric_rmse").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_summary_counts_by_status() {
        let df = runs_frame(&runs()).unwrap();
        let summary = ExperimentSummary::from_runs("exp", &df).unwrap();
        assert_eq!(summary.total_runs, 3);
        assert_eq!(summary.completed_runs, 1);
        assert_eq!(summary.failed_runs, 1);
        assert_eq!(summary.running_runs, 1);
        assert_eq!(summary.first_start.as_deref(), Some("2020-09-13 12:26:40"));
        assert_eq!(summary.last_start.as_deref(), Some("2023-11-14 22:15:00"));
    }

    #[test]
    fn test_summary_of_empty_frame() {
        let summary = ExperimentSummary::from_runs("exp", &DataFrame::empty()).unwrap();
        assert_eq!(summary.total_runs, 0);
        assert_eq!(summary.first_start, None);
    }

    #[test]
    fn test_logged_models_frame_orders_dataset_metrics() {
        let models: Vec<LoggedModel> = serde_json::from_value(json!([
            {
                "info": {
                    "model_id": "m-1", "name": "rf", "creation_timestamp_ms": 1700000000000i64,
                    "creator_id": 42,
                    "metrics": [
                        {"key": "auc", "value": 0.8, "dataset_name": "train"},
                        {"key": "auc", "value": 0.7, "dataset_name": "eval"},
                        {"key": "loss", "value": 0.1}
                    ],
                    "params": [{"key": "max_depth", "value": "6"}]
                }
            },
            {
                "info": {"model_id": "m-2", "name": "gbm"},
                "data": {"metrics": [{"key": "auc", "value": 0.9, "dataset_name": "eval"}]}
            }
        ]))
        .unwrap();
        let df = logged_models_frame(&models).unwrap();
        assert_eq!(
            column_names(&df),
            vec![
                "model_id", "model_name", "creation_timestamp", "last_updated_timestamp", "user_id", "description",
                "loss", "eval_auc", "train_auc", "param_max_depth"
            ]
        );
        assert_eq!(get_text(&df, "user_id", 0).unwrap().as_deref(), Some("42"));
        let eval_auc = df.column("eval_auc").unwrap().as_materialized_series().f64().unwrap().clone();
        assert_eq!(eval_auc.get(0), Some(0.7));
        assert_eq!(eval_auc.get(1), Some(0.9));
        assert_eq!(get_text(&df, "train_auc", 1).unwrap(), None);
        assert_eq!(get_text(&df, "description", 1).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_logged_models_frame_merges_colliding_metric_names() {
        let models: Vec<LoggedModel> = serde_json::from_value(json!([
            {
                "info": {
                    "model_id": "m-1", "name": "rf",
                    "metrics": [
                        {"key": "auc", "value": 0.8, "dataset_name": "train"},
                        {"key": "train_auc", "value": 0.85},
                        {"key": "description", "value": 1.0}
                    ]
                }
            },
            {
                "info": {
                    "model_id": "m-2", "name": "gbm",
                    "metrics": [{"key": "train_auc", "value": 0.6}]
                }
            }
        ]))
        .unwrap();
        let df = logged_models_frame(&models).unwrap();
        assert_eq!(
            column_names(&df),
            vec![
                "model_id", "model_name", "creation_timestamp", "last_updated_timestamp", "user_id", "description",
                "train_auc"
            ]
        );
        let train_auc = df.column("train_auc").unwrap().as_materialized_series().f64().unwrap().clone();
        assert_eq!(train_auc.get(0), Some(0.8));
        assert_eq!(train_auc.get(1), Some(0.6));
        assert_eq!(get_text(&df, "description", 0).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_jobs_frame_defaults_name() {
        let jobs: Vec<Job> = serde_json::from_value(json!([
            {"job_id": 7, "settings": {"name": "retrain", "schedule": {"quartz_cron_expression": "0 0 * * * ?"}}},
            {"job_id": 8}
        ]))
        .unwrap();
        let df = jobs_frame(&jobs).unwrap();
        assert_eq!(get_text(&df, "job_name", 1).unwrap().as_deref(), Some("Unnamed Job"));
        assert_eq!(get_text(&df, "schedule", 0).unwrap().as_deref(), Some("0 0 * * * ?"));
    }

    #[test]
    fn test_unconfigured_service_returns_empty_views() {
        let service = ExperimentService::new(None, TrackingConfig::default());
        assert_eq!(service.runs().height(), 0);
        assert_eq!(service.logged_models().width(), 0);
        assert_eq!(service.jobs().height(), 0);
        assert_eq!(service.summary().total_runs, 0);
        assert_eq!(service.summary().experiment_name, "/ML/mlflow_workshop/mlflow3-ml-example");
    }
}

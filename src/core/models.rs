use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::core::types::{EolId, FeatureLookupId, ProjectId};
use crate::error::{DashError, Result};
use crate::source::table::{get_text, require_i64, text_or_empty};

/// Editable fields of a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub catalog: String,
    pub schema: String,
    pub git_url: String,
    pub training_notebook: String,
}

/// A project row in the metadata store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    #[serde(flatten)]
    pub fields: ProjectDraft,
}

impl Project {
    /// Read every row of a `project` result frame
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        (0..df.height())
            .map(|row| {
                Ok(Self {
                    id: ProjectId(require_i64(df, "id", row)?),
                    fields: ProjectDraft {
                        name: text_or_empty(df, "name", row)?,
                        description: text_or_empty(df, "description", row)?,
                        catalog: text_or_empty(df, "catalog", row)?,
                        schema: text_or_empty(df, "schema", row)?,
                        git_url: text_or_empty(df, "git_url", row)?,
                        training_notebook: text_or_empty(df, "training_notebook", row)?,
                    },
                })
            })
            .collect()
    }
}

/// A named SQL view definition for an entity observation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EolDefinition {
    pub id: EolId,
    pub name: String,
    pub sql_definition: String,
    pub project_id: ProjectId,
}

impl EolDefinition {
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        (0..df.height())
            .map(|row| {
                Ok(Self {
                    id: EolId(require_i64(df, "id", row)?),
                    name: text_or_empty(df, "name", row)?,
                    sql_definition: text_or_empty(df, "sql_definition", row)?,
                    project_id: ProjectId(require_i64(df, "project_id", row)?),
                })
            })
            .collect()
    }
}

/// A persisted feature lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLookupRecord {
    pub id: FeatureLookupId,
    pub name: String,
    pub project_id: ProjectId,
    pub eol_id: EolId,
    pub table_name: String,
    pub feature_names: Vec<String>,
    pub lookup_key: String,
    pub timestamp_key: Option<String>,
}

impl FeatureLookupRecord {
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        (0..df.height())
            .map(|row| {
                let raw_features = text_or_empty(df, "feature_names", row)?;
                let feature_names: Vec<String> = serde_json::from_str(&raw_features).map_err(|e| {
                    DashError::Decode(format!("feature_names at row {row} is not a JSON list: {e}"))
                })?;
                Ok(Self {
                    id: FeatureLookupId(require_i64(df, "id", row)?),
                    name: text_or_empty(df, "name", row)?,
                    project_id: ProjectId(require_i64(df, "project_id", row)?),
                    eol_id: EolId(require_i64(df, "eol_id", row)?),
                    table_name: text_or_empty(df, "table_name", row)?,
                    feature_names,
                    lookup_key: text_or_empty(df, "lookup_key", row)?,
                    timestamp_key: get_text(df, "timestamp_key", row)?.filter(|s| !s.is_empty()),
                })
            })
            .collect()
    }
}

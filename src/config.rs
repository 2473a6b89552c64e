use std::{env, fs, path::PathBuf};

use directories::BaseDirs;
use lazy_static::lazy_static;
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::columns::ClassifierConfig;
use crate::services::metadata_store::TableNames;

const CONFIG: &str = include_str!("../.config/config.json5");

/// SQL flavour spoken by the metadata store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Databricks,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

impl DatabaseConfig {
    pub fn table_names(&self) -> TableNames {
        TableNames::new(self.catalog.clone(), self.schema.clone())
    }

    /// Sqlite file path with `~` expanded; relative paths resolve against the data dir.
    pub fn sqlite_path(&self) -> PathBuf {
        match &self.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) if p.starts_with("~") => expand_tilde(p),
            Some(p) => get_data_dir().join(p),
            None => get_data_dir().join(format!("{}.sqlite", env!("CARGO_PKG_NAME"))),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub warehouse_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token_env: default_token_env(),
            warehouse_id: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WorkspaceConfig {
    /// Bearer token read from the configured environment variable
    pub fn token(&self) -> Option<String> {
        match env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Some(token),
            _ => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

fn default_token_env() -> String {
    "DATABRICKS_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    50
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackingConfig {
    pub experiment_name: String,
    #[serde(default = "default_max_runs")]
    pub max_runs: usize,
    #[serde(default = "default_max_models")]
    pub max_models: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            experiment_name: "/ML/mlflow_workshop/mlflow3-ml-example".to_string(),
            max_runs: default_max_runs(),
            max_models: default_max_models(),
        }
    }
}

fn default_max_runs() -> usize {
    1000
}

// The logged-models search rejects large pages
fn default_max_models() -> usize {
    10
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub columns: ClassifierConfig,
}

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

impl Config {
    /// Layer embedded defaults, the user file and `MLOPSDASH__*` environment overrides.
    pub fn from_path(config_path: Option<&PathBuf>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        let (selected_path, required) = if let Some(p) = config_path {
            (expand_tilde(p), true)
        } else {
            let home_cfg = default_home_config_path();
            if !home_cfg.exists() {
                if let Some(parent) = home_cfg.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                let _ = fs::write(&home_cfg, CONFIG);
            }
            (home_cfg, false)
        };

        builder = builder
            .add_source(
                config::File::from(selected_path)
                    .format(config::FileFormat::Json5)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(PROJECT_NAME.as_str())
                    .prefix_separator("__")
                    .separator("__"),
            );

        builder.build()?.try_deserialize()
    }
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Some(s) = path.to_str() {
        if s.starts_with('~') {
            if let Some(base) = BaseDirs::new() {
                return PathBuf::from(s.replacen('~', base.home_dir().to_str().unwrap_or(""), 1));
            }
        }
    }
    path.clone()
}

/// `$MLOPSDASH_CONFIG/config.json5` when set, `~/.mlopsdash-config.json5` otherwise
fn default_home_config_path() -> PathBuf {
    if let Some(dir) = CONFIG_FOLDER.clone() {
        return dir.join("config.json5");
    }
    let file_name = format!(".{}-config.json5", env!("CARGO_PKG_NAME"));
    if let Some(base) = BaseDirs::new() {
        return base.home_dir().join(file_name);
    }
    PathBuf::from(file_name)
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = DATA_FOLDER.clone() {
        s
    } else {
        PathBuf::from(".").join(".data")
    }
}

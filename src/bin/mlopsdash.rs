use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;
use tracing::debug;

use mlopsdash::columns::{plain_columns, ColumnClassifier};
use mlopsdash::config::{Config, Dialect};
use mlopsdash::core::{EolId, FeatureLookupId, ProjectDraft, ProjectId};
use mlopsdash::selector::loaders::{CATALOG, COLUMNS, EOL_DEFINITION, FEATURE_COLUMNS, LOOKUP_KEY, SCHEMA, TABLE, TIMESTAMP_KEY};
use mlopsdash::selector::Choice;
use mlopsdash::services::tracking::ExperimentSummary;
use mlopsdash::services::{CatalogBrowser, ExperimentService, MetadataStore};
use mlopsdash::session::{FeatureLookupForm, SessionRegistry};
use mlopsdash::source::table::column_names;
use mlopsdash::source::{DatabricksSource, SqliteSource, TabularSource};

/// MLOps dashboard core: projects, EOL definitions, feature lookups and
/// experiment tracking views.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable file logging at the given level (overrides RUST_LOG)
    #[arg(long = "logging", value_enum)]
    logging: Option<LogLevel>,
    /// Path to a config file (overrides default config discovery)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Subcommand, Debug)]
enum Command {
    /// Group and label logged-model column names for display
    Columns {
        names: Vec<String>,
    },
    /// Create the metadata tables
    InitDb,
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectCmd,
    },
    /// Manage EOL definitions
    Eol {
        #[command(subcommand)]
        action: EolCmd,
    },
    /// Saved feature lookups
    Lookup {
        #[command(subcommand)]
        action: LookupCmd,
    },
    /// Build a feature lookup through both selector chains and save it
    Build(BuildArgs),
    /// Browse catalogs, schemas, tables and columns
    Catalog {
        catalog: Option<String>,
        schema: Option<String>,
        table: Option<String>,
    },
    /// Runs of the tracked experiment
    Runs {
        #[arg(long)]
        summary: bool,
    },
    /// Logged models of the tracked experiment
    Models {
        #[arg(long)]
        summary: bool,
    },
    /// Workspace jobs
    Jobs {
        #[command(subcommand)]
        action: JobsCmd,
    },
}

#[derive(ClapArgs, Debug)]
struct ProjectFields {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    catalog: String,
    #[arg(long, default_value = "")]
    schema: String,
    #[arg(long, default_value = "")]
    git_url: String,
    #[arg(long, default_value = "")]
    training_notebook: String,
}

impl From<ProjectFields> for ProjectDraft {
    fn from(f: ProjectFields) -> Self {
        Self {
            name: f.name,
            description: f.description,
            catalog: f.catalog,
            schema: f.schema,
            git_url: f.git_url,
            training_notebook: f.training_notebook,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ProjectCmd {
    List,
    Create(ProjectFields),
    Update {
        id: i64,
        #[command(flatten)]
        fields: ProjectFields,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum EolCmd {
    List {
        #[arg(long)]
        project: Option<i64>,
    },
    Create {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        sql: String,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        sql: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum LookupCmd {
    List {
        #[arg(long)]
        project: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum JobsCmd {
    List,
    Run {
        job_id: i64,
    },
}

#[derive(ClapArgs, Debug)]
struct BuildArgs {
    #[arg(long)]
    project: i64,
    #[arg(long)]
    eol: i64,
    #[arg(long)]
    catalog: String,
    #[arg(long)]
    schema: String,
    #[arg(long)]
    table: String,
    /// Feature columns of the source table
    #[arg(long, value_delimiter = ',', required = true)]
    columns: Vec<String>,
    /// EOL columns to offer as join keys (defaults to the lookup and timestamp keys)
    #[arg(long, value_delimiter = ',')]
    eol_columns: Vec<String>,
    #[arg(long)]
    lookup_key: String,
    #[arg(long)]
    timestamp_key: Option<String>,
    /// Name the lookup is saved under
    #[arg(long)]
    name: String,
    /// Print the pending lookup without saving it
    #[arg(long)]
    dry_run: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn metadata_source(cfg: &Config) -> Result<Arc<dyn TabularSource>> {
    let source: Arc<dyn TabularSource> = match cfg.database.dialect {
        Dialect::Sqlite => Arc::new(SqliteSource::open(&cfg.database.sqlite_path())?),
        Dialect::Databricks => Arc::new(DatabricksSource::from_config(&cfg.workspace)?),
    };
    debug!("metadata source: {}", source.name());
    Ok(source)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let level = match args.logging {
        Some(LogLevel::Error) => Some(tracing::Level::ERROR),
        Some(LogLevel::Warn)  => Some(tracing::Level::WARN),
        Some(LogLevel::Info)  => Some(tracing::Level::INFO),
        Some(LogLevel::Debug) => Some(tracing::Level::DEBUG),
        Some(LogLevel::Trace) => Some(tracing::Level::TRACE),
        None => Some(tracing::Level::WARN),
    };
    mlopsdash::logging::init_with(None, level)?;

    let cfg = Config::from_path(args.config.as_ref())?;
    let classifier = ColumnClassifier::new(cfg.columns.clone());

    match args.command {
        Command::Columns { names } => print_json(&classifier.classify_and_group(&names)),
        Command::InitDb => {
            let store = MetadataStore::new(metadata_source(&cfg)?, cfg.database.table_names());
            store.init_schema(cfg.database.dialect)?;
            println!("metadata tables ready");
            Ok(())
        }
        Command::Project { action } => {
            let store = MetadataStore::new(metadata_source(&cfg)?, cfg.database.table_names());
            match action {
                ProjectCmd::List => print_json(&store.list_projects()?),
                ProjectCmd::Create(fields) => {
                    let id = store.create_project(&fields.into())?;
                    print_json(&store.get_project(id)?)
                }
                ProjectCmd::Update { id, fields } => {
                    store.update_project(ProjectId(id), &fields.into())?;
                    print_json(&store.get_project(ProjectId(id))?)
                }
                ProjectCmd::Delete { id } => {
                    store.delete_project(ProjectId(id))?;
                    println!("deleted project {id}");
                    Ok(())
                }
            }
        }
        Command::Eol { action } => {
            let store = MetadataStore::new(metadata_source(&cfg)?, cfg.database.table_names());
            match action {
                EolCmd::List { project } => print_json(&store.list_eol_definitions(project.map(ProjectId))?),
                EolCmd::Create { project, name, sql } => {
                    let id = store.create_eol_definition(ProjectId(project), &name, &sql)?;
                    print_json(&store.get_eol_definition(id)?)
                }
                EolCmd::Update { id, name, sql } => {
                    store.update_eol_definition(EolId(id), &name, &sql)?;
                    print_json(&store.get_eol_definition(EolId(id))?)
                }
                EolCmd::Delete { id } => {
                    store.delete_eol_definition(EolId(id))?;
                    println!("deleted EOL definition {id}");
                    Ok(())
                }
            }
        }
        Command::Lookup { action } => {
            let store = MetadataStore::new(metadata_source(&cfg)?, cfg.database.table_names());
            match action {
                LookupCmd::List { project } => print_json(&store.list_feature_lookups(ProjectId(project))?),
                LookupCmd::Delete { id } => {
                    store.delete_feature_lookup(FeatureLookupId(id))?;
                    println!("deleted feature lookup {id}");
                    Ok(())
                }
            }
        }
        Command::Build(build) => run_build(&cfg, build),
        Command::Catalog { catalog, schema, table } => {
            let browser = CatalogBrowser::from_config(&cfg.workspace)?;
            match (catalog, schema, table) {
                (Some(c), Some(s), Some(t)) => print_json(&browser.columns(&c, &s, &t)?),
                (Some(c), Some(s), None) => print_json(&browser.tables(&c, &s)?),
                (Some(c), None, _) => print_json(&browser.schemas(&c)?),
                _ => print_json(&browser.catalogs()?),
            }
        }
        Command::Runs { summary } => {
            let service = ExperimentService::from_config(&cfg.workspace, cfg.tracking.clone());
            let runs = service.runs();
            if summary {
                print_json(&ExperimentSummary::from_runs(service.experiment_name(), &runs)?)
            } else {
                print_json(&plain_columns(column_names(&runs)))?;
                println!("{runs}");
                Ok(())
            }
        }
        Command::Models { summary } => {
            let service = ExperimentService::from_config(&cfg.workspace, cfg.tracking.clone());
            let models = service.logged_models();
            let names = column_names(&models);
            if summary {
                print_json(&classifier.group_metrics_by_dataset(&names))
            } else {
                let display = classifier.classify_and_group(&names);
                let ordered = models.select(display.iter().map(|c| c.field.as_str()))?;
                print_json(&display)?;
                println!("{ordered}");
                Ok(())
            }
        }
        Command::Jobs { action } => {
            let service = ExperimentService::from_config(&cfg.workspace, cfg.tracking.clone());
            match action {
                JobsCmd::List => {
                    println!("{}", service.jobs());
                    Ok(())
                }
                JobsCmd::Run { job_id } => {
                    let jobs = service
                        .jobs_client()
                        .ok_or_else(|| eyre!("no workspace configured"))?;
                    println!("started run {}", jobs.run_now(job_id)?);
                    Ok(())
                }
            }
        }
    }
}

/// Drive both selector chains the way the form does, one stage at a time.
fn run_build(cfg: &Config, build: BuildArgs) -> Result<()> {
    let meta = metadata_source(cfg)?;
    let store = MetadataStore::new(meta.clone(), cfg.database.table_names());
    let browser = CatalogBrowser::from_config(&cfg.workspace)?;

    let registry = SessionRegistry::new();
    let session_id = registry.open(Some(ProjectId(build.project)))?;

    let eol_columns = if build.eol_columns.is_empty() {
        let mut cols = vec![build.lookup_key.clone()];
        cols.extend(build.timestamp_key.clone());
        cols
    } else {
        build.eol_columns.clone()
    };

    let outcome = registry.with_session(session_id, |session| -> Result<()> {
        let mut form = FeatureLookupForm::new(session, &store, &browser);
        form.start();

        let table_steps = [
            (CATALOG, Choice::one(&build.catalog)),
            (SCHEMA, Choice::one(&build.schema)),
            (TABLE, Choice::one(&build.table)),
            (COLUMNS, Choice::many(build.columns.iter().cloned())),
        ];
        for (stage, (name, choice)) in table_steps.into_iter().enumerate() {
            form.select_table_stage(stage, Some(choice))
                .map_err(|e| eyre!("{name}: {e}"))?;
        }

        let mut eol_steps = vec![
            (EOL_DEFINITION, Choice::one(EolId(build.eol).to_string())),
            (FEATURE_COLUMNS, Choice::many(eol_columns.iter().cloned())),
            (LOOKUP_KEY, Choice::one(&build.lookup_key)),
        ];
        if let Some(ts) = &build.timestamp_key {
            eol_steps.push((TIMESTAMP_KEY, Choice::one(ts)));
        }
        for (stage, (name, choice)) in eol_steps.into_iter().enumerate() {
            form.select_eol_stage(stage, Some(choice))
                .map_err(|e| eyre!("{name}: {e}"))?;
        }

        form.commit_entry()?;
        let view = form.view();
        println!("{}", view.canonical_text);
        if build.dry_run {
            return Ok(());
        }
        let saved = form.save(&build.name)?;
        println!("saved {saved} feature lookup(s) as {:?}", build.name);
        Ok(())
    })?;

    registry.close(session_id)?;
    outcome
}

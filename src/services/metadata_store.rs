use std::sync::Arc;

use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::config::Dialect;
use crate::core::schema::schema_statements;
use crate::core::{EolDefinition, EolId, FeatureLookupId, FeatureLookupRecord, Project, ProjectDraft, ProjectId};
use crate::error::{DashError, Result};
use crate::lookup::FeatureLookupEntry;
use crate::source::{quote_ident, qualify, Statement, TabularSource};
use crate::source::table::require_i64;

/// Optional catalog/schema qualifier for the metadata tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableNames {
    catalog: Option<String>,
    schema: Option<String>,
}

impl TableNames {
    pub fn new(catalog: Option<String>, schema: Option<String>) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            catalog: clean(catalog),
            schema: clean(schema),
        }
    }

    /// `catalog.schema.table`, `schema.table` or `table`; a catalog without
    /// a schema is ignored.
    pub fn qualified(&self, table: &str) -> Result<String> {
        match (&self.catalog, &self.schema) {
            (Some(c), Some(s)) => qualify(&[c, s, table]),
            (None, Some(s)) => qualify(&[s, table]),
            _ => quote_ident(table),
        }
    }

    pub fn project(&self) -> Result<String> {
        self.qualified("project")
    }

    pub fn eol_definition(&self) -> Result<String> {
        self.qualified("eol_definition")
    }

    pub fn feature_lookup(&self) -> Result<String> {
        self.qualified("feature_lookup")
    }
}

const PROJECT_COLUMNS: &str = "id, name, description, catalog, `schema`, git_url, training_notebook";
const EOL_COLUMNS: &str = "id, name, sql_definition, project_id";
const LOOKUP_COLUMNS: &str =
    "id, name, project_id, eol_id, table_name, feature_names, lookup_key, timestamp_key";

/// Projects, EOL definitions and saved feature lookups, kept in tables
/// reachable through any [`TabularSource`].
///
/// Reads fail with `SourceUnavailable`, writes with `PersistenceFailed`,
/// lookups of a missing row with `NotFound`.
#[derive(Clone)]
pub struct MetadataStore {
    source: Arc<dyn TabularSource>,
    tables: TableNames,
}

impl MetadataStore {
    pub fn new(source: Arc<dyn TabularSource>, tables: TableNames) -> Self {
        Self { source, tables }
    }

    pub fn source(&self) -> &Arc<dyn TabularSource> {
        &self.source
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    fn read(&self, stmt: Statement) -> Result<DataFrame> {
        self.source.execute(&stmt)
    }

    fn write(&self, stmt: Statement) -> Result<()> {
        self.source
            .execute(&stmt)
            .map(|_| ())
            .map_err(DashError::into_persistence)
    }

    /// Create the metadata tables if they are missing
    pub fn init_schema(&self, dialect: Dialect) -> Result<()> {
        for sql in schema_statements(dialect, &self.tables)? {
            self.write(Statement::new(sql))?;
        }
        info!("metadata schema ready on {}", self.source.name());
        Ok(())
    }

    // ---- projects ----

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM {} ORDER BY name", self.tables.project()?);
        Project::from_frame(&self.read(Statement::new(sql))?)
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Project> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM {} WHERE id = :id", self.tables.project()?);
        Project::from_frame(&self.read(Statement::new(sql).bind("id", id.0))?)?
            .into_iter()
            .next()
            .ok_or_else(|| DashError::NotFound(format!("project {id}")))
    }

    /// Insert a project and return the id the backend assigned to it.
    pub fn create_project(&self, draft: &ProjectDraft) -> Result<ProjectId> {
        if draft.name.trim().is_empty() {
            return Err(DashError::validation("project name is required"));
        }
        let table = self.tables.project()?;
        let insert = format!(
            "INSERT INTO {table} (name, description, catalog, `schema`, git_url, training_notebook)
             VALUES (:name, :description, :catalog, :schema, :git_url, :training_notebook)"
        );
        self.write(bind_project(Statement::new(insert), draft))?;

        // identity values are not returned by the statement API, read back the newest match
        let select = format!(
            "SELECT id FROM {table}
             WHERE name = :name AND description = :description AND catalog = :catalog
               AND `schema` = :schema AND git_url = :git_url AND training_notebook = :training_notebook
             ORDER BY id DESC LIMIT 1"
        );
        let df = self
            .read(bind_project(Statement::new(select), draft))
            .map_err(DashError::into_persistence)?;
        if df.height() == 0 {
            return Err(DashError::PersistenceFailed(format!(
                "project {:?} was inserted but could not be read back",
                draft.name
            )));
        }
        let id = ProjectId(require_i64(&df, "id", 0)?);
        debug!("created project {id}");
        Ok(id)
    }

    pub fn update_project(&self, id: ProjectId, draft: &ProjectDraft) -> Result<()> {
        if draft.name.trim().is_empty() {
            return Err(DashError::validation("project name is required"));
        }
        self.get_project(id)?;
        let sql = format!(
            "UPDATE {} SET name = :name, description = :description, catalog = :catalog,
                 `schema` = :schema, git_url = :git_url, training_notebook = :training_notebook
             WHERE id = :id",
            self.tables.project()?
        );
        self.write(bind_project(Statement::new(sql), draft).bind("id", id.0))
    }

    pub fn delete_project(&self, id: ProjectId) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = :id", self.tables.project()?);
        self.write(Statement::new(sql).bind("id", id.0))
    }

    // ---- EOL definitions ----

    pub fn list_eol_definitions(&self, project: Option<ProjectId>) -> Result<Vec<EolDefinition>> {
        let table = self.tables.eol_definition()?;
        let stmt = match project {
            Some(p) => Statement::new(format!(
                "SELECT {EOL_COLUMNS} FROM {table} WHERE project_id = :project_id ORDER BY name"
            ))
            .bind("project_id", p.0),
            None => Statement::new(format!("SELECT {EOL_COLUMNS} FROM {table} ORDER BY name")),
        };
        EolDefinition::from_frame(&self.read(stmt)?)
    }

    pub fn get_eol_definition(&self, id: EolId) -> Result<EolDefinition> {
        let sql = format!("SELECT {EOL_COLUMNS} FROM {} WHERE id = :id", self.tables.eol_definition()?);
        EolDefinition::from_frame(&self.read(Statement::new(sql).bind("id", id.0))?)?
            .into_iter()
            .next()
            .ok_or_else(|| DashError::NotFound(format!("EOL definition {id}")))
    }

    pub fn create_eol_definition(&self, project: ProjectId, name: &str, sql_definition: &str) -> Result<EolId> {
        if name.trim().is_empty() || sql_definition.trim().is_empty() {
            return Err(DashError::validation("EOL definitions need a name and a SQL definition"));
        }
        let table = self.tables.eol_definition()?;
        self.write(
            Statement::new(format!(
                "INSERT INTO {table} (name, sql_definition, project_id) VALUES (:name, :sql_definition, :project_id)"
            ))
            .bind("name", name)
            .bind("sql_definition", sql_definition)
            .bind("project_id", project.0),
        )?;

        let df = self
            .read(
                Statement::new(format!(
                    "SELECT id FROM {table}
                     WHERE name = :name AND sql_definition = :sql_definition AND project_id = :project_id
                     ORDER BY id DESC LIMIT 1"
                ))
                .bind("name", name)
                .bind("sql_definition", sql_definition)
                .bind("project_id", project.0),
            )
            .map_err(DashError::into_persistence)?;
        if df.height() == 0 {
            return Err(DashError::PersistenceFailed(format!(
                "EOL definition {name:?} was inserted but could not be read back"
            )));
        }
        Ok(EolId(require_i64(&df, "id", 0)?))
    }

    pub fn update_eol_definition(&self, id: EolId, name: &str, sql_definition: &str) -> Result<()> {
        if name.trim().is_empty() || sql_definition.trim().is_empty() {
            return Err(DashError::validation("EOL definitions need a name and a SQL definition"));
        }
        self.get_eol_definition(id)?;
        let sql = format!(
            "UPDATE {} SET name = :name, sql_definition = :sql_definition WHERE id = :id",
            self.tables.eol_definition()?
        );
        self.write(
            Statement::new(sql)
                .bind("name", name)
                .bind("sql_definition", sql_definition)
                .bind("id", id.0),
        )
    }

    pub fn delete_eol_definition(&self, id: EolId) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = :id", self.tables.eol_definition()?);
        self.write(Statement::new(sql).bind("id", id.0))
    }

    // ---- feature lookups ----

    pub fn list_feature_lookups(&self, project: ProjectId) -> Result<Vec<FeatureLookupRecord>> {
        let sql = format!(
            "SELECT {LOOKUP_COLUMNS} FROM {} WHERE project_id = :project_id ORDER BY name, id",
            self.tables.feature_lookup()?
        );
        FeatureLookupRecord::from_frame(&self.read(Statement::new(sql).bind("project_id", project.0))?)
    }

    pub fn get_feature_lookup(&self, id: FeatureLookupId) -> Result<FeatureLookupRecord> {
        let sql = format!("SELECT {LOOKUP_COLUMNS} FROM {} WHERE id = :id", self.tables.feature_lookup()?);
        FeatureLookupRecord::from_frame(&self.read(Statement::new(sql).bind("id", id.0))?)?
            .into_iter()
            .next()
            .ok_or_else(|| DashError::NotFound(format!("feature lookup {id}")))
    }

    /// Write every entry under one lookup name in a single statement, so the
    /// batch lands completely or not at all.
    pub fn append_feature_lookups(
        &self,
        project: ProjectId,
        eol: EolId,
        name: &str,
        entries: &[FeatureLookupEntry],
    ) -> Result<usize> {
        if name.trim().is_empty() {
            return Err(DashError::validation("feature lookup name is required"));
        }
        if entries.is_empty() {
            return Err(DashError::validation("no feature lookups to save"));
        }

        let mut rows = Vec::with_capacity(entries.len());
        let mut stmt = Statement::new("")
            .bind("name", name)
            .bind("project_id", project.0)
            .bind("eol_id", eol.0);
        for (i, entry) in entries.iter().enumerate() {
            rows.push(format!(
                "(:name, :project_id, :eol_id, :table_name_{i}, :feature_names_{i}, :lookup_key_{i}, :timestamp_key_{i})"
            ));
            stmt = stmt
                .bind(&format!("table_name_{i}"), &entry.source_table)
                .bind(&format!("feature_names_{i}"), serde_json::to_string(&entry.feature_names)?)
                .bind(&format!("lookup_key_{i}"), &entry.lookup_key)
                .bind(&format!("timestamp_key_{i}"), entry.timestamp_key.clone());
        }
        stmt.sql = format!(
            "INSERT INTO {} (name, project_id, eol_id, table_name, feature_names, lookup_key, timestamp_key) VALUES {}",
            self.tables.feature_lookup()?,
            rows.join(", ")
        );

        self.write(stmt)?;
        info!("saved {} feature lookups as {name:?} for project {project}", entries.len());
        Ok(entries.len())
    }

    pub fn delete_feature_lookup(&self, id: FeatureLookupId) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = :id", self.tables.feature_lookup()?);
        self.write(Statement::new(sql).bind("id", id.0))
    }
}

fn bind_project(stmt: Statement, draft: &ProjectDraft) -> Statement {
    stmt.bind("name", &draft.name)
        .bind("description", &draft.description)
        .bind("catalog", &draft.catalog)
        .bind("schema", &draft.schema)
        .bind("git_url", &draft.git_url)
        .bind("training_notebook", &draft.training_notebook)
}

use tracing::debug;

use super::{Choice, OptionLoader, SelectorChain, StageOption, StageSpec};
use crate::core::{EolId, ProjectId};
use crate::error::{DashError, Result};
use crate::services::catalog::{CatalogBrowser, ColumnInfo};
use crate::services::metadata_store::MetadataStore;

pub const CATALOG: &str = "catalog";
pub const SCHEMA: &str = "schema";
pub const TABLE: &str = "table";
pub const COLUMNS: &str = "columns";

pub const EOL_DEFINITION: &str = "eol_definition";
pub const FEATURE_COLUMNS: &str = "feature_columns";
pub const LOOKUP_KEY: &str = "lookup_key";
pub const TIMESTAMP_KEY: &str = "timestamp_key";

impl SelectorChain {
    /// catalog → schema → table → columns
    pub fn table_path() -> Self {
        Self::new(vec![
            StageSpec::single(CATALOG),
            StageSpec::single(SCHEMA),
            StageSpec::single(TABLE),
            StageSpec::multi(COLUMNS),
        ])
    }

    /// EOL definition → feature columns → lookup key → timestamp key
    pub fn eol() -> Self {
        Self::new(vec![
            StageSpec::single(EOL_DEFINITION),
            StageSpec::multi(FEATURE_COLUMNS),
            StageSpec::single(LOOKUP_KEY),
            StageSpec::single(TIMESTAMP_KEY).optional(),
        ])
    }
}

fn single<'a>(upstream: &'a [Choice], stage: usize) -> Result<&'a str> {
    upstream
        .get(stage)
        .and_then(Choice::as_one)
        .ok_or_else(|| DashError::validation(format!("stage {stage} has no single committed value")))
}

fn column_options(columns: Vec<ColumnInfo>) -> Vec<StageOption> {
    columns
        .into_iter()
        .map(|c| StageOption::typed(c.name, c.data_type))
        .collect()
}

/// Options for the table-path chain, straight from the warehouse catalog.
pub struct TablePathLoader<'a> {
    browser: &'a CatalogBrowser,
}

impl<'a> TablePathLoader<'a> {
    pub fn new(browser: &'a CatalogBrowser) -> Self {
        Self { browser }
    }
}

impl OptionLoader for TablePathLoader<'_> {
    fn load(&self, stage: usize, upstream: &[Choice]) -> Result<Vec<StageOption>> {
        let options = match stage {
            0 => self.browser.catalogs()?.into_iter().map(StageOption::plain).collect(),
            1 => self
                .browser
                .schemas(single(upstream, 0)?)?
                .into_iter()
                .map(StageOption::plain)
                .collect(),
            2 => self
                .browser
                .tables(single(upstream, 0)?, single(upstream, 1)?)?
                .into_iter()
                .map(StageOption::plain)
                .collect(),
            3 => column_options(self.browser.columns(
                single(upstream, 0)?,
                single(upstream, 1)?,
                single(upstream, 2)?,
            )?),
            _ => Vec::new(),
        };
        Ok(options)
    }
}

/// Options for the EOL chain.
///
/// The EOL definitions come from the metadata store; the columns are the
/// described output of the definition's SQL. Lookup and timestamp keys are
/// picked among the committed feature columns, timestamp keys only among the
/// date/time typed ones.
pub struct EolLoader<'a> {
    store: &'a MetadataStore,
    browser: &'a CatalogBrowser,
    project: Option<ProjectId>,
}

impl<'a> EolLoader<'a> {
    pub fn new(store: &'a MetadataStore, browser: &'a CatalogBrowser, project: Option<ProjectId>) -> Self {
        Self { store, browser, project }
    }

    fn described(&self, upstream: &[Choice]) -> Result<Vec<ColumnInfo>> {
        let id: EolId = single(upstream, 0)?
            .parse()
            .map_err(DashError::ValidationFailed)?;
        let eol = self.store.get_eol_definition(id)?;
        debug!("describing EOL definition {} ({})", eol.name, eol.id);
        self.browser.describe_query(&eol.sql_definition)
    }

    /// Described columns that were committed as feature columns, in
    /// committed order.
    fn committed_features(&self, upstream: &[Choice]) -> Result<Vec<ColumnInfo>> {
        let chosen = upstream
            .get(1)
            .ok_or_else(|| DashError::validation("no feature columns committed"))?
            .values();
        let described = self.described(upstream)?;
        Ok(chosen
            .into_iter()
            .map(|name| {
                described
                    .iter()
                    .find(|c| c.name == name)
                    .cloned()
                    .unwrap_or_else(|| ColumnInfo {
                        name: name.to_string(),
                        data_type: "Unknown".to_string(),
                    })
            })
            .collect())
    }
}

impl OptionLoader for EolLoader<'_> {
    fn load(&self, stage: usize, upstream: &[Choice]) -> Result<Vec<StageOption>> {
        let options = match stage {
            0 => self
                .store
                .list_eol_definitions(self.project)?
                .into_iter()
                .map(|eol| StageOption {
                    label: eol.name,
                    value: eol.id.to_string(),
                    data_type: None,
                })
                .collect(),
            1 => column_options(self.described(upstream)?),
            2 => column_options(self.committed_features(upstream)?),
            3 => column_options(
                self.committed_features(upstream)?
                    .into_iter()
                    .filter(ColumnInfo::is_timestamp)
                    .collect(),
            ),
            _ => Vec::new(),
        };
        Ok(options)
    }
}

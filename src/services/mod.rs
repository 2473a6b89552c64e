pub mod catalog;
pub mod metadata_store;
pub mod tracking;

pub use catalog::{is_timestamp_type, CatalogBrowser, ColumnInfo};
pub use metadata_store::{MetadataStore, TableNames};
pub use tracking::{ExperimentService, ExperimentSummary, MlflowClient, WorkspaceJobs};

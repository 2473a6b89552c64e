//! Metadata store on an on-disk SQLite file

use std::sync::Arc;

use mlopsdash::config::Dialect;
use mlopsdash::core::{ProjectDraft, ProjectId};
use mlopsdash::services::{MetadataStore, TableNames};
use mlopsdash::source::SqliteSource;
use mlopsdash::DashError;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn open(dir: &TempDir) -> MetadataStore {
    let path = dir.path().join("nested").join("metadata.db");
    let store = MetadataStore::new(Arc::new(SqliteSource::open(&path).unwrap()), TableNames::new(None, None));
    store.init_schema(Dialect::Sqlite).unwrap();
    store
}

#[test]
fn test_rows_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let (project, eol) = {
        let store = open(&dir);
        let project = store
            .create_project(&ProjectDraft {
                name: "churn".into(),
                git_url: "https://git.example.com/churn.git".into(),
                ..Default::default()
            })
            .unwrap();
        let eol = store
            .create_eol_definition(project, "active", "SELECT id FROM customers")
            .unwrap();
        (project, eol)
    };

    // schema creation is idempotent and keeps existing rows
    let store = open(&dir);
    let projects = store.list_projects().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, project);
    assert_eq!(projects[0].fields.git_url, "https://git.example.com/churn.git");

    let eols = store.list_eol_definitions(Some(project)).unwrap();
    assert_eq!(eols.len(), 1);
    assert_eq!(eols[0].id, eol);
    assert_eq!(eols[0].sql_definition, "SELECT id FROM customers");
}

#[test]
fn test_update_and_delete_project() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let id = store
        .create_project(&ProjectDraft {
            name: "churn".into(),
            ..Default::default()
        })
        .unwrap();

    let mut draft = store.get_project(id).unwrap().fields;
    draft.description = "monthly churn model".into();
    store.update_project(id, &draft).unwrap();
    assert_eq!(store.get_project(id).unwrap().fields.description, "monthly churn model");

    store.delete_project(id).unwrap();
    assert!(matches!(store.get_project(id), Err(DashError::NotFound(_))));
    assert!(matches!(
        store.update_project(ProjectId(id.0 + 100), &draft),
        Err(DashError::NotFound(_))
    ));
}

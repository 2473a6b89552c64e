use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{EntryId, EolId, ProjectId};
use crate::error::{DashError, Result};
use crate::services::metadata_store::MetadataStore;

/// One pending feature lookup: which features to pull from which table, and
/// how to join them onto the observation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureLookupEntry {
    pub id: EntryId,
    pub source_table: String,
    pub feature_names: Vec<String>,
    pub lookup_key: String,
    pub timestamp_key: Option<String>,
}

/// Entry fields before an id is assigned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEntry {
    pub source_table: String,
    pub feature_names: Vec<String>,
    pub lookup_key: String,
    pub timestamp_key: Option<String>,
}

/// Ordered list of pending feature lookups, owned by one session.
#[derive(Debug, Clone, Default)]
pub struct FeatureLookupAccumulator {
    entries: Vec<FeatureLookupEntry>,
}

impl FeatureLookupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its id.
    ///
    /// Feature names are de-duplicated keeping the first occurrence. An empty
    /// feature list or lookup key is rejected and nothing is appended.
    pub fn add(&mut self, new: NewEntry) -> Result<EntryId> {
        if new.source_table.trim().is_empty() {
            return Err(DashError::validation("a source table is required"));
        }
        let mut feature_names: Vec<String> = Vec::with_capacity(new.feature_names.len());
        for name in new.feature_names {
            if !feature_names.contains(&name) {
                feature_names.push(name);
            }
        }
        if feature_names.is_empty() {
            return Err(DashError::validation("at least one feature column is required"));
        }
        if new.lookup_key.trim().is_empty() {
            return Err(DashError::validation("a lookup key is required"));
        }

        let id = EntryId::new();
        self.entries.push(FeatureLookupEntry {
            id,
            source_table: new.source_table,
            feature_names,
            lookup_key: new.lookup_key,
            timestamp_key: new.timestamp_key.filter(|ts| !ts.trim().is_empty()),
        });
        debug!("accumulator: added {id} ({} entries)", self.entries.len());
        Ok(id)
    }

    /// Remove the entry with `id`; unknown ids leave the list unchanged.
    pub fn remove(&mut self, id: &EntryId) -> Option<FeatureLookupEntry> {
        let pos = self.entries.iter().position(|e| &e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn entries(&self) -> &[FeatureLookupEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render the entries as a `feature_lookups = [...]` code block.
    pub fn to_canonical_text(&self) -> String {
        if self.entries.is_empty() {
            return "feature_lookups = []".to_string();
        }
        let mut out = String::from("feature_lookups = [\n");
        for e in &self.entries {
            let features = e
                .feature_names
                .iter()
                .map(|f| quoted(f))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str("    FeatureLookup(\n");
            out.push_str(&format!("      table_name={},\n", quoted(&e.source_table)));
            out.push_str(&format!("      feature_names=[{features}],\n"));
            match &e.timestamp_key {
                Some(ts) => {
                    out.push_str(&format!("      lookup_key={},\n", quoted(&e.lookup_key)));
                    out.push_str(&format!("      timestamp_key={}\n", quoted(ts)));
                }
                None => out.push_str(&format!("      lookup_key={}\n", quoted(&e.lookup_key))),
            }
            out.push_str("    ),\n");
        }
        out.push(']');
        out
    }

    /// Persist every entry under `name` and clear the list.
    ///
    /// On failure the entries stay so the save can be retried.
    pub fn save(&mut self, store: &MetadataStore, project: ProjectId, eol: EolId, name: &str) -> Result<usize> {
        if self.entries.is_empty() {
            return Err(DashError::validation("nothing to save"));
        }
        match store.append_feature_lookups(project, eol, name, &self.entries) {
            Ok(written) => {
                self.entries.clear();
                Ok(written)
            }
            Err(e) => {
                warn!("saving {} feature lookups failed: {e}", self.entries.len());
                Err(e.into_persistence())
            }
        }
    }
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Dialect;
    use crate::services::metadata_store::TableNames;
    use crate::source::SqliteSource;

    fn new_entry(table: &str, features: &[&str], key: &str, ts: Option<&str>) -> NewEntry {
        NewEntry {
            source_table: table.to_string(),
            feature_names: features.iter().map(|s| s.to_string()).collect(),
            lookup_key: key.to_string(),
            timestamp_key: ts.map(str::to_string),
        }
    }

    #[test]
    fn test_add_assigns_distinct_ids() {
        let mut acc = FeatureLookupAccumulator::new();
        let a = acc.add(new_entry("c.s.t", &["a"], "k", None)).unwrap();
        let b = acc.add(new_entry("c.s.t", &["a"], "k", None)).unwrap();
        assert_ne!(a, b);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_add_rejects_missing_fields() {
        let mut acc = FeatureLookupAccumulator::new();
        assert!(matches!(
            acc.add(new_entry("c.s.t", &[], "k", None)),
            Err(DashError::ValidationFailed(_))
        ));
        assert!(matches!(
            acc.add(new_entry("c.s.t", &["a"], "", None)),
            Err(DashError::ValidationFailed(_))
        ));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_add_dedups_feature_names() {
        let mut acc = FeatureLookupAccumulator::new();
        acc.add(new_entry("c.s.t", &["b", "a", "b"], "k", Some(""))).unwrap();
        assert_eq!(acc.entries()[0].feature_names, vec!["b", "a"]);
        assert_eq!(acc.entries()[0].timestamp_key, None);
    }

    #[test]
    fn test_remove_by_id() {
        let mut acc = FeatureLookupAccumulator::new();
        let a = acc.add(new_entry("c.s.t1", &["a"], "k", None)).unwrap();
        let b = acc.add(new_entry("c.s.t2", &["b"], "k", None)).unwrap();
        let c = acc.add(new_entry("c.s.t3", &["c"], "k", None)).unwrap();

        assert_eq!(acc.remove(&b).map(|e| e.source_table).as_deref(), Some("c.s.t2"));
        assert_eq!(acc.remove(&b), None);
        let tables: Vec<&str> = acc.entries().iter().map(|e| e.source_table.as_str()).collect();
        assert_eq!(tables, vec!["c.s.t1", "c.s.t3"]);
        assert_eq!(acc.entries()[0].id, a);
        assert_eq!(acc.entries()[1].id, c);
    }

    #[test]
    fn test_canonical_text_empty() {
        assert_eq!(FeatureLookupAccumulator::new().to_canonical_text(), "feature_lookups = []");
    }

    #[test]
    fn test_canonical_text_two_entries() {
        let mut acc = FeatureLookupAccumulator::new();
        acc.add(new_entry("c.s.t", &["a", "b"], "k", Some("ts"))).unwrap();
        acc.add(new_entry("c.s.u", &["x"], "k2", None)).unwrap();
        let expected = "\
feature_lookups = [
    FeatureLookup(
      table_name='c.s.t',
      feature_names=['a', 'b'],
      lookup_key='k',
      timestamp_key='ts'
    ),
    FeatureLookup(
      table_name='c.s.u',
      feature_names=['x'],
      lookup_key='k2'
    ),
]";
        assert_eq!(acc.to_canonical_text(), expected);
    }

    #[test]
    fn test_canonical_text_escapes_quotes() {
        let mut acc = FeatureLookupAccumulator::new();
        acc.add(new_entry("c.s.t", &["it's"], r"a\b", None)).unwrap();
        let text = acc.to_canonical_text();
        assert!(text.contains(r"feature_names=['it\'s']"));
        assert!(text.contains(r"lookup_key='a\\b'"));
    }

    #[test]
    fn test_save_empty_is_rejected() {
        let source = Arc::new(SqliteSource::open_in_memory().unwrap());
        let store = MetadataStore::new(source, TableNames::default());
        let mut acc = FeatureLookupAccumulator::new();
        assert!(matches!(
            acc.save(&store, ProjectId(1), EolId(1), "v1"),
            Err(DashError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_save_failure_keeps_entries_and_success_clears() {
        let source = Arc::new(SqliteSource::open_in_memory().unwrap());
        let store = MetadataStore::new(source, TableNames::default());
        let mut acc = FeatureLookupAccumulator::new();
        acc.add(new_entry("c.s.t", &["a"], "k", None)).unwrap();
        acc.add(new_entry("c.s.u", &["b"], "k", None)).unwrap();

        // tables not created yet
        let err = acc.save(&store, ProjectId(1), EolId(1), "v1").unwrap_err();
        assert!(matches!(err, DashError::PersistenceFailed(_)));
        assert_eq!(acc.len(), 2);

        store.init_schema(Dialect::Sqlite).unwrap();
        assert_eq!(acc.save(&store, ProjectId(1), EolId(1), "v1").unwrap(), 2);
        assert!(acc.is_empty());
        assert_eq!(store.list_feature_lookups(ProjectId(1)).unwrap().len(), 2);
    }
}

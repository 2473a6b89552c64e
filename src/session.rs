use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::info;

use crate::core::{EntryId, EolId, ProjectId, SessionId};
use crate::error::{DashError, Result};
use crate::lookup::{FeatureLookupAccumulator, FeatureLookupEntry, NewEntry};
use crate::selector::loaders::{COLUMNS, LOOKUP_KEY};
use crate::selector::{Choice, EolLoader, SelectorChain, StageOption, TablePathLoader};
use crate::services::catalog::CatalogBrowser;
use crate::services::metadata_store::MetadataStore;

/// Everything one user's feature-lookup form remembers between actions.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub project: Option<ProjectId>,
    pub table_chain: SelectorChain,
    pub eol_chain: SelectorChain,
    pub accumulator: FeatureLookupAccumulator,
}

impl Session {
    pub fn new(project: Option<ProjectId>) -> Self {
        Self {
            id: SessionId::new(),
            project,
            table_chain: SelectorChain::table_path(),
            eol_chain: SelectorChain::eol(),
            accumulator: FeatureLookupAccumulator::new(),
        }
    }
}

/// Open sessions keyed by id. Cloning shares the same map.
///
/// Each session sits behind its own lock, so an action that blocks on I/O
/// only holds up later actions on that same session.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionId, Arc<Mutex<Session>>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, Arc<Mutex<Session>>>>> {
        self.sessions
            .lock()
            .map_err(|e| DashError::SourceUnavailable(format!("session registry lock poisoned: {e}")))
    }

    fn handle(&self, id: SessionId) -> Result<Arc<Mutex<Session>>> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or_else(|| DashError::NotFound(format!("session {id}")))
    }

    pub fn open(&self, project: Option<ProjectId>) -> Result<SessionId> {
        let session = Session::new(project);
        let id = session.id;
        self.lock()?.insert(id, Arc::new(Mutex::new(session)));
        info!("opened session {id}");
        Ok(id)
    }

    /// Run `f` against the session. Only that session is locked while `f` runs.
    pub fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        let handle = self.handle(id)?;
        let mut session = handle
            .lock()
            .map_err(|e| DashError::SourceUnavailable(format!("session {id} lock poisoned: {e}")))?;
        Ok(f(&mut *session))
    }

    /// Remove the session, waiting for any action still running on it.
    pub fn close(&self, id: SessionId) -> Result<Option<Session>> {
        let Some(handle) = self.lock()?.remove(&id) else {
            return Ok(None);
        };
        let session = handle
            .lock()
            .map_err(|e| DashError::SourceUnavailable(format!("session {id} lock poisoned: {e}")))?;
        Ok(Some(session.clone()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageView {
    pub name: &'static str,
    pub multi: bool,
    pub required: bool,
    pub options: Vec<StageOption>,
    pub committed: Option<Choice>,
}

/// Snapshot of a form for rendering
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub session: SessionId,
    pub project: Option<ProjectId>,
    pub table_stages: Vec<StageView>,
    pub eol_stages: Vec<StageView>,
    pub ready_to_commit: bool,
    pub entries: Vec<FeatureLookupEntry>,
    pub canonical_text: String,
}

fn stage_views(chain: &SelectorChain) -> Vec<StageView> {
    chain
        .specs()
        .iter()
        .zip(chain.stages())
        .map(|(spec, state)| StageView {
            name: spec.name,
            multi: spec.multi,
            required: spec.required,
            options: state.options.clone(),
            committed: state.committed.clone(),
        })
        .collect()
}

/// The feature-lookup builder: both selector chains plus the accumulator of
/// one session, wired to the warehouse and the metadata store.
pub struct FeatureLookupForm<'a> {
    session: &'a mut Session,
    store: &'a MetadataStore,
    browser: &'a CatalogBrowser,
}

impl<'a> FeatureLookupForm<'a> {
    pub fn new(session: &'a mut Session, store: &'a MetadataStore, browser: &'a CatalogBrowser) -> Self {
        Self { session, store, browser }
    }

    /// Reset both chains and load their first stage
    pub fn start(&mut self) {
        let tables = TablePathLoader::new(self.browser);
        let eols = EolLoader::new(self.store, self.browser, self.session.project);
        self.session.table_chain.load_root(&tables);
        self.session.eol_chain.load_root(&eols);
    }

    pub fn select_table_stage(&mut self, stage: usize, choice: Option<Choice>) -> Result<()> {
        let loader = TablePathLoader::new(self.browser);
        self.session.table_chain.set_committed(stage, choice, &loader)
    }

    pub fn select_eol_stage(&mut self, stage: usize, choice: Option<Choice>) -> Result<()> {
        let loader = EolLoader::new(self.store, self.browser, self.session.project);
        self.session.eol_chain.set_committed(stage, choice, &loader)
    }

    pub fn ready_to_commit(&self) -> bool {
        self.session.table_chain.ready_to_commit() && self.session.eol_chain.ready_to_commit()
    }

    /// Turn the current selections into an accumulator entry.
    ///
    /// The column and key stages are cleared afterwards so the next entry
    /// can be picked from the same table and EOL definition.
    pub fn commit_entry(&mut self) -> Result<EntryId> {
        let table = self.session.table_chain.current_selection()?;
        let eol = self.session.eol_chain.current_selection()?;

        let part = |choice: &Option<Choice>| -> Result<String> {
            choice
                .as_ref()
                .and_then(Choice::as_one)
                .map(str::to_string)
                .ok_or_else(|| DashError::validation("incomplete selection"))
        };
        let source_table = format!("{}.{}.{}", part(&table[0])?, part(&table[1])?, part(&table[2])?);
        let feature_names = table[3]
            .as_ref()
            .map(|c| c.values().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        let lookup_key = part(&eol[2])?;
        let timestamp_key = eol[3].as_ref().and_then(Choice::as_one).map(str::to_string);

        let id = self.session.accumulator.add(NewEntry {
            source_table,
            feature_names,
            lookup_key,
            timestamp_key,
        })?;

        if let Some(stage) = self.session.table_chain.position(COLUMNS) {
            self.session.table_chain.reset_from(stage);
        }
        if let Some(stage) = self.session.eol_chain.position(LOOKUP_KEY) {
            self.session.eol_chain.reset_from(stage);
        }
        Ok(id)
    }

    pub fn remove_entry(&mut self, id: &EntryId) -> Option<FeatureLookupEntry> {
        self.session.accumulator.remove(id)
    }

    /// Committed EOL definition id
    pub fn eol_id(&self) -> Result<EolId> {
        self.session
            .eol_chain
            .stage(0)
            .and_then(|s| s.committed.as_ref())
            .and_then(Choice::as_one)
            .ok_or_else(|| DashError::validation("no EOL definition selected"))?
            .parse()
            .map_err(DashError::ValidationFailed)
    }

    /// Persist the pending entries under `name`
    pub fn save(&mut self, name: &str) -> Result<usize> {
        let project = self
            .session
            .project
            .ok_or_else(|| DashError::validation("no project selected"))?;
        let eol = self.eol_id()?;
        self.session.accumulator.save(self.store, project, eol, name)
    }

    pub fn view(&self) -> FormView {
        FormView {
            session: self.session.id,
            project: self.session.project,
            table_stages: stage_views(&self.session.table_chain),
            eol_stages: stage_views(&self.session.eol_chain),
            ready_to_commit: self.ready_to_commit(),
            entries: self.session.accumulator.entries().to_vec(),
            canonical_text: self.session.accumulator.to_canonical_text(),
        }
    }
}

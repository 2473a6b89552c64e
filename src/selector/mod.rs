//! Cascading multi-stage selection forms.
//!
//! Each stage's options are computed from the committed values of the
//! stages before it. Committing (or clearing) a stage wipes everything
//! downstream and reloads only the next stage, so options are never filled
//! speculatively.

pub mod loaders;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{DashError, Result};

pub use loaders::{EolLoader, TablePathLoader};

/// Static shape of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSpec {
    pub name: &'static str,
    pub multi: bool,
    pub required: bool,
}

impl StageSpec {
    pub const fn single(name: &'static str) -> Self {
        Self {
            name,
            multi: false,
            required: true,
        }
    }

    pub const fn multi(name: &'static str) -> Self {
        Self {
            name,
            multi: true,
            required: true,
        }
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A committed value: one option, or several for multi-select stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Choice {
    One(String),
    Many(Vec<String>),
}

impl Choice {
    pub fn one(value: impl Into<String>) -> Self {
        Self::One(value.into())
    }

    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Many(values.into_iter().map(Into::into).collect())
    }

    /// The single value, if this is a single choice
    pub fn as_one(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v),
            Self::Many(_) => None,
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::One(v) => vec![v.as_str()],
            Self::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl StageOption {
    /// Option whose label is its value
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            data_type: None,
        }
    }

    pub fn typed(value: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            data_type: Some(data_type.into()),
            ..Self::plain(value)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageState {
    pub committed: Option<Choice>,
    pub options: Vec<StageOption>,
}

impl StageState {
    fn clear(&mut self) {
        self.committed = None;
        self.options.clear();
    }
}

/// Supplies the options of a stage given the committed values of all
/// stages before it (`upstream.len() == stage`).
pub trait OptionLoader {
    fn load(&self, stage: usize, upstream: &[Choice]) -> Result<Vec<StageOption>>;
}

#[derive(Debug, Clone)]
pub struct SelectorChain {
    specs: Vec<StageSpec>,
    states: Vec<StageState>,
}

impl SelectorChain {
    pub fn new(specs: Vec<StageSpec>) -> Self {
        let states = vec![StageState::default(); specs.len()];
        Self { specs, states }
    }

    pub fn specs(&self) -> &[StageSpec] {
        &self.specs
    }

    pub fn stages(&self) -> &[StageState] {
        &self.states
    }

    pub fn stage(&self, stage: usize) -> Option<&StageState> {
        self.states.get(stage)
    }

    /// Index of the stage called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    /// Clear every stage and load the options of the first one.
    pub fn load_root(&mut self, loader: &dyn OptionLoader) {
        for state in &mut self.states {
            state.clear();
        }
        if !self.states.is_empty() {
            self.states[0].options = self.fetch(0, loader);
        }
    }

    /// Commit `choice` at `stage` (or clear it with `None`), reset every
    /// later stage and reload the next one.
    ///
    /// Invalid choices are rejected before anything changes.
    pub fn set_committed(&mut self, stage: usize, choice: Option<Choice>, loader: &dyn OptionLoader) -> Result<()> {
        let spec = self
            .specs
            .get(stage)
            .ok_or_else(|| DashError::validation(format!("no stage {stage}")))?;

        let choice = match choice {
            Some(c) => Some(self.validate(stage, spec, c)?),
            None => None,
        };
        debug!("stage {} <- {:?}", spec.name, choice);

        let committed = choice.is_some();
        self.states[stage].committed = choice;
        for state in self.states.iter_mut().skip(stage + 1) {
            state.clear();
        }
        if committed && stage + 1 < self.states.len() {
            self.states[stage + 1].options = self.fetch(stage + 1, loader);
        }
        Ok(())
    }

    fn validate(&self, stage: usize, spec: &StageSpec, choice: Choice) -> Result<Choice> {
        if stage > 0 && self.states[stage - 1].committed.is_none() {
            return Err(DashError::validation(format!(
                "{} cannot be chosen before {}",
                spec.name,
                self.specs[stage - 1].name
            )));
        }
        let choice = match (spec.multi, choice) {
            (false, Choice::Many(_)) => {
                return Err(DashError::validation(format!("{} takes a single value", spec.name)));
            }
            (true, Choice::One(v)) => Choice::Many(vec![v]),
            (_, c) => c,
        };
        if let Choice::Many(values) = &choice {
            if values.is_empty() {
                return Err(DashError::validation(format!("{} needs at least one value", spec.name)));
            }
        }
        let options = &self.states[stage].options;
        for value in choice.values() {
            if !options.iter().any(|o| o.value == value) {
                return Err(DashError::validation(format!(
                    "{value:?} is not an option for {}",
                    spec.name
                )));
            }
        }
        Ok(choice)
    }

    fn fetch(&self, stage: usize, loader: &dyn OptionLoader) -> Vec<StageOption> {
        let upstream: Vec<Choice> = self.states[..stage]
            .iter()
            .filter_map(|s| s.committed.clone())
            .collect();
        if upstream.len() != stage {
            return Vec::new();
        }
        match loader.load(stage, &upstream) {
            Ok(options) => options,
            Err(e) => {
                warn!("options for {} unavailable: {e}", self.specs[stage].name);
                Vec::new()
            }
        }
    }

    /// Clear the committed value at `stage` and everything after it. The
    /// options of `stage` itself are kept so it can be chosen again.
    pub fn reset_from(&mut self, stage: usize) {
        if let Some(state) = self.states.get_mut(stage) {
            state.committed = None;
        }
        for state in self.states.iter_mut().skip(stage + 1) {
            state.clear();
        }
    }

    /// Committed values of every stage, or `ValidationFailed` naming the
    /// first required stage that has none.
    pub fn current_selection(&self) -> Result<Vec<Option<Choice>>> {
        for (spec, state) in self.specs.iter().zip(&self.states) {
            if spec.required && state.committed.is_none() {
                return Err(DashError::validation(format!("{} is not selected", spec.name)));
            }
        }
        Ok(self.states.iter().map(|s| s.committed.clone()).collect())
    }

    /// True when every required stage has a committed value
    pub fn ready_to_commit(&self) -> bool {
        self.specs
            .iter()
            .zip(&self.states)
            .all(|(spec, state)| !spec.required || state.committed.is_some())
    }
}

#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_match)]
#![allow(clippy::collapsible_else_if)]

pub mod columns;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod selector;
pub mod services;
pub mod session;
pub mod source;

// Re-export commonly used types
pub use columns::{ColumnClassifier, DisplayColumn};
pub use core::{EntryId, EolId, FeatureLookupId, ProjectId, SessionId};
pub use error::{DashError, Result};
pub use lookup::{FeatureLookupAccumulator, FeatureLookupEntry, NewEntry};
pub use selector::{Choice, OptionLoader, SelectorChain, StageOption, StageSpec};
pub use services::{CatalogBrowser, ExperimentService, MetadataStore};
pub use session::{FeatureLookupForm, Session, SessionRegistry};
pub use source::{SqlValue, Statement, TabularSource};

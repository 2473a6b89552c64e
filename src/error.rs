use thiserror::Error;

/// Errors surfaced by the dashboard core.
///
/// `SourceUnavailable` is never fatal to a session: callers that feed a view
/// downgrade it to an empty result and log it. `ValidationFailed` is raised
/// before any state is touched. `PersistenceFailed` leaves in-memory state as
/// it was so the user can retry.
#[derive(Debug, Error)]
pub enum DashError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DashError {
    pub fn source_unavailable(e: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable(e.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Re-tag a failed write as a persistence failure, keeping the message.
    pub fn into_persistence(self) -> Self {
        match self {
            Self::PersistenceFailed(_) | Self::ValidationFailed(_) => self,
            other => Self::PersistenceFailed(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for DashError {
    fn from(e: rusqlite::Error) -> Self {
        Self::SourceUnavailable(format!("sqlite: {e}"))
    }
}

impl From<polars::prelude::PolarsError> for DashError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        Self::Decode(format!("polars: {e}"))
    }
}

impl From<reqwest::Error> for DashError {
    fn from(e: reqwest::Error) -> Self {
        Self::SourceUnavailable(format!("http: {e}"))
    }
}

impl From<serde_json::Error> for DashError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(format!("json: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, DashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_persistence_retags_source_errors() {
        let err = DashError::source_unavailable("connection reset").into_persistence();
        assert!(matches!(err, DashError::PersistenceFailed(ref m) if m.contains("connection reset")));
    }

    #[test]
    fn test_into_persistence_keeps_validation() {
        let err = DashError::validation("empty").into_persistence();
        assert!(matches!(err, DashError::ValidationFailed(_)));
    }
}

use thiserror::Error;

/// Typed error hierarchy for the catalog core.
///
/// Collaborator traits return these so callers can tell a dead feed from a
/// broken store; inside the store itself `anyhow` is used and converted at
/// the boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("feed error: {0}")]
    Feed(String),

    #[error("enrichment error: {0}")]
    Enrichment(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Io(String),
}

// ── From impls ─────────────────────────────────────────────────────────────

impl From<anyhow::Error> for CoreError {
    fn from(e: anyhow::Error) -> Self {
        CoreError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Database(e.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(e: serde_yaml::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

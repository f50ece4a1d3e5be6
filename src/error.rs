use thiserror::Error;

use crate::run_state::RunState;

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Schema error: duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Parse error: row {row}: cannot parse {column} value '{value}' as a date")]
    Parse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Registry catalog error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid run transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },
}

/// Coarse failure classes surfaced to callers of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Schema,
    Parse,
    Io,
    Internal,
}

impl CleaningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CleaningError::Config(_) | CleaningError::Toml(_) => ErrorKind::Config,
            CleaningError::Schema { .. } | CleaningError::DuplicateColumn(_) => ErrorKind::Schema,
            CleaningError::Parse { .. } => ErrorKind::Parse,
            CleaningError::Io(_)
            | CleaningError::Csv(_)
            | CleaningError::Registry(_)
            | CleaningError::NotFound(_)
            | CleaningError::Sqlite(_)
            | CleaningError::Json(_) => ErrorKind::Io,
            CleaningError::InvalidTransition { .. } => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, CleaningError>;

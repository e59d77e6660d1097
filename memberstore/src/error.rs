use crate::value::ValueType;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No database is open")]
    NotOpen,

    #[error("Unable to open database at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// The engine rejected the statement text. Carries the engine message verbatim.
    #[error("{0}")]
    Compile(String),

    /// The engine failed while running a statement. Carries the engine message verbatim.
    #[error("{0}")]
    Execution(String),

    #[error("Statement was invalidated by a connection change")]
    StatementInvalidated,

    #[error("Parameter index {index} out of range (statement declares {count})")]
    ParameterIndex { index: usize, count: usize },

    #[error("Column index {index} out of range (row has {count})")]
    ColumnIndex { index: usize, count: usize },

    #[error("No row is available; step() must return a row before fetching columns")]
    NoRow,

    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Unable to {action} the database file: {source}")]
    Snapshot {
        action: &'static str,
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Extract the message SQLite reported for a failure, falling back to the
/// wrapper's own rendering for errors that did not come from the engine.
pub(crate) fn engine_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
        rusqlite::Error::SqlInputError { msg, .. } => msg.clone(),
        other => other.to_string(),
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Failed to read order file '{}': {source}", path.display())]
    DataAccess {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid value '{value}' in column {column} at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Sales store '{}' does not exist", .0.display())]
    StoreNotFound(PathBuf),

    #[error("Sales store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;

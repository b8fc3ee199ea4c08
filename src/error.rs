use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn one raw row into a normalized record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid date in '{field}': expected DD/MM/YYYY, got '{value}'")]
    DateFormat { field: String, value: String },
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("{}: row {row}: {source}", .path.display())]
    Transform {
        path: PathBuf,
        row: usize,
        #[source]
        source: TransformError,
    },

    #[error("Failed to read CSV file {}: {message}", .path.display())]
    FileRead { path: PathBuf, message: String },

    #[error("Cannot reach document store: {message}")]
    StoreConnection { message: String },

    #[error("Store operation '{operation}' on collection '{collection}' failed: {message}")]
    StoreOperation {
        operation: &'static str,
        collection: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
